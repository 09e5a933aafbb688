// locked_queue - demo binary
// The library lives in lib.rs; this walks through the pool and container.

use locked_queue::{KeyedContainer, ObjectPool, PoolConfiguration, Poolable};

#[derive(Default)]
struct Connection {
    peer: String,
    bytes_sent: usize,
}

impl Poolable for Connection {
    const MAX_POOL_SIZE: usize = 4;

    fn reset(&mut self) {
        self.peer.clear();
        self.bytes_sent = 0;
    }
}

fn main() {
    println!("=== locked_queue ===");
    println!();

    let config = PoolConfiguration::new().with_warmup(2);
    let pool: ObjectPool<Connection> = match ObjectPool::with_factory(config, Connection::default) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("  Failed to create pool: {err}");
            return;
        }
    };
    let connections: KeyedContainer<u32, Connection> = KeyedContainer::new();

    println!("Pool:");
    println!("  Warmed up: {}", pool.free_size());

    for id in 0..3 {
        let mut conn = pool.allocate();
        conn.peer = format!("10.0.0.{id}");
        conn.bytes_sent = 512 * (id as usize + 1);
        connections.insert(id, conn);
    }
    println!("  Idle after handing out 3: {}", pool.free_size());

    println!();
    println!("Container:");
    connections.for_each(|id, conn| {
        println!("  #{id} {} sent {} bytes", conn.peer, conn.bytes_sent);
    });

    for (_, conn) in connections.drain() {
        let outcome = pool.deallocate(conn);
        println!("  Returned connection: {outcome:?}");
    }

    println!();
    let metrics = pool.metrics();
    println!("Metrics:");
    println!("  constructed: {}", metrics.constructed);
    println!("  recycled: {}", metrics.recycled);
    println!("  idle: {}", metrics.idle_objects);
}
