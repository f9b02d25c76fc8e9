// elastic_objectpool demo binary
// Run the connection example with: cargo run --example echo_connections

use elastic_objectpool::{ObjectPool, PoolConfiguration, PoolResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static NEXT_SESSION: AtomicUsize = AtomicUsize::new(1);

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    println!("=== elastic_objectpool ===");

    let pool = ObjectPool::new(
        PoolConfiguration::new()
            .with_max_object_count(4)
            .with_idle_time(Duration::from_millis(50))
            .with_constructor(|| {
                Ok::<_, std::io::Error>(format!(
                    "session-{}",
                    NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
                ))
            })
            .with_destructor(|session| println!("  closing {session}"))
            .with_id_extractor(|session| session.clone()),
    )?;

    let first = pool.get_object()?;
    let second = pool.get_object()?;
    println!("  Got {} and {}", *first, *second);
    pool.return_object(first)?;
    pool.return_object(second)?;
    println!("  Idle after return: {}", pool.idle_object_count());

    std::thread::sleep(Duration::from_millis(100));
    let again = pool.get_object()?;
    println!("  Reused {} (use count {})", *again, again.use_count());
    pool.return_object(again)?;
    println!("  Objects after shrink pass: {}", pool.object_count());

    for (key, value) in pool.export_metrics() {
        println!("  {key}: {value}");
    }

    pool.close();
    Ok(())
}
