//! Pooling TCP connections to a local echo server

use elastic_objectpool::{ObjectPool, PoolConfiguration, PoolError};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("elastic_objectpool=debug").init();

    println!("=== elastic_objectpool - Echo Connections ===\n");

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        for conn in listener.incoming().flatten() {
            thread::spawn(move || {
                if let Ok(mut reader) = conn.try_clone() {
                    let mut writer = conn;
                    let _ = io::copy(&mut reader, &mut writer);
                }
            });
        }
    });

    let pool = Arc::new(ObjectPool::new(
        PoolConfiguration::new()
            .with_max_object_count(4)
            .with_idle_time(Duration::from_secs(30))
            .with_constructor(move || TcpStream::connect(addr))
            .with_destructor(|conn: &TcpStream| {
                let _ = conn.shutdown(Shutdown::Both);
            })
            .with_id_extractor(|conn: &TcpStream| {
                conn.local_addr().map(|a| a.to_string()).unwrap_or_default()
            }),
    )?);

    // 1. Round trips from several threads share at most four connections
    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || -> Result<(), PoolError> {
                for round in 0..5 {
                    let holder = match pool.get_object() {
                        Ok(holder) => holder,
                        Err(PoolError::CapacityExceeded { .. }) => {
                            thread::sleep(Duration::from_millis(5));
                            continue;
                        }
                        Err(err) => return Err(err),
                    };
                    let message = format!("worker {worker} round {round}");
                    let mut conn: &TcpStream = &holder;
                    let mut echoed = vec![0; message.len()];
                    let ok = conn.write_all(message.as_bytes()).is_ok()
                        && conn.read_exact(&mut echoed).is_ok();

                    let mut holder = holder;
                    if !ok {
                        holder.mark_unusable();
                    }
                    pool.return_object(holder)?;
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        if let Ok(Err(err)) = worker.join() {
            println!("   worker failed: {err}");
        }
    }

    println!("1. Connections opened: {}", pool.object_count());

    // 2. Metrics and health
    let health = pool.get_health_status();
    println!("2. Healthy: {}, idle: {}", health.is_healthy(), health.idle_objects);
    for (key, value) in pool.export_metrics() {
        println!("     {key}: {value}");
    }

    // 3. Shutdown closes every connection
    pool.close();
    println!("3. Closed, remaining objects: {}", pool.object_count());
    Ok(())
}
