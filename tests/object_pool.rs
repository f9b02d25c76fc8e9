//! Pool behaviour against real TCP connections to an in-process echo server

use elastic_objectpool::{ObjectPool, PoolConfiguration, PoolError};

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

const IDLE_300S: Duration = Duration::from_secs(300);

fn echo_server() -> SocketAddr {
    static ADDR: OnceLock<SocketAddr> = OnceLock::new();
    *ADDR.get_or_init(|| {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind echo server");
        let addr = listener.local_addr().expect("echo server address");
        thread::spawn(move || {
            for conn in listener.incoming() {
                let Ok(conn) = conn else { continue };
                thread::spawn(move || {
                    let Ok(mut reader) = conn.try_clone() else { return };
                    let mut writer = conn;
                    let _ = io::copy(&mut reader, &mut writer);
                });
            }
        });
        addr
    })
}

/// Address nobody listens on
fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe");
    listener.local_addr().expect("probe address")
}

#[derive(Default)]
struct Tally {
    destroyed: AtomicUsize,
}

fn connection_config(
    min: usize,
    max: usize,
    target: SocketAddr,
    tally: &Arc<Tally>,
) -> PoolConfiguration<TcpStream> {
    let tally = Arc::clone(tally);
    PoolConfiguration::new()
        .with_min_object_count(min)
        .with_max_object_count(max)
        .with_idle_time(IDLE_300S)
        .with_constructor(move || TcpStream::connect_timeout(&target, Duration::from_secs(2)))
        .with_destructor(move |conn: &TcpStream| {
            let _ = conn.shutdown(Shutdown::Both);
            tally.destroyed.fetch_add(1, Ordering::SeqCst);
        })
        .with_id_extractor(|conn: &TcpStream| {
            let local = conn.local_addr().map(|a| a.to_string()).unwrap_or_default();
            let peer = conn.peer_addr().map(|a| a.to_string()).unwrap_or_default();
            format!("{local}->{peer}")
        })
}

fn connection_pool(min: usize, max: usize) -> (ObjectPool<TcpStream>, Arc<Tally>) {
    let tally = Arc::new(Tally::default());
    let pool = ObjectPool::new(connection_config(min, max, echo_server(), &tally)).unwrap();
    (pool, tally)
}

fn round_trip(mut conn: &TcpStream, payload: &[u8]) -> io::Result<Vec<u8>> {
    conn.set_read_timeout(Some(Duration::from_secs(2)))?;
    conn.write_all(payload)?;
    let mut echoed = vec![0; payload.len()];
    conn.read_exact(&mut echoed)?;
    Ok(echoed)
}

#[test]
fn test_new_rejects_min_above_max() {
    let tally = Arc::new(Tally::default());
    let result = ObjectPool::new(connection_config(1024, 512, echo_server(), &tally));
    assert!(matches!(result, Err(PoolError::Configuration(_))));
}

#[test]
fn test_new_rejects_missing_callbacks() {
    let no_constructor = PoolConfiguration::<TcpStream>::new()
        .with_destructor(|_| {})
        .with_id_extractor(|_| String::new());
    assert!(matches!(ObjectPool::new(no_constructor), Err(PoolError::Configuration(_))));

    let no_destructor = PoolConfiguration::<TcpStream>::new()
        .with_constructor(|| TcpStream::connect(echo_server()))
        .with_id_extractor(|_| String::new());
    assert!(matches!(ObjectPool::new(no_destructor), Err(PoolError::Configuration(_))));

    let no_id_extractor = PoolConfiguration::<TcpStream>::new()
        .with_constructor(|| TcpStream::connect(echo_server()))
        .with_destructor(|_| {});
    assert!(matches!(ObjectPool::new(no_id_extractor), Err(PoolError::Configuration(_))));
}

#[test]
fn test_accessors_reflect_configuration() {
    let (pool, _) = connection_pool(512, 1024);
    assert_eq!(pool.max_object_count(), 1024);
    assert_eq!(pool.min_object_count(), 512);
    assert_eq!(pool.idle_time(), IDLE_300S);
    assert_eq!(pool.shrink_batch(), 25);
    assert!(!pool.is_closed());
}

#[test]
fn test_get_connection_and_echo() {
    let (pool, _) = connection_pool(512, 1024);

    let holder = pool.get_object().unwrap();
    assert_eq!(pool.object_count(), 1);
    assert_eq!(round_trip(&holder, b"test from client").unwrap(), b"test from client");
    assert!(pool.object_id(&holder).contains("->"));

    pool.return_object(holder).unwrap();
    assert_eq!(pool.idle_object_count(), 1);
}

#[test]
fn test_get_fails_when_server_down() {
    let tally = Arc::new(Tally::default());
    let pool = ObjectPool::new(connection_config(0, 0, dead_address(), &tally)).unwrap();

    let result = pool.get_object();
    assert!(matches!(result, Err(PoolError::ConstructionFailed(_))));
    assert_eq!(pool.object_count(), 0);
}

#[test]
fn test_return_unusable_destroys_once() {
    let (pool, tally) = connection_pool(512, 1024);

    let mut holder = pool.get_object().unwrap();
    holder.mark_unusable();
    pool.return_object(holder).unwrap();

    assert_eq!(pool.idle_object_count(), 0);
    assert_eq!(pool.object_count(), 0);
    assert_eq!(tally.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_return_foreign_holder_not_found() {
    let (pool, _) = connection_pool(512, 1024);
    let (other, _) = connection_pool(512, 1024);

    let foreign = other.get_object().unwrap();
    assert!(matches!(pool.return_object(foreign), Err(PoolError::NotFound)));
    assert_eq!(pool.object_count(), 0);
    assert_eq!(other.object_count(), 1);
}

#[test]
fn test_use_count_grows_per_cycle() {
    let (pool, _) = connection_pool(512, 1024);

    for expected in 1..=3 {
        let holder = pool.get_object().unwrap();
        assert_eq!(holder.use_count(), expected);
        pool.return_object(holder).unwrap();
    }
    assert_eq!(pool.object_count(), 1);
}

#[test]
fn test_object_and_idle_counts() {
    let (pool, tally) = connection_pool(512, 1024);

    let active: Vec<_> = (0..10).map(|_| pool.get_object().unwrap()).collect();
    for _ in 0..10 {
        let holder = pool.get_object().unwrap();
        pool.return_object(holder).unwrap();
    }

    // the same idle connection is reused each round
    assert_eq!(pool.idle_object_count(), 1);
    assert_eq!(pool.object_count(), 11);

    for holder in active {
        pool.return_object(holder).unwrap();
    }
    assert_eq!(pool.idle_object_count(), 11);
    assert_eq!(pool.object_count(), pool.idle_object_count());
    assert_eq!(tally.destroyed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_concurrent_get_and_return() {
    let (pool, _) = connection_pool(512, 1024);
    let failures = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..32 {
            let pool = &pool;
            let failures = &failures;
            scope.spawn(move || {
                let payload = format!("worker {worker}");
                for _ in 0..25 {
                    match pool.get_object() {
                        Ok(holder) => {
                            if round_trip(&holder, payload.as_bytes()).ok().as_deref()
                                != Some(payload.as_bytes())
                            {
                                failures.fetch_add(1, Ordering::SeqCst);
                            }
                            if pool.return_object(holder).is_err() {
                                failures.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Err(_) => {
                            failures.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            });
        }
    });

    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(pool.object_count(), pool.idle_object_count());
    assert!(pool.object_count() <= 32);
}

#[test]
fn test_idle_pool_does_not_self_trim() {
    let tally = Arc::new(Tally::default());
    let pool = ObjectPool::new(
        connection_config(0, 0, echo_server(), &tally).with_idle_time(Duration::from_millis(10)),
    )
    .unwrap();

    let holders: Vec<_> = (0..3).map(|_| pool.get_object().unwrap()).collect();
    for holder in holders {
        pool.return_object(holder).unwrap();
    }
    let idle_before = pool.idle_object_count();
    let evicted_before = pool.get_metrics().total_evicted;

    thread::sleep(Duration::from_millis(50));
    assert_eq!(pool.idle_object_count(), idle_before);
    assert_eq!(pool.get_metrics().total_evicted, evicted_before);

    // the next return is what reclaims them
    let holder = pool.get_object().unwrap();
    pool.return_object(holder).unwrap();
    assert_eq!(pool.idle_object_count(), 1);
}

#[test]
fn test_close_tears_everything_down() {
    let (pool, tally) = connection_pool(0, 1024);
    let kept = pool.get_object().unwrap();
    let returned = pool.get_object().unwrap();
    pool.return_object(returned).unwrap();

    pool.close();
    pool.close();

    assert!(pool.is_closed());
    assert_eq!(pool.object_count(), 0);
    assert_eq!(tally.destroyed.load(Ordering::SeqCst), 2);
    assert!(matches!(pool.get_object(), Err(PoolError::PoolClosed)));
    assert!(matches!(pool.return_object(kept), Err(PoolError::PoolClosed)));
}

#[tokio::test]
async fn test_async_get_connection() {
    let (pool, tally) = connection_pool(0, 4);
    let pool = Arc::new(pool);

    let holder = pool.get_object_async().await.unwrap();
    assert_eq!(holder.use_count(), 1);
    pool.return_object(holder).unwrap();

    pool.close_async().await.unwrap();
    assert!(pool.is_closed());
    assert_eq!(tally.destroyed.load(Ordering::SeqCst), 1);
}
