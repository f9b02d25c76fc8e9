use criterion::{Criterion, criterion_group, criterion_main};
use elastic_objectpool::{ObjectPool, PoolConfiguration};
use std::hint::black_box;

fn buffer_pool() -> ObjectPool<Vec<u8>> {
    ObjectPool::new(
        PoolConfiguration::new()
            .with_max_object_count(64)
            .with_constructor(|| Ok::<_, std::io::Error>(vec![0u8; 4096]))
            .with_destructor(|_| {})
            .with_id_extractor(|buf| format!("{:p}", buf.as_ptr())),
    )
    .expect("valid configuration")
}

fn get_return(c: &mut Criterion) {
    let pool = buffer_pool();
    pool.warmup(8).expect("warmup");

    c.bench_function("get_return_warm", |b| {
        b.iter(|| {
            let holder = pool.get_object().expect("idle object");
            black_box(holder.len());
            pool.return_object(holder).expect("return");
        })
    });

    c.bench_function("get_return_unusable", |b| {
        b.iter(|| {
            let mut holder = pool.get_object().expect("object");
            holder.mark_unusable();
            pool.return_object(holder).expect("return");
        })
    });
}

criterion_group!(benches, get_return);
criterion_main!(benches);
