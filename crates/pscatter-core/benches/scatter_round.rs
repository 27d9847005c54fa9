use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pscatter_addr::{ScatterFlags, TargetId};
use pscatter_backend::MockBackend;
use pscatter_core::{LeasePool, ScatterHandle};

fn single_page_round(c: &mut Criterion) {
    let backend = MockBackend::new();
    backend.seed(0x1000, &[1u8; 256]);

    c.bench_function("scatter_round/single_page", |b| {
        b.iter(|| {
            let h = ScatterHandle::initialize(&backend, TargetId::PHYSICAL, ScatterFlags::NONE, LeasePool::new())
                .unwrap();
            h.prepare_read(black_box(0x1000), black_box(256));
            h.execute().unwrap();
            black_box(h.read_bytes(0x1000, 256));
        })
    });
}

fn many_small_reads_one_round(c: &mut Criterion) {
    let backend = MockBackend::new();
    for i in 0..64u64 {
        backend.seed(i * 0x1000, &[i as u8; 16]);
    }

    c.bench_function("scatter_round/64_tiny_reads", |b| {
        b.iter(|| {
            let h = ScatterHandle::initialize(&backend, TargetId::PHYSICAL, ScatterFlags::NONE, LeasePool::new())
                .unwrap();
            for i in 0..64u64 {
                h.prepare_read(i * 0x1000, 16);
            }
            h.execute().unwrap();
            for i in 0..64u64 {
                black_box(h.read_bytes(i * 0x1000, 16));
            }
        })
    });
}

criterion_group!(benches, single_page_round, many_small_reads_one_round);
criterion_main!(benches);
