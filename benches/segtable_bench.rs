use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use segtable::{
    AppendSync, ComponentRegistry, FullSync, NoSync, SegmentedVector, SlotMap, SlottedTable,
    StorageConfig, SyncPolicy,
};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

// 10k distinct positions below `n`, same sequence on every run.
fn picks(n: usize, count: usize) -> Vec<usize> {
    let mut sel = std::collections::HashSet::with_capacity(count);
    let mut s = 0x9e3779b97f4a7c15u64;
    while sel.len() < count.min(n) {
        s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
        sel.insert((s as usize) % n);
    }
    sel.into_iter().collect()
}

fn push_100k<P: SyncPolicy>(c: &mut Criterion, name: &str) {
    c.bench_function(name, |b| {
        b.iter_batched(
            SegmentedVector::<u64, P>::new,
            |v| {
                for x in lcg(1).take(100_000) {
                    v.push_back(x);
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_vector_push(c: &mut Criterion) {
    push_100k::<NoSync>(c, "vector::push_100k_nosync");
    push_100k::<AppendSync>(c, "vector::push_100k_append");
    push_100k::<FullSync>(c, "vector::push_100k_full");

    c.bench_function("vector::push_100k_reserved", |b| {
        b.iter_batched(
            || {
                let v = SegmentedVector::<u64>::new();
                v.reserve(100_000);
                v
            },
            |v| {
                for x in lcg(2).take(100_000) {
                    v.push_back(x);
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_vector_erase(c: &mut Criterion) {
    c.bench_function("vector::erase_random_10k_of_100k", |b| {
        b.iter_batched(
            || {
                let v = SegmentedVector::<u64, NoSync>::with_config(
                    StorageConfig::new().with_shrink(true),
                )
                .unwrap();
                for x in lcg(3).take(100_000) {
                    v.push_back(x);
                }
                v
            },
            |v| {
                let mut s = 0x9e3779b97f4a7c15u64;
                for _ in 0..10_000 {
                    s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                    black_box(v.erase((s as usize) % v.size()));
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_table_churn(c: &mut Criterion) {
    c.bench_function("table::erase_then_reuse_10k_of_100k", |b| {
        b.iter_batched(
            || {
                let t = SlottedTable::<u64, NoSync>::new();
                for x in lcg(4).take(100_000) {
                    t.add(x);
                }
                (t, picks(100_000, 10_000))
            },
            |(t, targets)| {
                for &i in &targets {
                    black_box(t.erase(i));
                }
                for x in lcg(5).take(targets.len()) {
                    black_box(t.add(x));
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("table::at_hit_10k_on_100k", |b| {
        let t = SlottedTable::<u64>::new();
        for x in lcg(6).take(100_000) {
            t.add(x);
        }
        let queries = picks(100_000, 10_000);
        b.iter(|| {
            for &i in &queries {
                black_box(t.at(i));
            }
        })
    });
}

fn bench_slot_map(c: &mut Criterion) {
    c.bench_function("slot_map::at_hit_10k_on_100k", |b| {
        let m = SlotMap::<u64, u64>::new();
        let handles: Vec<(usize, u64)> = lcg(7)
            .take(100_000)
            .map(|id| (m.add(id, id ^ 0xff).unwrap(), id))
            .collect();
        let queries: Vec<(usize, u64)> = picks(handles.len(), 10_000)
            .into_iter()
            .map(|i| handles[i])
            .collect();
        b.iter(|| {
            for (h, id) in &queries {
                black_box(m.at(*h, id));
            }
        })
    });

    c.bench_function("slot_map::erase_random_10k_of_100k", |b| {
        b.iter_batched(
            || {
                let m = SlotMap::<u64, u64, NoSync>::new();
                let handles: Vec<(usize, u64)> = lcg(8)
                    .take(100_000)
                    .map(|id| (m.add(id, id).unwrap(), id))
                    .collect();
                let targets: Vec<(usize, u64)> = picks(handles.len(), 10_000)
                    .into_iter()
                    .map(|i| handles[i])
                    .collect();
                (m, targets)
            },
            |(m, targets)| {
                for (h, id) in targets {
                    black_box(m.erase(h, &id));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("slot_map::for_each_100k", |b| {
        let m = SlotMap::<u64, u64>::new();
        for id in lcg(9).take(100_000) {
            m.add(id, id);
        }
        b.iter(|| {
            let mut sum = 0u64;
            m.for_each(|_, _, v| sum = sum.wrapping_add(*v));
            black_box(sum)
        })
    });

    c.bench_function("slot_map::sort_by_key_100k", |b| {
        b.iter_batched(
            || {
                let m = SlotMap::<u64, u64, NoSync>::new();
                for id in lcg(11).take(100_000) {
                    m.add(id, id.rotate_left(17));
                }
                m
            },
            |m| {
                m.sort_by_key(|v| *v);
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_registry(c: &mut Criterion) {
    c.bench_function("registry::spawn_insert_despawn_10k", |b| {
        b.iter_batched(
            ComponentRegistry::new,
            |mut reg| {
                let entities: Vec<_> = lcg(10)
                    .take(10_000)
                    .map(|x| {
                        let e = reg.spawn();
                        let _ = reg.insert(e, x);
                        let _ = reg.insert(e, x as u32);
                        e
                    })
                    .collect();
                for e in entities {
                    reg.despawn(e);
                }
                black_box(reg)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_vector;
    config = bench_config();
    targets = bench_vector_push, bench_vector_erase
}
criterion_group! {
    name = benches_keyed;
    config = bench_config();
    targets = bench_table_churn,
              bench_slot_map,
              bench_registry
}
criterion_main!(benches_vector, benches_keyed);
