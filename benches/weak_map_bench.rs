use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::rc::Rc;
use std::time::Duration;
use weak_hashmap::{EpochSweep, ManualSweep, SharedEpoch, WeakMap};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> Rc<String> {
    Rc::new(format!("k{:016x}", n))
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("weak_map_insert_10k", |b| {
        b.iter_batched(
            || {
                let keys: Vec<_> = lcg(1).take(10_000).map(key).collect();
                (WeakMap::<String, u64, ManualSweep>::with_policy(ManualSweep), keys)
            },
            |(mut m, keys)| {
                for (i, k) in keys.iter().enumerate() {
                    m.insert(k, i as u64);
                }
                black_box((m, keys))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("weak_map_get_hit", |b| {
        let mut m = WeakMap::with_policy(ManualSweep);
        // Keep owners alive so every probe hits a live entry.
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.insert(k, i as u64);
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_get_dead(c: &mut Criterion) {
    c.bench_function("weak_map_get_dead", |b| {
        let mut m = WeakMap::with_policy(ManualSweep);
        let names: Vec<String> = lcg(11).take(10_000).map(|x| format!("k{:016x}", x)).collect();
        for (i, name) in names.iter().enumerate() {
            // Owner dropped right away; the entry stays until swept.
            m.insert(&Rc::new(name.clone()), i as u64);
        }
        let mut it = names.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()));
        })
    });
}

fn bench_sweep_half_dead(c: &mut Criterion) {
    c.bench_function("weak_map_sweep_10k_half_dead", |b| {
        b.iter_batched(
            || {
                let mut m = WeakMap::<String, u64, ManualSweep>::with_policy(ManualSweep);
                let mut held = Vec::with_capacity(5_000);
                for (i, x) in lcg(13).take(10_000).enumerate() {
                    let k = key(x);
                    m.insert(&k, i as u64);
                    if i % 2 == 0 {
                        held.push(k);
                    }
                }
                (m, held)
            },
            |(mut m, held)| {
                black_box(m.sweep());
                black_box((m, held))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_epoch_check(c: &mut Criterion) {
    c.bench_function("weak_map_insert_epoch_unchanged", |b| {
        let epoch = SharedEpoch::new();
        let mut m = WeakMap::with_policy(EpochSweep::new(epoch.clone()));
        let keys: Vec<_> = lcg(17).take(1_000).map(key).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.insert(k, 1u64));
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_dead, bench_sweep_half_dead, bench_epoch_check
}
criterion_main!(benches);
