//! Criterion benchmarks for the per-event hot path.
//!
//! Every intercepted event is decoded and run through the verdict pipeline on
//! the OS hook thread, so both must stay far below the OS hook timeout.
//!
//! Run with:
//! ```bash
//! cargo bench --package inputgate-core --bench pipeline_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inputgate_core::decode::{decode_keyboard, decode_pointer, msg};
use inputgate_core::pipeline::{self, ConsumerIdentity, ConsumerKind, Verdict};
use inputgate_core::{KeyCode, KeyPhase, Point, RawHookEvent};

fn bench_pipeline_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_run");
    for consumers in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("all_accept", consumers),
            &consumers,
            |b, &n| {
                b.iter(|| {
                    let verdicts = (0..n)
                        .map(|i| {
                            Verdict::accept(ConsumerIdentity::new(
                                format!("c{i}"),
                                ConsumerKind::Listener,
                            ))
                        })
                        .collect();
                    black_box(pipeline::run(verdicts))
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("last_rejects", consumers),
            &consumers,
            |b, &n| {
                b.iter(|| {
                    let verdicts = (0..n)
                        .map(|i| {
                            let identity = ConsumerIdentity::new(format!("c{i}"), ConsumerKind::Binder);
                            let ok = i + 1 != n;
                            Verdict::from_bool(ok, identity).on_rejected(|rejected| {
                                black_box(rejected.len());
                            })
                        })
                        .collect();
                    black_box(pipeline::run(verdicts))
                });
            },
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let key = RawHookEvent::key(KeyCode::A, KeyPhase::Down);
    let wheel = RawHookEvent::pointer(msg::WM_MOUSEWHEEL, Point::new(640, 480), 0x0078_0000);

    c.bench_function("decode_keyboard", |b| b.iter(|| decode_keyboard(black_box(&key))));
    c.bench_function("decode_pointer", |b| b.iter(|| decode_pointer(black_box(&wheel))));
}

fn bench_key_name_parse(c: &mut Criterion) {
    let names = ["A", "CapsLock", "F12", "Numpad7", "0x41", "RightCtrl"];
    c.bench_function("key_name_parse", |b| {
        b.iter(|| {
            for name in names {
                black_box(name.parse::<KeyCode>().ok());
            }
        })
    });
}

criterion_group!(benches, bench_pipeline_run, bench_decode, bench_key_name_parse);
criterion_main!(benches);
