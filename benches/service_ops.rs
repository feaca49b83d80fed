use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, distributions::Alphanumeric, rngs::StdRng};
use tokio_util::sync::CancellationToken;

use dialdb::{DialService, DialStore, SystemClock, TracingObserver};

const BOARD_SIZES: &[usize] = &[1, 8, 64];

struct Backend {
    _dir: tempfile::TempDir,
    service: DialService,
    cancel: CancellationToken,
}

impl Backend {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Arc::new(DialStore::open(dir.path().join("store")).expect("open store"));
        let service = DialService::new(store, Arc::new(SystemClock), Arc::new(TracingObserver))
            .expect("service init");
        Self {
            _dir: dir,
            service,
            cancel: CancellationToken::new(),
        }
    }
}

fn random_token(rng: &mut StdRng) -> String {
    (0..16).map(|_| rng.sample(Alphanumeric) as char).collect()
}

fn bench_dial_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("dial");
    let backend = Backend::new();
    let mut rng = StdRng::seed_from_u64(7);

    group.bench_function("create", |b| {
        b.iter(|| {
            let token = random_token(&mut rng);
            let dial = backend
                .service
                .create_dial(&backend.cancel, "bench", &token)
                .expect("create dial");
            black_box(dial.id);
        });
    });

    let dial = backend
        .service
        .create_dial(&backend.cancel, "bench", "token")
        .expect("create dial");

    group.bench_function("set", |b| {
        let mut value = 0.0;
        b.iter(|| {
            value += 1.0;
            backend
                .service
                .set_dial(&backend.cancel, &dial.id, "token", value)
                .expect("set dial");
        });
    });

    group.bench_function("get", |b| {
        b.iter(|| {
            let fetched = backend
                .service
                .get_dial(&backend.cancel, &dial.id)
                .expect("get dial");
            black_box(fetched.value);
        });
    });

    group.finish();
}

fn bench_board_materialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("board_get");

    for &size in BOARD_SIZES {
        let backend = Backend::new();
        let refs: Vec<_> = (0..size)
            .map(|i| {
                backend
                    .service
                    .create_dial(&backend.cancel, &format!("dial-{i}"), "token")
                    .expect("create dial")
                    .id
            })
            .collect();
        let board = backend
            .service
            .create_board(&backend.cancel, "bench", "token")
            .expect("create board");
        backend
            .service
            .set_board(&backend.cancel, &board.id, "token", refs)
            .expect("set board");

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let fetched = backend
                    .service
                    .get_board(&backend.cancel, &board.id)
                    .expect("get board");
                black_box(fetched.dials.len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dial_ops, bench_board_materialization);
criterion_main!(benches);
