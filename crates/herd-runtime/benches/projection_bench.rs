use criterion::{criterion_group, criterion_main, Criterion};
use herd_core::SimParams;
use herd_econ::ViewConfig;
use herd_runtime::{report_for, run_projection, EngineConfig};

fn params(units: u32) -> SimParams {
    SimParams {
        units_count: units,
        simulation_years: 10,
        ..SimParams::default()
    }
}

fn bench_projection(c: &mut Criterion) {
    let config = EngineConfig::default();
    for units in [1u32, 10] {
        let p = params(units);
        c.bench_function(&format!("projection_{units}_units_10y"), |b| {
            b.iter(|| {
                let _ = run_projection(&p, &config);
            })
        });
    }

    let projection = match run_projection(&params(10), &config) {
        Ok(p) => p,
        Err(e) => panic!("bench setup failed: {e}"),
    };
    let cost_view = ViewConfig::welfare_cost();
    c.bench_function("report_welfare_cost_view", |b| {
        b.iter(|| {
            let _ = report_for(&projection, &cost_view, None, None);
        })
    });
}

criterion_group!(benches, bench_projection);
criterion_main!(benches);
