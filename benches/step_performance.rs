//! Performance benchmarks for the breakthrough stepper

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use adsorb_rs::column::{ColumnParameters, GasComponent};
use adsorb_rs::equilibrium::{IdealAdsorbedSolution, Isotherm};
use adsorb_rs::solver::{Simulation, SimulationSettings};
use adsorb_rs::transport::MomentumClosure;

fn binary_components() -> Vec<GasComponent> {
    vec![
        GasComponent::carrier("He", 0.8),
        GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
        GasComponent::new("N2", 0.1, 0.3, Isotherm::langmuir(3.0, 2e-6)),
    ]
}

fn initialized_simulation(n_grid: usize) -> Simulation {
    let components = binary_components();
    let oracle = Box::new(IdealAdsorbedSolution::from_components(&components));
    let params = ColumnParameters {
        n_grid,
        particle_density: 16.0,
        ..ColumnParameters::default()
    };
    let settings = SimulationSettings {
        dt: 0.01,
        n_steps: 0,
        write_every: 0,
        print_every: 0,
        ..SimulationSettings::default()
    };
    let mut sim =
        Simulation::new(params, components, oracle, MomentumClosure::Continuity, settings)
            .unwrap();
    sim.initialize().unwrap();
    sim
}

/// One SSP-RK3 step (three oracle sweeps plus stencils) at several grid
/// resolutions
fn benchmark_ssprk3_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("ssprk3_step");

    for n_grid in [50, 100, 200, 400] {
        group.bench_with_input(BenchmarkId::from_parameter(n_grid), &n_grid, |b, &n_grid| {
            b.iter_batched(
                || initialized_simulation(n_grid),
                |mut sim| {
                    sim.advance(black_box(0)).unwrap();
                    sim
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

/// A 50-step run including initialization, the end-to-end hot path
fn benchmark_short_run(c: &mut Criterion) {
    c.bench_function("run_50_steps_n100", |b| {
        b.iter(|| {
            let mut sim = initialized_simulation(100);
            for step in 0..50 {
                sim.advance(step).unwrap();
            }
            black_box(sim.performance())
        });
    });
}

criterion_group!(benches, benchmark_ssprk3_step, benchmark_short_run);
criterion_main!(benches);
