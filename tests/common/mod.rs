//! Shared fixtures for the integration tests
//!
//! Scenario builders with known analytical anchors, plus mock oracles for
//! failure injection.
#![allow(dead_code)]

pub mod mock_oracles;

use adsorb_rs::column::{ColumnParameters, GasComponent};
use adsorb_rs::equilibrium::{IdealAdsorbedSolution, Isotherm};
use adsorb_rs::solver::{Simulation, SimulationSettings};
use adsorb_rs::transport::MomentumClosure;

/// Column shared by the seed scenarios: L = 0.3 m, ε = 0.4, v = 0.1 m/s,
/// p = 1e5 Pa, T = 300 K. The particle density 16 kg/m³ places the
/// equilibrium-theory half-breakthrough of the CO2 scenario near τ ≈ 4.
pub fn scenario_column(n_grid: usize) -> ColumnParameters {
    ColumnParameters {
        length: 0.3,
        n_grid,
        temperature: 300.0,
        total_pressure: 1e5,
        pressure_gradient: 0.0,
        void_fraction: 0.4,
        particle_density: 16.0,
        entrance_velocity: 0.1,
        particle_diameter: 0.005,
    }
}

/// He carrier (0.9) + CO2 (0.1), Langmuir q_sat = 3 mol/kg, b = 2e-5 1/Pa,
/// Kl = 0.5 1/s
pub fn co2_helium_components() -> Vec<GasComponent> {
    vec![
        GasComponent::carrier("He", 0.9),
        GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
    ]
}

/// He (0.8) + CO2 (0.1) + N2 (0.1); N2 is ten times weaker on the same
/// sorbent
pub fn binary_components() -> Vec<GasComponent> {
    vec![
        GasComponent::carrier("He", 0.8),
        GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
        GasComponent::new("N2", 0.1, 0.3, Isotherm::langmuir(3.0, 2e-6)),
    ]
}

/// Assemble a simulation with the real IAST oracle
pub fn build_simulation(
    params: ColumnParameters,
    components: Vec<GasComponent>,
    momentum: MomentumClosure,
    settings: SimulationSettings,
) -> Simulation {
    let oracle = Box::new(IdealAdsorbedSolution::from_components(&components));
    Simulation::new(params, components, oracle, momentum, settings).unwrap()
}

/// Equilibrium-theory (shock-wave) half-breakthrough estimate for a single
/// Langmuir adsorbate:
/// `τ = 1 + (1−ε)/ε · ρ_p · q*(p_in) · R·T / p_in`
pub fn shock_tau(params: &ColumnParameters, y: f64, q_sat: f64, b: f64) -> f64 {
    let p_in = params.total_pressure * y;
    let q_star = q_sat * b * p_in / (1.0 + b * p_in);
    let phase_ratio = (1.0 - params.void_fraction) / params.void_fraction;
    1.0 + phase_ratio * params.particle_density * q_star * adsorb_rs::GAS_CONSTANT
        * params.temperature
        / p_in
}

/// `|actual − expected| / |expected|`, falling back to the absolute error
/// near zero
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}

/// Linear interpolation of a sampled curve at `t`
pub fn sample_curve(times: &[f64], values: &[f64], t: f64) -> f64 {
    match times.iter().position(|&x| x >= t) {
        Some(0) => values[0],
        Some(i) => {
            let fraction = (t - times[i - 1]) / (times[i] - times[i - 1]);
            values[i - 1] + fraction * (values[i] - values[i - 1])
        }
        None => *values.last().unwrap(),
    }
}
