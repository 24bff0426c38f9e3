//! adsorb-rs: Fixed-Bed Adsorption Breakthrough Simulation Framework
//!
//! Simulates the transient breakthrough of a gas mixture through a packed
//! adsorption column: a linear-driving-force (LDF) mass-transfer model
//! coupled to multicomponent isotherm equilibrium (ideal adsorbed solution
//! theory, IAST) on a one-dimensional finite-difference grid.
//!
//! # Architecture
//!
//! The crate separates the physics from the numerics and the immutable from
//! the mutable:
//!
//! 1. **Descriptors vs. state** — [`column::ColumnGrid`] and
//!    [`column::GasComponent`] are fixed at construction; the mutable
//!    arrays live in [`column::BedState`] with per-stage
//!    [`column::Derivatives`] buffers.
//! 2. **Strategies as tagged variants** — the momentum closure
//!    ([`transport::MomentumClosure`]) and the integration scheme
//!    ([`solver::IntegrationScheme`]) are injected into the driver; the
//!    admissible combinations are checked at construction.
//! 3. **Narrow oracle boundary** — the PDE core reaches the equilibrium
//!    layer only through [`equilibrium::MixturePrediction`], so tests can
//!    substitute failing or analytic oracles.
//!
//! # Quick Start
//!
//! ```rust
//! use adsorb_rs::column::{ColumnParameters, GasComponent};
//! use adsorb_rs::equilibrium::{IdealAdsorbedSolution, Isotherm};
//! use adsorb_rs::solver::{Simulation, SimulationSettings};
//! use adsorb_rs::transport::MomentumClosure;
//!
//! // 1. Describe the feed: a carrier plus one adsorbing species
//! let components = vec![
//!     GasComponent::carrier("He", 0.9),
//!     GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
//! ];
//!
//! // 2. Column and run control
//! let params = ColumnParameters { n_grid: 50, ..ColumnParameters::default() };
//! let settings = SimulationSettings { n_steps: 200, ..SimulationSettings::default() };
//!
//! // 3. Assemble and run
//! let oracle = Box::new(IdealAdsorbedSolution::from_components(&components));
//! let mut simulation = Simulation::new(
//!     params,
//!     components,
//!     oracle,
//!     MomentumClosure::Continuity,
//!     settings,
//! ).unwrap();
//! let report = simulation.run().unwrap();
//! assert_eq!(report.steps, 200);
//! ```
//!
//! # Modules
//!
//! - [`column`]: grid descriptor, component descriptors, state arrays
//! - [`equilibrium`]: isotherm models and the IAST oracle
//! - [`transport`]: spatial stencils and momentum closures
//! - [`solver`]: SSP-RK3 and implicit integrators, the simulation driver
//! - [`config`]: plaintext input files
//! - [`output`]: observers, breakthrough data files, charts

pub mod column;
pub mod config;
pub mod equilibrium;
pub mod output;
pub mod solver;
pub mod transport;

/// Universal gas constant R \[J/(mol·K)\]
pub const GAS_CONSTANT: f64 = 8.31446261815324;

pub mod prelude {
    //! Convenient imports for common usage
    pub use crate::column::{BedState, ColumnGrid, ColumnParameters, GasComponent};
    pub use crate::config::SimulationInput;
    pub use crate::equilibrium::{IdealAdsorbedSolution, Isotherm, MixturePrediction};
    pub use crate::output::{BreakthroughRecorder, BreakthroughWriter, ColumnObserver};
    pub use crate::solver::{Simulation, SimulationError, SimulationSettings};
    pub use crate::transport::{CarrierGas, MomentumClosure};
}
