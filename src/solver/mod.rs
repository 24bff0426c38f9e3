//! Time integration and the simulation driver
//!
//! # Architecture
//!
//! The driver owns the step loop and the state buffers; the integration
//! scheme and the momentum closure are injected as tagged variants rather
//! than trait objects, because the set of admissible combinations is small
//! and checked at construction:
//!
//! - SSP-RK3 + continuity velocity (baseline partial-pressure transport)
//! - SSP-RK3 + Ergun momentum (mole-fraction transport)
//! - implicit backward-Euler + continuity velocity
//!
//! Every error is a tagged value carrying its context (step, node); nothing
//! at this layer retries or recovers.

mod driver;
mod implicit;
mod linear;
mod ssprk3;

pub use driver::{PulseSettings, RunReport, Simulation, SimulationSettings};
pub use linear::{bicgstab, LinearSettings, LinearSolution};

use std::fmt;

// =================================================================================================
// Error kinds
// =================================================================================================

/// Everything that can abort a run
///
/// Each variant carries the context a caller needs to report the failure:
/// the step index, and the node index where one applies.
#[derive(Debug)]
pub enum SimulationError {
    /// Configuration rejected before the run started
    ConfigInvalid(String),

    /// The equilibrium oracle failed to converge at a node
    EquilibriumDiverged { step: usize, node: usize },

    /// The implicit Newton iteration exhausted its cap
    StepDiverged { step: usize, iterations: usize },

    /// A state array picked up a NaN or infinity
    NumericalBreakdown { step: usize, field: &'static str },

    /// The outlet pressure went negative after commit
    InvalidPressureGradient { step: usize, outlet_pressure: f64 },

    /// Output or input file failure
    Io(std::io::Error),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::ConfigInvalid(message) => {
                write!(f, "invalid configuration: {message}")
            }
            SimulationError::EquilibriumDiverged { step, node } => {
                write!(f, "equilibrium iteration diverged at step {step}, node {node}")
            }
            SimulationError::StepDiverged { step, iterations } => write!(
                f,
                "implicit step {step} failed to converge within {iterations} Newton iterations"
            ),
            SimulationError::NumericalBreakdown { step, field } => {
                write!(f, "non-finite value in field {field} after step {step}")
            }
            SimulationError::InvalidPressureGradient { step, outlet_pressure } => write!(
                f,
                "pressure gradient too large: outlet pressure {outlet_pressure} Pa at step {step}"
            ),
            SimulationError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimulationError {
    fn from(e: std::io::Error) -> Self {
        SimulationError::Io(e)
    }
}

// =================================================================================================
// Integration scheme selection
// =================================================================================================

/// Time-integration scheme, selected at construction
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationScheme {
    /// Explicit three-stage strong-stability-preserving Runge-Kutta
    SspRk3,
    /// Backward-Euler with a matrix-free Newton-Krylov solve per step
    Implicit(ImplicitSettings),
}

/// Tolerances of the implicit scheme
#[derive(Debug, Clone, PartialEq)]
pub struct ImplicitSettings {
    /// Scaled infinity-norm tolerance on the Newton update
    pub tolerance: f64,
    /// Newton iteration cap per step
    pub max_newton_iterations: usize,
    /// Inner linear-solver settings
    pub linear: LinearSettings,
}

impl Default for ImplicitSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_newton_iterations: 50,
            linear: LinearSettings::default(),
        }
    }
}

// =================================================================================================
// Tests
// =================================================================================================
