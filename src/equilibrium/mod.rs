//! Mixture adsorption equilibrium
//!
//! The PDE core talks to the equilibrium layer through one narrow contract,
//! [`MixturePrediction`]: given the gas-phase composition and total pressure
//! at a node, produce the adsorbed-phase mole fractions and equilibrium
//! loadings. The shipped implementation is [`IdealAdsorbedSolution`] over
//! per-component [`Isotherm`] models; tests substitute mock oracles to
//! inject failures.
//!
//! Scratch buffers for warm starts are owned by the caller and partitioned
//! per node, so parallel per-node calls are race-free.

use std::fmt;

mod iast;
mod isotherm;

pub use iast::IdealAdsorbedSolution;
pub use isotherm::{Isotherm, IsothermSite};

// =================================================================================================
// Oracle contract
// =================================================================================================

/// Equilibrium oracle called per node per integration stage
///
/// # Contract
///
/// - `y` are gas mole fractions summing to one within roundoff; `p_total`
///   is the node total pressure [Pa].
/// - On success `xi` holds the adsorbed mole fractions and `ni` the
///   equilibrium loadings [mol/kg]; carrier components receive zero.
/// - `p0_cache` (size `n_comp · max_isotherm_terms`) and `psi_cache` (size
///   `max_isotherm_terms`) belong to the calling node and warm-start the
///   internal iteration. A call with unchanged inputs and warm caches must
///   reproduce its previous outputs exactly.
/// - Returns the number of internal iterations on success, or
///   [`EquilibriumFailure`] when the iteration cap is exceeded; the driver
///   surfaces that as a fatal error with step and node context.
pub trait MixturePrediction: Send + Sync {
    fn predict(
        &self,
        y: &[f64],
        p_total: f64,
        xi: &mut [f64],
        ni: &mut [f64],
        p0_cache: &mut [f64],
        psi_cache: &mut [f64],
    ) -> Result<usize, EquilibriumFailure>;
}

/// The oracle's internal iteration failed to converge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquilibriumFailure {
    /// Iterations spent before giving up
    pub iterations: usize,
}

impl EquilibriumFailure {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl fmt::Display for EquilibriumFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "equilibrium iteration diverged after {} iterations", self.iterations)
    }
}

impl std::error::Error for EquilibriumFailure {}

// =================================================================================================
// Performance accounting
// =================================================================================================

/// Running totals of oracle work, printed with the driver's progress lines
///
/// Mirrors the (iterations, calls) pair the driver accumulates over the run;
/// `average()` is the mean number of inner iterations per oracle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IastPerformance {
    pub inner_iterations: usize,
    pub calls: usize,
}

impl IastPerformance {
    pub fn record(&mut self, iterations: usize) {
        self.inner_iterations += iterations;
        self.calls += 1;
    }

    pub fn merge(&mut self, other: IastPerformance) {
        self.inner_iterations += other.inner_iterations;
        self.calls += other.calls;
    }

    /// Mean inner iterations per call (0 before the first call)
    pub fn average(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.inner_iterations as f64 / self.calls as f64
        }
    }
}
