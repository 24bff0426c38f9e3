//! Mock equilibrium oracles for failure injection and determinism checks

use std::sync::atomic::{AtomicUsize, Ordering};

use adsorb_rs::equilibrium::{EquilibriumFailure, MixturePrediction};

/// Delegates to an inner oracle until a fixed number of calls has been
/// served, then fails every call
///
/// Lets a test abort a run at an exact step: with the serial sweep the
/// driver makes one call per node, `nodes` calls at initialization and
/// `3·nodes` per explicit step.
pub struct FailAfter<O> {
    inner: O,
    calls_before_failure: usize,
    calls: AtomicUsize,
}

impl<O> FailAfter<O> {
    pub fn new(inner: O, calls_before_failure: usize) -> Self {
        Self { inner, calls_before_failure, calls: AtomicUsize::new(0) }
    }
}

impl<O: MixturePrediction> MixturePrediction for FailAfter<O> {
    fn predict(
        &self,
        y: &[f64],
        p_total: f64,
        xi: &mut [f64],
        ni: &mut [f64],
        p0_cache: &mut [f64],
        psi_cache: &mut [f64],
    ) -> Result<usize, EquilibriumFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.calls_before_failure {
            return Err(EquilibriumFailure::new(0));
        }
        self.inner.predict(y, p_total, xi, ni, p0_cache, psi_cache)
    }
}

/// Always returns zero loadings: turns the column into an inert tube
pub struct InertOracle;

impl MixturePrediction for InertOracle {
    fn predict(
        &self,
        _y: &[f64],
        _p_total: f64,
        xi: &mut [f64],
        ni: &mut [f64],
        _p0_cache: &mut [f64],
        _psi_cache: &mut [f64],
    ) -> Result<usize, EquilibriumFailure> {
        xi.fill(0.0);
        ni.fill(0.0);
        Ok(1)
    }
}
