//! Ideal adsorbed solution theory (IAST) mixture prediction
//!
//! Given the gas-phase mole fractions and the total pressure at one grid
//! node, IAST returns the adsorbed-phase composition and the per-component
//! equilibrium loadings by equating the reduced spreading pressure ψ across
//! all adsorbing components:
//!
//! ```text
//! ψ_j(P⁰_j) = ψ            for every adsorbing component j
//! x_j = y_j·p_t / P⁰_j     Raoult analogue
//! Σ_j x_j = 1              closure solved for ψ (Newton)
//! 1/q_t = Σ_j x_j / q_j(P⁰_j)
//! n_j = x_j · q_t
//! ```
//!
//! The iteration is warm-started from the caller-owned per-node scratch
//! (`psi` and hypothetical pressures `p0`), which makes repeated calls at
//! slowly-drifting states converge in one or two steps — and makes a call
//! with unchanged inputs reproduce its previous answer bit for bit.

use crate::column::GasComponent;
use crate::equilibrium::{EquilibriumFailure, Isotherm, MixturePrediction};

/// Mole fractions below this threshold do not participate in the IAST
/// closure; their loadings are zero.
const TRACE_MOLE_FRACTION: f64 = 1e-14;

// =================================================================================================
// IdealAdsorbedSolution
// =================================================================================================

/// IAST oracle over per-component pure isotherms
///
/// Carrier components (inert isotherms) are excluded from the closure and
/// always receive zero loading. Construction is infallible; isotherm
/// parameters are validated upstream by the configuration layer.
///
/// # Example
///
/// ```
/// use adsorb_rs::equilibrium::{IdealAdsorbedSolution, Isotherm, MixturePrediction};
///
/// let oracle = IdealAdsorbedSolution::new(vec![
///     Isotherm::inert(),               // He carrier
///     Isotherm::langmuir(3.0, 2e-5),   // CO2
/// ]);
///
/// let y = [0.5, 0.5];
/// let (mut xi, mut ni) = ([0.0; 2], [0.0; 2]);
/// let (mut p0, mut psi) = ([0.0; 2], [0.0; 1]);
/// oracle.predict(&y, 1e5, &mut xi, &mut ni, &mut p0, &mut psi).unwrap();
/// assert_eq!(ni[0], 0.0);              // carrier never adsorbs
/// assert!((ni[1] - 1.5).abs() < 1e-10); // single adsorbing species: pure Langmuir
/// ```
#[derive(Debug, Clone)]
pub struct IdealAdsorbedSolution {
    isotherms: Vec<Isotherm>,
    max_terms: usize,
    max_iterations: usize,
    tolerance: f64,
}

impl IdealAdsorbedSolution {
    /// Oracle from one isotherm per component (inert for the carrier)
    pub fn new(isotherms: Vec<Isotherm>) -> Self {
        let max_terms = isotherms.iter().map(Isotherm::terms).max().unwrap_or(1).max(1);
        Self {
            isotherms,
            max_terms,
            max_iterations: 100,
            tolerance: 1e-12,
        }
    }

    /// Oracle taken straight from the component descriptors
    pub fn from_components(components: &[GasComponent]) -> Self {
        Self::new(components.iter().map(|c| c.isotherm.clone()).collect())
    }

    /// Override the Newton iteration cap (default 100)
    pub fn with_max_iterations(mut self, cap: usize) -> Self {
        self.max_iterations = cap;
        self
    }

    fn n_comp(&self) -> usize {
        self.isotherms.len()
    }

    /// Newton solve of the Σx = 1 closure for the common ψ.
    ///
    /// Writes the converged hypothetical pressures into `p0_out` (indexed by
    /// position in `active`). Returns (ψ, iterations).
    fn solve_spreading_pressure(
        &self,
        y: &[f64],
        p_total: f64,
        active: &[usize],
        p0_cache: &[f64],
        psi_start: f64,
        p0_out: &mut [f64],
    ) -> Result<(f64, usize), EquilibriumFailure> {
        // Warm start from the cache; otherwise the mole-fraction-weighted
        // mixture estimate evaluated at the partial pressures.
        let mut psi = if psi_start > 0.0 && psi_start.is_finite() {
            psi_start
        } else {
            active
                .iter()
                .map(|&j| y[j] * self.isotherms[j].spreading_pressure(y[j] * p_total))
                .sum::<f64>()
        };
        if !(psi > 0.0) {
            psi = f64::MIN_POSITIVE.max(1e-12);
        }

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(EquilibriumFailure::new(self.max_iterations));
            }

            // residual f(ψ) = Σ_j y_j·p_t/P⁰_j(ψ) − 1 and its ψ-derivative
            // f'(ψ) = −Σ_j x_j / q_j(P⁰_j), using dP⁰/dψ = P⁰/q(P⁰).
            let mut f = -1.0;
            let mut fp = 0.0;
            for (slot, &j) in active.iter().enumerate() {
                let warm = p0_cache[j * self.max_terms];
                let p0 = self.isotherms[j]
                    .pressure_at_spreading_pressure(psi, warm)
                    .ok_or(EquilibriumFailure::new(iterations))?;
                if p0 <= 0.0 {
                    return Err(EquilibriumFailure::new(iterations));
                }
                let x = y[j] * p_total / p0;
                f += x;
                fp -= x / self.isotherms[j].loading(p0);
                p0_out[slot] = p0;
            }

            if f.abs() < self.tolerance {
                return Ok((psi, iterations));
            }
            if !fp.is_finite() || fp == 0.0 {
                return Err(EquilibriumFailure::new(iterations));
            }

            let mut step = f / fp;
            // ψ must stay strictly positive; halve any step that escapes
            while psi - step <= 0.0 {
                step *= 0.5;
            }
            psi -= step;
        }
    }
}

impl MixturePrediction for IdealAdsorbedSolution {
    fn predict(
        &self,
        y: &[f64],
        p_total: f64,
        xi: &mut [f64],
        ni: &mut [f64],
        p0_cache: &mut [f64],
        psi_cache: &mut [f64],
    ) -> Result<usize, EquilibriumFailure> {
        debug_assert_eq!(y.len(), self.n_comp());
        debug_assert_eq!(p0_cache.len(), self.n_comp() * self.max_terms);

        xi.fill(0.0);
        ni.fill(0.0);

        let active: Vec<usize> = (0..self.n_comp())
            .filter(|&j| !self.isotherms[j].is_inert() && y[j] > TRACE_MOLE_FRACTION)
            .collect();

        match active.as_slice() {
            // pure carrier: nothing adsorbs
            [] => Ok(1),

            // one adsorbing species: the pure isotherm is exact, no closure
            [j] => {
                let j = *j;
                let p_j = y[j] * p_total;
                xi[j] = 1.0;
                ni[j] = self.isotherms[j].loading(p_j);
                p0_cache[j * self.max_terms] = p_j;
                psi_cache[0] = self.isotherms[j].spreading_pressure(p_j);
                Ok(1)
            }

            _ => {
                let mut p0 = vec![0.0; active.len()];
                let (psi, iterations) = self.solve_spreading_pressure(
                    y,
                    p_total,
                    &active,
                    p0_cache,
                    psi_cache[0],
                    &mut p0,
                )?;

                // adsorbed mole fractions, renormalized to absorb the
                // closure residual left below the tolerance
                let mut x_sum = 0.0;
                for (slot, &j) in active.iter().enumerate() {
                    xi[j] = y[j] * p_total / p0[slot];
                    x_sum += xi[j];
                }
                let mut inverse_total = 0.0;
                for (slot, &j) in active.iter().enumerate() {
                    xi[j] /= x_sum;
                    inverse_total += xi[j] / self.isotherms[j].loading(p0[slot]);
                }
                let q_total = 1.0 / inverse_total;
                for (slot, &j) in active.iter().enumerate() {
                    ni[j] = xi[j] * q_total;
                    p0_cache[j * self.max_terms] = p0[slot];
                }
                psi_cache[0] = psi;

                Ok(iterations)
            }
        }
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_oracle() -> IdealAdsorbedSolution {
        IdealAdsorbedSolution::new(vec![
            Isotherm::inert(),               // carrier
            Isotherm::langmuir(3.0, 2e-5),   // strong
            Isotherm::langmuir(3.0, 2e-6),   // weak
        ])
    }

    fn scratch(oracle: &IdealAdsorbedSolution, n_comp: usize) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; n_comp * oracle.max_terms], vec![0.0; oracle.max_terms])
    }

    #[test]
    fn test_pure_carrier_has_zero_loading() {
        let oracle = binary_oracle();
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        let iters = oracle
            .predict(&[1.0, 0.0, 0.0], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap();

        assert_eq!(iters, 1);
        assert_eq!(ni, vec![0.0; 3]);
    }

    #[test]
    fn test_single_adsorbing_component_matches_pure_isotherm() {
        let oracle = binary_oracle();
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        oracle
            .predict(&[0.5, 0.5, 0.0], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap();

        // b·p = 2e-5 · 5e4 = 1 → q = q_sat/2
        assert!((ni[1] - 1.5).abs() < 1e-10);
        assert_eq!(ni[2], 0.0);
        assert_eq!(xi[1], 1.0);
    }

    #[test]
    fn test_binary_closure_sums_to_one() {
        let oracle = binary_oracle();
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        oracle
            .predict(&[0.2, 0.4, 0.4], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap();

        assert!((xi[1] + xi[2] - 1.0).abs() < 1e-12);
        assert!(ni[1] > 0.0 && ni[2] > 0.0);
        // the strong component dominates the adsorbed phase
        assert!(ni[1] > ni[2]);
        assert_eq!(ni[0], 0.0);
    }

    #[test]
    fn test_equal_components_split_evenly() {
        // identical isotherms at identical mole fractions must give
        // identical loadings
        let oracle = IdealAdsorbedSolution::new(vec![
            Isotherm::inert(),
            Isotherm::langmuir(3.0, 2e-5),
            Isotherm::langmuir(3.0, 2e-5),
        ]);
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        oracle
            .predict(&[0.5, 0.25, 0.25], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap();

        assert!((ni[1] - ni[2]).abs() < 1e-10);
        // together they behave like one component at the summed partial
        // pressure: q_total = q(5e4) = 1.5
        assert!((ni[1] + ni[2] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_warm_start_reproduces_answer_bitwise() {
        let oracle = binary_oracle();
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);
        let y = [0.3, 0.5, 0.2];

        oracle.predict(&y, 1e5, &mut xi, &mut ni, &mut p0, &mut psi).unwrap();
        let first = ni.clone();

        // second call with identical inputs and warm caches
        let iters = oracle.predict(&y, 1e5, &mut xi, &mut ni, &mut p0, &mut psi).unwrap();
        assert_eq!(ni, first);
        assert_eq!(iters, 1, "warm-started call should converge immediately");
    }

    #[test]
    fn test_iteration_cap_is_an_error() {
        let oracle = binary_oracle().with_max_iterations(0);
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        let err = oracle
            .predict(&[0.2, 0.4, 0.4], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap_err();
        assert_eq!(err.iterations, 0);
    }

    #[test]
    fn test_trace_component_is_ignored() {
        let oracle = binary_oracle();
        let (mut p0, mut psi) = scratch(&oracle, 3);
        let (mut xi, mut ni) = (vec![0.0; 3], vec![0.0; 3]);

        oracle
            .predict(&[0.5, 0.5, 1e-300], 1e5, &mut xi, &mut ni, &mut p0, &mut psi)
            .unwrap();
        assert_eq!(ni[2], 0.0);
        assert!((ni[1] - 1.5).abs() < 1e-10);
    }
}
