//! Pure-component adsorption isotherm models
//!
//! An [`Isotherm`] is a sum of independent adsorption sites. Each site maps a
//! partial pressure to an equilibrium loading, and — crucially for the IAST
//! coupling — carries a closed-form reduced spreading pressure
//!
//! ```text
//! ψ(p) = ∫₀ᵖ q(p')/p' dp'
//! ```
//!
//! | Site model | Loading q(p)            | Reduced spreading pressure ψ(p) |
//! |------------|-------------------------|---------------------------------|
//! | Langmuir   | q_sat·b·p / (1 + b·p)   | q_sat·ln(1 + b·p)               |
//! | Henry      | k·p                     | k·p                             |
//!
//! Single-site isotherms invert ψ analytically; multi-site isotherms fall
//! back to a guarded Newton iteration warm-started from the caller's cache.

use std::fmt;

/// Newton cap for the multi-site ψ inversion.
const INVERSION_MAX_ITERATIONS: usize = 64;

/// Relative tolerance on ψ when inverting multi-site isotherms.
const INVERSION_TOLERANCE: f64 = 1e-12;

// =================================================================================================
// IsothermSite
// =================================================================================================

/// One adsorption site of a (possibly multi-site) isotherm
///
/// Parameters are validated by [`Isotherm::validate`], not at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IsothermSite {
    /// Langmuir site: `q(p) = q_sat·b·p / (1 + b·p)`
    ///
    /// `q_sat` [mol/kg] is the saturation loading, `b` [1/Pa] the affinity.
    Langmuir { q_sat: f64, b: f64 },

    /// Henry site: `q(p) = k·p`
    ///
    /// `k` [mol/kg/Pa] is the Henry coefficient.
    Henry { k: f64 },
}

impl IsothermSite {
    /// Equilibrium loading at partial pressure `p` [Pa]
    pub fn loading(&self, p: f64) -> f64 {
        match *self {
            IsothermSite::Langmuir { q_sat, b } => q_sat * b * p / (1.0 + b * p),
            IsothermSite::Henry { k } => k * p,
        }
    }

    /// Reduced spreading pressure `ψ(p) = ∫₀ᵖ q/p' dp'` [mol/kg]
    pub fn spreading_pressure(&self, p: f64) -> f64 {
        match *self {
            IsothermSite::Langmuir { q_sat, b } => q_sat * (b * p).ln_1p(),
            IsothermSite::Henry { k } => k * p,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            IsothermSite::Langmuir { q_sat, b } => {
                if q_sat <= 0.0 {
                    return Err(format!("Langmuir saturation loading must be > 0, got {q_sat}"));
                }
                if b <= 0.0 {
                    return Err(format!("Langmuir affinity must be > 0, got {b}"));
                }
                Ok(())
            }
            IsothermSite::Henry { k } => {
                if k <= 0.0 {
                    return Err(format!("Henry coefficient must be > 0, got {k}"));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for IsothermSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IsothermSite::Langmuir { q_sat, b } => write!(f, "Langmuir(q_sat={q_sat}, b={b})"),
            IsothermSite::Henry { k } => write!(f, "Henry(k={k})"),
        }
    }
}

// =================================================================================================
// Isotherm
// =================================================================================================

/// Multi-site pure-component isotherm: the sum of its sites
///
/// A carrier gas is represented by an empty isotherm, which has zero loading
/// at every pressure.
///
/// # Example
///
/// ```
/// use adsorb_rs::equilibrium::{Isotherm, IsothermSite};
///
/// let co2 = Isotherm::langmuir(3.0, 2e-5);
/// assert!(co2.validate().is_ok());
/// // Half coverage at b·p = 1
/// assert!((co2.loading(5e4) - 1.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Isotherm {
    sites: Vec<IsothermSite>,
}

impl Isotherm {
    /// Isotherm from an explicit site list
    pub fn new(sites: Vec<IsothermSite>) -> Self {
        Self { sites }
    }

    /// Empty isotherm: zero uptake everywhere (carrier gas)
    pub fn inert() -> Self {
        Self { sites: Vec::new() }
    }

    /// Single-site Langmuir isotherm
    pub fn langmuir(q_sat: f64, b: f64) -> Self {
        Self::new(vec![IsothermSite::Langmuir { q_sat, b }])
    }

    /// Single-site Henry isotherm
    pub fn henry(k: f64) -> Self {
        Self::new(vec![IsothermSite::Henry { k }])
    }

    /// Append a site (dual-site Langmuir and friends)
    pub fn add_site(&mut self, site: IsothermSite) {
        self.sites.push(site);
    }

    /// Number of sites (isotherm terms)
    pub fn terms(&self) -> usize {
        self.sites.len()
    }

    /// True when the isotherm has no sites
    pub fn is_inert(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn sites(&self) -> &[IsothermSite] {
        &self.sites
    }

    /// Check every site parameter is physically admissible
    pub fn validate(&self) -> Result<(), String> {
        for site in &self.sites {
            site.validate()?;
        }
        Ok(())
    }

    /// Equilibrium loading at partial pressure `p` [Pa]
    pub fn loading(&self, p: f64) -> f64 {
        self.sites.iter().map(|s| s.loading(p)).sum()
    }

    /// Reduced spreading pressure `ψ(p)` [mol/kg]
    pub fn spreading_pressure(&self, p: f64) -> f64 {
        self.sites.iter().map(|s| s.spreading_pressure(p)).sum()
    }

    /// Invert `ψ(p) = psi` for the hypothetical pure-component pressure
    ///
    /// Single sites invert in closed form. Multi-site isotherms run a guarded
    /// Newton iteration (`dψ/dp = q(p)/p`) starting from `warm_start` when it
    /// is positive, halving any step that would leave the positive axis.
    ///
    /// Returns `None` when the iteration fails to converge, which the IAST
    /// layer surfaces as an equilibrium failure.
    pub fn pressure_at_spreading_pressure(&self, psi: f64, warm_start: f64) -> Option<f64> {
        if psi <= 0.0 {
            return Some(0.0);
        }
        match self.sites.as_slice() {
            [] => None,
            [IsothermSite::Langmuir { q_sat, b }] => Some((psi / q_sat).exp_m1() / b),
            [IsothermSite::Henry { k }] => Some(psi / k),
            _ => self.invert_multi_site(psi, warm_start),
        }
    }

    fn invert_multi_site(&self, psi: f64, warm_start: f64) -> Option<f64> {
        // Start from the cache, or from the closed-form inversion of the
        // stiffest single site (an upper bound on the answer is not needed,
        // only a positive point on the curve).
        let mut p = if warm_start > 0.0 && warm_start.is_finite() {
            warm_start
        } else {
            self.sites
                .iter()
                .filter_map(|s| match *s {
                    IsothermSite::Langmuir { q_sat, b } => {
                        Some((psi / (self.terms() as f64 * q_sat)).exp_m1() / b)
                    }
                    IsothermSite::Henry { k } => Some(psi / (self.terms() as f64 * k)),
                })
                .fold(f64::MAX, f64::min)
        };
        if !(p > 0.0) || !p.is_finite() {
            p = psi;
        }

        for _ in 0..INVERSION_MAX_ITERATIONS {
            let f = self.spreading_pressure(p) - psi;
            if f.abs() <= INVERSION_TOLERANCE * psi.max(1.0) {
                return Some(p);
            }
            // dψ/dp = q(p)/p
            let slope = self.loading(p) / p;
            if !slope.is_finite() || slope <= 0.0 {
                return None;
            }
            let mut step = f / slope;
            // keep the iterate strictly positive
            while p - step <= 0.0 {
                step *= 0.5;
            }
            p -= step;
        }
        None
    }
}

impl fmt::Display for Isotherm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sites.is_empty() {
            return write!(f, "inert");
        }
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{site}")?;
        }
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_langmuir_loading() {
        let iso = Isotherm::langmuir(3.0, 2e-5);

        // q(0) = 0
        assert_eq!(iso.loading(0.0), 0.0);

        // Half coverage at b·p = 1
        assert!((iso.loading(5e4) - 1.5).abs() < 1e-12);

        // Saturation limit
        assert!(iso.loading(1e12) > 2.999);
        assert!(iso.loading(1e12) < 3.0);
    }

    #[test]
    fn test_henry_loading_is_linear() {
        let iso = Isotherm::henry(1e-6);
        assert!((iso.loading(1e5) - 0.1).abs() < 1e-15);
        assert!((iso.loading(2e5) - 2.0 * iso.loading(1e5)).abs() < 1e-15);
    }

    #[test]
    fn test_inert_isotherm() {
        let iso = Isotherm::inert();
        assert!(iso.is_inert());
        assert_eq!(iso.terms(), 0);
        assert_eq!(iso.loading(1e5), 0.0);
        assert_eq!(iso.spreading_pressure(1e5), 0.0);
    }

    #[test]
    fn test_spreading_pressure_langmuir_closed_form() {
        let (q_sat, b) = (3.0, 2e-5);
        let iso = Isotherm::langmuir(q_sat, b);
        let p = 7.3e4;
        let expected = q_sat * (1.0 + b * p).ln();
        assert!((iso.spreading_pressure(p) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_spreading_pressure_matches_quadrature() {
        // ψ(p) = ∫ q/p' dp' by midpoint rule against the closed form
        let iso = Isotherm::langmuir(2.0, 5e-5);
        let p_end = 4e4;
        let n = 200_000;
        let dp = p_end / n as f64;
        let mut integral = 0.0;
        for i in 0..n {
            let p = (i as f64 + 0.5) * dp;
            integral += iso.loading(p) / p * dp;
        }
        assert!((integral - iso.spreading_pressure(p_end)).abs() < 1e-4);
    }

    #[test]
    fn test_single_site_inversion_roundtrip() {
        let iso = Isotherm::langmuir(3.0, 2e-5);
        for &p in &[1.0, 1e3, 5e4, 2e5] {
            let psi = iso.spreading_pressure(p);
            let back = iso.pressure_at_spreading_pressure(psi, 0.0).unwrap();
            assert!((back - p).abs() < 1e-8 * p, "p={p} back={back}");
        }
    }

    #[test]
    fn test_henry_inversion_roundtrip() {
        let iso = Isotherm::henry(1e-6);
        let psi = iso.spreading_pressure(3e4);
        assert!((iso.pressure_at_spreading_pressure(psi, 0.0).unwrap() - 3e4).abs() < 1e-8);
    }

    #[test]
    fn test_multi_site_inversion_roundtrip() {
        let mut iso = Isotherm::langmuir(2.0, 1e-5);
        iso.add_site(IsothermSite::Langmuir { q_sat: 1.0, b: 4e-4 });
        assert_eq!(iso.terms(), 2);

        for &p in &[10.0, 1e3, 1e5] {
            let psi = iso.spreading_pressure(p);
            // cold start
            let cold = iso.pressure_at_spreading_pressure(psi, 0.0).unwrap();
            assert!((cold - p).abs() < 1e-6 * p.max(1.0), "cold p={p} got {cold}");
            // warm start from the exact answer must return it unchanged
            let warm = iso.pressure_at_spreading_pressure(psi, p).unwrap();
            assert!((warm - p).abs() < 1e-6 * p.max(1.0));
        }
    }

    #[test]
    fn test_inversion_at_zero() {
        let iso = Isotherm::langmuir(3.0, 2e-5);
        assert_eq!(iso.pressure_at_spreading_pressure(0.0, 0.0), Some(0.0));
    }

    #[test]
    fn test_validate_rejects_nonpositive_parameters() {
        assert!(Isotherm::langmuir(0.0, 2e-5).validate().is_err());
        assert!(Isotherm::langmuir(3.0, -1.0).validate().is_err());
        assert!(Isotherm::henry(0.0).validate().is_err());
        assert!(Isotherm::langmuir(3.0, 2e-5).validate().is_ok());
        assert!(Isotherm::inert().validate().is_ok());
    }

    #[test]
    fn test_display() {
        let mut iso = Isotherm::langmuir(3.0, 2e-5);
        iso.add_site(IsothermSite::Henry { k: 1e-7 });
        let text = format!("{iso}");
        assert!(text.contains("Langmuir"));
        assert!(text.contains("Henry"));
        assert_eq!(format!("{}", Isotherm::inert()), "inert");
    }
}
