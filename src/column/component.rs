//! Gas component descriptors
//!
//! A [`GasComponent`] is immutable during a run: the inlet composition, the
//! LDF mass-transfer coefficient, the optional axial dispersion coefficient
//! and the isotherm bundle consumed by the equilibrium layer. Exactly one
//! component per column is the carrier: it establishes the flow, contributes
//! to total pressure and velocity, and never adsorbs.

use std::fmt;

use crate::equilibrium::Isotherm;

/// One species of the feed mixture
///
/// # Example
///
/// ```
/// use adsorb_rs::column::GasComponent;
/// use adsorb_rs::equilibrium::Isotherm;
///
/// let helium = GasComponent::carrier("He", 0.9);
/// let co2 = GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5));
/// assert!(helium.carrier);
/// assert!(co2.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GasComponent {
    /// Species name, used in output file names and plot legends
    pub name: String,

    /// Inlet gas-phase mole fraction `Yi0` \[-\]
    pub y_in: f64,

    /// LDF mass-transfer coefficient `Kl` \[1/s\]
    pub mass_transfer: f64,

    /// Axial dispersion coefficient `D` \[m²/s\] (zero disables diffusion)
    pub dispersion: f64,

    /// Pure-component isotherm, opaque to the PDE core
    pub isotherm: Isotherm,

    /// Carrier-gas flag: non-adsorbing, establishes the flow
    pub carrier: bool,
}

impl GasComponent {
    /// Adsorbing component without axial dispersion
    pub fn new(name: impl Into<String>, y_in: f64, mass_transfer: f64, isotherm: Isotherm) -> Self {
        Self {
            name: name.into(),
            y_in,
            mass_transfer,
            dispersion: 0.0,
            isotherm,
            carrier: false,
        }
    }

    /// Carrier gas: inert isotherm, zero mass transfer
    pub fn carrier(name: impl Into<String>, y_in: f64) -> Self {
        Self {
            name: name.into(),
            y_in,
            mass_transfer: 0.0,
            dispersion: 0.0,
            isotherm: Isotherm::inert(),
            carrier: true,
        }
    }

    /// Set the axial dispersion coefficient \[m²/s\]
    pub fn with_dispersion(mut self, dispersion: f64) -> Self {
        self.dispersion = dispersion;
        self
    }

    /// Check the descriptor is physically admissible
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("component name must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.y_in) {
            return Err(format!(
                "component '{}': inlet mole fraction must be in [0, 1], got {}",
                self.name, self.y_in
            ));
        }
        if self.mass_transfer < 0.0 {
            return Err(format!(
                "component '{}': mass-transfer coefficient must be >= 0, got {}",
                self.name, self.mass_transfer
            ));
        }
        if self.dispersion < 0.0 {
            return Err(format!(
                "component '{}': axial dispersion coefficient must be >= 0, got {}",
                self.name, self.dispersion
            ));
        }
        if self.carrier && !self.isotherm.is_inert() {
            return Err(format!(
                "component '{}': a carrier gas cannot carry an isotherm",
                self.name
            ));
        }
        if !self.carrier && self.isotherm.is_inert() {
            return Err(format!(
                "component '{}': non-carrier component needs an isotherm",
                self.name
            ));
        }
        self.isotherm.validate().map_err(|e| format!("component '{}': {e}", self.name))
    }
}

impl fmt::Display for GasComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.carrier {
            write!(f, "{} (carrier, y0={})", self.name, self.y_in)
        } else {
            write!(
                f,
                "{} (y0={}, Kl={} 1/s, D={} m2/s, isotherm: {})",
                self.name, self.y_in, self.mass_transfer, self.dispersion, self.isotherm
            )
        }
    }
}

/// Validate a component set as a whole: names unique, exactly one carrier,
/// inlet mole fractions summing to one
pub fn validate_components(components: &[GasComponent]) -> Result<(), String> {
    if components.len() < 2 {
        return Err("need at least a carrier and one adsorbing component".to_string());
    }
    for component in components {
        component.validate()?;
    }

    let mut seen = std::collections::HashSet::new();
    for component in components {
        if !seen.insert(component.name.as_str()) {
            return Err(format!("duplicate component name '{}'", component.name));
        }
    }

    let carriers = components.iter().filter(|c| c.carrier).count();
    if carriers != 1 {
        return Err(format!("exactly one carrier gas is required, got {carriers}"));
    }

    let y_sum: f64 = components.iter().map(|c| c.y_in).sum();
    if (y_sum - 1.0).abs() > 1e-8 {
        return Err(format!("inlet mole fractions must sum to 1, got {y_sum}"));
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================
