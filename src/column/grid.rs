//! Column grid descriptor
//!
//! [`ColumnGrid`] is the immutable half of the state split: grid resolution,
//! operating conditions and the per-component sorption prefactors, fixed
//! once at construction and shared read-only by stencils, momentum closures
//! and integrators. The mutable arrays live in
//! [`BedState`](crate::column::BedState).

use crate::column::{validate_components, GasComponent};
use crate::GAS_CONSTANT;

/// Geometry and operating conditions of the packed column
///
/// The fields mirror the input-file keys one to one; [`ColumnGrid::new`]
/// validates them.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnParameters {
    /// Column length `L` \[m\]
    pub length: f64,
    /// Number of grid cells `N` (the column carries `N + 1` nodes)
    pub n_grid: usize,
    /// Absolute temperature \[K\]
    pub temperature: f64,
    /// Inlet total pressure \[Pa\]
    pub total_pressure: f64,
    /// Imposed pressure gradient `dPt/dx` \[Pa/m\] (baseline variant)
    pub pressure_gradient: f64,
    /// Column void fraction `ε` \[-\], in (0, 1)
    pub void_fraction: f64,
    /// Sorbent particle density `ρ_p` \[kg/m³\]
    pub particle_density: f64,
    /// Interstitial velocity at the column entrance `v_in` \[m/s\]
    pub entrance_velocity: f64,
    /// Packed-bed particle diameter `d_p` \[m\] (Ergun closure)
    pub particle_diameter: f64,
}

impl Default for ColumnParameters {
    fn default() -> Self {
        Self {
            length: 0.3,
            n_grid: 100,
            temperature: 300.0,
            total_pressure: 1e5,
            pressure_gradient: 0.0,
            void_fraction: 0.4,
            particle_density: 1000.0,
            entrance_velocity: 0.1,
            particle_diameter: 0.005,
        }
    }
}

/// Immutable grid descriptor: N+1 nodes at spacing `dx = L/N`, node 0 at the
/// inlet, node N at the outlet, plus the sorption prefactors
///
/// The per-node-per-component arrays of the bed state are flat and
/// node-major with components contiguous: entry `(i, j)` lives at
/// `i·n_comp + j`. [`ColumnGrid::idx`] is the single source of that layout.
///
/// `prefactor[j] = R·T·((1−ε)/ε)·ρ_p·Kl[j]` converts an LDF loading rate
/// into a partial-pressure sink.
#[derive(Debug, Clone)]
pub struct ColumnGrid {
    params: ColumnParameters,
    dx: f64,
    n_comp: usize,
    prefactor: Vec<f64>,
    carrier_index: usize,
    max_isotherm_terms: usize,
}

impl ColumnGrid {
    /// Build and validate the descriptor for a component set
    pub fn new(params: ColumnParameters, components: &[GasComponent]) -> Result<Self, String> {
        validate_components(components)?;

        if params.length <= 0.0 {
            return Err(format!("column length must be > 0, got {}", params.length));
        }
        if params.n_grid < 2 {
            return Err(format!("need at least 2 grid cells, got {}", params.n_grid));
        }
        if params.temperature <= 0.0 {
            return Err(format!("temperature must be > 0, got {}", params.temperature));
        }
        if params.total_pressure <= 0.0 {
            return Err(format!("total pressure must be > 0, got {}", params.total_pressure));
        }
        if params.void_fraction <= 0.0 || params.void_fraction >= 1.0 {
            return Err(format!(
                "void fraction must be in (0, 1), got {}",
                params.void_fraction
            ));
        }
        if params.particle_density <= 0.0 {
            return Err(format!(
                "particle density must be > 0, got {}",
                params.particle_density
            ));
        }
        if params.particle_diameter <= 0.0 {
            return Err(format!(
                "particle diameter must be > 0, got {}",
                params.particle_diameter
            ));
        }
        if params.entrance_velocity == 0.0 {
            return Err("entrance velocity must be non-zero".to_string());
        }
        let outlet = params.total_pressure + params.pressure_gradient * params.length;
        if outlet <= 0.0 {
            return Err(format!(
                "pressure gradient drives the outlet pressure negative ({outlet} Pa)"
            ));
        }

        let phase_ratio = (1.0 - params.void_fraction) / params.void_fraction;
        let prefactor = components
            .iter()
            .map(|c| {
                GAS_CONSTANT * params.temperature * phase_ratio * params.particle_density
                    * c.mass_transfer
            })
            .collect();
        let carrier_index = components
            .iter()
            .position(|c| c.carrier)
            .expect("validated component set has a carrier");
        let max_isotherm_terms =
            components.iter().map(|c| c.isotherm.terms()).max().unwrap_or(1).max(1);

        Ok(Self {
            dx: params.length / params.n_grid as f64,
            n_comp: components.len(),
            params,
            prefactor,
            carrier_index,
            max_isotherm_terms,
        })
    }

    /// Flat index of node `i`, component `j` (node-major layout)
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        i * self.n_comp + j
    }

    /// Number of grid cells `N`
    pub fn n_grid(&self) -> usize {
        self.params.n_grid
    }

    /// Number of nodes `N + 1`
    pub fn nodes(&self) -> usize {
        self.params.n_grid + 1
    }

    /// Number of components
    pub fn n_comp(&self) -> usize {
        self.n_comp
    }

    /// Grid spacing \[m\]
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Axial position of node `i` \[m\]
    pub fn z(&self, i: usize) -> f64 {
        i as f64 * self.dx
    }

    /// Sorption prefactor of component `j` \[Pa/s per (mol/kg)\]
    pub fn prefactor(&self, j: usize) -> f64 {
        self.prefactor[j]
    }

    pub fn carrier_index(&self) -> usize {
        self.carrier_index
    }

    /// Largest isotherm term count across components (IAST scratch sizing)
    pub fn max_isotherm_terms(&self) -> usize {
        self.max_isotherm_terms
    }

    /// Expected outlet pressure `p_total + dPt/dx · L` \[Pa\]
    pub fn outlet_pressure(&self) -> f64 {
        self.params.total_pressure + self.params.pressure_gradient * self.params.length
    }

    pub fn params(&self) -> &ColumnParameters {
        &self.params
    }

    pub fn temperature(&self) -> f64 {
        self.params.temperature
    }

    pub fn total_pressure(&self) -> f64 {
        self.params.total_pressure
    }

    pub fn pressure_gradient(&self) -> f64 {
        self.params.pressure_gradient
    }

    pub fn void_fraction(&self) -> f64 {
        self.params.void_fraction
    }

    pub fn entrance_velocity(&self) -> f64 {
        self.params.entrance_velocity
    }

    pub fn length(&self) -> f64 {
        self.params.length
    }

    pub fn particle_diameter(&self) -> f64 {
        self.params.particle_diameter
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::Isotherm;

    fn components() -> Vec<GasComponent> {
        vec![
            GasComponent::carrier("He", 0.9),
            GasComponent::new("CO2", 0.1, 0.5, Isotherm::langmuir(3.0, 2e-5)),
        ]
    }

    #[test]
    fn test_grid_construction() {
        let grid = ColumnGrid::new(ColumnParameters::default(), &components()).unwrap();
        assert_eq!(grid.n_grid(), 100);
        assert_eq!(grid.nodes(), 101);
        assert_eq!(grid.n_comp(), 2);
        assert!((grid.dx() - 0.003).abs() < 1e-15);
        assert_eq!(grid.carrier_index(), 0);
        assert_eq!(grid.max_isotherm_terms(), 1);
    }

    #[test]
    fn test_flat_layout_is_node_major() {
        let grid = ColumnGrid::new(ColumnParameters::default(), &components()).unwrap();
        assert_eq!(grid.idx(0, 0), 0);
        assert_eq!(grid.idx(0, 1), 1);
        assert_eq!(grid.idx(1, 0), 2);
        assert_eq!(grid.idx(50, 1), 101);
    }

    #[test]
    fn test_prefactor_value() {
        let grid = ColumnGrid::new(ColumnParameters::default(), &components()).unwrap();
        // carrier: Kl = 0 so prefactor vanishes
        assert_eq!(grid.prefactor(0), 0.0);
        // R·T·(1−ε)/ε·ρ_p·Kl
        let expected = crate::GAS_CONSTANT * 300.0 * 1.5 * 1000.0 * 0.5;
        assert!((grid.prefactor(1) - expected).abs() < 1e-9 * expected);
    }

    #[test]
    fn test_outlet_pressure_with_gradient() {
        let params = ColumnParameters {
            pressure_gradient: -1e4,
            ..ColumnParameters::default()
        };
        let grid = ColumnGrid::new(params, &components()).unwrap();
        assert!((grid.outlet_pressure() - (1e5 - 1e4 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let cases = [
            ColumnParameters { length: 0.0, ..ColumnParameters::default() },
            ColumnParameters { n_grid: 1, ..ColumnParameters::default() },
            ColumnParameters { void_fraction: 1.0, ..ColumnParameters::default() },
            ColumnParameters { particle_density: -1.0, ..ColumnParameters::default() },
            ColumnParameters { entrance_velocity: 0.0, ..ColumnParameters::default() },
            // gradient large enough to drive the outlet negative
            ColumnParameters { pressure_gradient: -1e6, ..ColumnParameters::default() },
        ];
        for params in cases {
            assert!(ColumnGrid::new(params, &components()).is_err());
        }
    }

    #[test]
    fn test_z_positions() {
        let grid = ColumnGrid::new(ColumnParameters::default(), &components()).unwrap();
        assert_eq!(grid.z(0), 0.0);
        assert!((grid.z(grid.n_grid()) - 0.3).abs() < 1e-12);
    }
}
