//! Momentum closures: velocity along the column from the pressure profile
//!
//! Two mutually exclusive policies, selected at construction and injected
//! into the driver as a tagged variant:
//!
//! - [`MomentumClosure::Continuity`]: the overall material balance
//!   propagated from the inlet velocity (baseline variant),
//! - [`MomentumClosure::Ergun`]: the packed-bed Ergun pressure-drop law,
//!   combining the laminar Kozeny-Carman and turbulent Burke-Plummer
//!   contributions, with the gas viscosity from Sutherland's law.
//!
//! Carrier-gas properties (molar mass, Sutherland constants) live on
//! [`CarrierGas`]; the particle diameter is a column parameter.

use nalgebra::DVector;

use crate::column::ColumnGrid;
use crate::GAS_CONSTANT;

// =================================================================================================
// CarrierGas
// =================================================================================================

/// Transport properties of the carrier gas
///
/// Sutherland's law gives the dynamic viscosity:
///
/// ```text
/// μ(T) = μ₀ · (T/T_μ₀)^{3/2} · (T_μ₀ + S)/(T + S)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierGas {
    /// Molar mass \[kg/mol\]
    pub molar_mass: f64,
    /// Reference viscosity μ₀ \[Pa·s\]
    pub mu0: f64,
    /// Reference temperature of μ₀ \[K\]
    pub t_mu0: f64,
    /// Sutherland constant S \[K\]
    pub sutherland_s: f64,
}

impl CarrierGas {
    /// Helium, the default carrier (tabulated Sutherland constants)
    pub fn helium() -> Self {
        Self {
            molar_mass: 4.0026e-3,
            mu0: 0.0210,
            t_mu0: 323.15,
            sutherland_s: 72.9,
        }
    }

    /// Dynamic viscosity at temperature `t` \[Pa·s\]
    pub fn viscosity(&self, t: f64) -> f64 {
        self.mu0 * (t / self.t_mu0).powf(1.5) * (self.t_mu0 + self.sutherland_s)
            / (t + self.sutherland_s)
    }

    /// Ideal-gas density at pressure `p` and temperature `t` \[kg/m³\]
    pub fn density(&self, p: f64, t: f64) -> f64 {
        p * self.molar_mass / (GAS_CONSTANT * t)
    }
}

impl Default for CarrierGas {
    fn default() -> Self {
        Self::helium()
    }
}

// =================================================================================================
// MomentumClosure
// =================================================================================================

/// Velocity policy along the column
#[derive(Debug, Clone, PartialEq)]
pub enum MomentumClosure {
    /// Overall material balance with the imposed pressure profile:
    ///
    /// ```text
    /// V[i]·Pt[i] = V[i−1]·Pt[i−1] − dx·Σ_j prefactor[j]·(q*[i,j] − q[i,j])
    /// ```
    ///
    /// propagated from `V[0] = v_in`.
    Continuity,

    /// Ergun pressure-drop law, solved per node for the velocity
    Ergun(CarrierGas),
}

impl MomentumClosure {
    /// Recompute the velocity profile into `v_out` from the given snapshot
    ///
    /// `q_eq`/`q` feed the continuity sink; the Ergun branch only reads the
    /// pressure profile. `V[0] = v_in` in both policies.
    pub fn compute_velocity(
        &self,
        grid: &ColumnGrid,
        pt: &DVector<f64>,
        q_eq: &DVector<f64>,
        q: &DVector<f64>,
        v_out: &mut DVector<f64>,
    ) {
        let n = grid.n_grid();
        v_out[0] = grid.entrance_velocity();

        match self {
            MomentumClosure::Continuity => {
                for i in 1..=n {
                    let sink: f64 = (0..grid.n_comp())
                        .map(|j| grid.prefactor(j) * (q_eq[grid.idx(i, j)] - q[grid.idx(i, j)]))
                        .sum();
                    v_out[i] = (v_out[i - 1] * pt[i - 1] - grid.dx() * sink) / pt[i];
                }
            }
            MomentumClosure::Ergun(carrier) => {
                let (laminar, turbulent) = self.ergun_coefficients(grid, carrier);
                for i in 1..=n {
                    // a·V² + b·V + c = 0, positive root; the sign of v_in
                    // resolves the V·|V| turbulent nonlinearity
                    let a = grid.entrance_velocity().signum() * turbulent
                        * carrier.density(pt[i], grid.temperature());
                    let b = laminar;
                    let c = (pt[i] - pt[i - 1]) / grid.dx();
                    let discriminant = b * b - 4.0 * a * c;
                    v_out[i] = (-b + discriminant.sqrt()) / (2.0 * a);
                }
            }
        }
    }

    /// Initial total-pressure profile before the first step
    ///
    /// Continuity: the imposed linear profile `p_total + dPt/dx·z`. Ergun:
    /// explicit Euler integration of the pressure-drop ODE backward from the
    /// fixed outlet `Pt[N] = p_total`, evaluated at the entrance velocity.
    pub fn initial_pressure(&self, grid: &ColumnGrid) -> DVector<f64> {
        let n = grid.n_grid();
        let mut pt = DVector::zeros(n + 1);

        match self {
            MomentumClosure::Continuity => {
                for i in 0..=n {
                    pt[i] = grid.total_pressure() + grid.pressure_gradient() * grid.z(i);
                }
            }
            MomentumClosure::Ergun(carrier) => {
                pt[n] = grid.total_pressure();
                for i in (1..=n).rev() {
                    let gradient = self.pressure_drop_gradient(grid, carrier, pt[i]);
                    pt[i - 1] = pt[i] - gradient * grid.dx();
                }
                log::debug!(
                    "Ergun initial profile: inlet {:.6} Pa, outlet {:.6} Pa, drop {:.6} Pa",
                    pt[0],
                    pt[n],
                    pt[0] - pt[n]
                );
            }
        }
        pt
    }

    /// dPt/dx of the Ergun law at pressure `p`, evaluated at `v_in`
    ///
    /// Negative for forward flow: pressure falls downstream.
    pub fn pressure_drop_gradient(&self, grid: &ColumnGrid, carrier: &CarrierGas, p: f64) -> f64 {
        let (laminar, turbulent) = self.ergun_coefficients(grid, carrier);
        let v_in = grid.entrance_velocity();
        -(laminar * v_in
            + turbulent * carrier.density(p, grid.temperature()) * v_in * v_in.abs())
    }

    /// (laminar, turbulent) Ergun coefficients without the density factor
    ///
    /// laminar = 150·μ(T)·(1−ε)²/(ε²·d_p²); turbulent = 1.75·(1−ε)/(ε·d_p).
    fn ergun_coefficients(&self, grid: &ColumnGrid, carrier: &CarrierGas) -> (f64, f64) {
        let eps = grid.void_fraction();
        let d_p = grid.particle_diameter();
        let mu = carrier.viscosity(grid.temperature());
        let laminar = 150.0 * mu * (1.0 - eps) * (1.0 - eps) / (eps * eps * d_p * d_p);
        let turbulent = 1.75 * (1.0 - eps) / (eps * d_p);
        (laminar, turbulent)
    }
}

// =================================================================================================
// Tests
// =================================================================================================
