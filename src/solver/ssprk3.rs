//! Three-stage strong-stability-preserving Runge-Kutta (Shu-Osher form)
//!
//! ```text
//! U¹    = Uⁿ + Δt·F(Uⁿ)
//! U²    = ¾·Uⁿ + ¼·U¹ + ¼·Δt·F(U¹)
//! Uⁿ⁺¹  = ⅓·Uⁿ + ⅔·U² + ⅔·Δt·F(U²)
//! ```
//!
//! SSP-RK3 preserves the TVD property of the upwind spatial operator, which
//! keeps the sharp breakthrough fronts monotone. After every stage the gas
//! phase is re-derived, the equilibrium oracle re-evaluated at every node
//! and the momentum closure re-applied, so each stage's `F` sees a
//! consistent snapshot.
//!
//! `U` is `(Q, Y, Pt)` in the Ergun variant — partial pressures are
//! reconstructed as `Y·Pt` to keep the closure `Σ_j P = Pt` exact — and
//! `(Q, P)` in the baseline, with `Pt = Σ_j max(0, P)` and `Y = P/Pt`
//! re-derived per stage.

use crate::column::Derivatives;
use crate::solver::driver::Simulation;
use crate::solver::SimulationError;
use crate::transport::{mole_fraction_derivatives, partial_pressure_derivatives};

/// Which snapshot a stage reads
#[derive(Clone, Copy, PartialEq)]
enum Snapshot {
    /// The committed state (stage 1); derivatives land in the main buffer
    /// so observers see the step's entry derivative
    Committed,
    /// The shadow state (stages 2 and 3); derivatives land in the shadow
    /// buffer
    Shadow,
}

impl Simulation {
    pub(crate) fn ssprk3_step(&mut self, step: usize) -> Result<(), SimulationError> {
        let dt = self.settings().dt;

        // stage 1: full Euler predictor from the committed state
        self.eval_rhs(Snapshot::Committed);
        self.combine_stage(1.0, 0.0, dt, Snapshot::Committed);
        self.close_stage(step)?;

        // stage 2
        self.eval_rhs(Snapshot::Shadow);
        self.combine_stage(0.75, 0.25, 0.25 * dt, Snapshot::Shadow);
        self.close_stage(step)?;

        // stage 3
        self.eval_rhs(Snapshot::Shadow);
        self.combine_stage(1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0 * dt, Snapshot::Shadow);
        self.close_stage(step)
    }

    /// Evaluate the spatial operator at the chosen snapshot
    fn eval_rhs(&mut self, source: Snapshot) {
        let ergun = self.is_ergun();
        let (grid, components, state, work, derivs, derivs_new) = self.stage_buffers();
        let (snapshot, out) = match source {
            Snapshot::Committed => (state, derivs),
            Snapshot::Shadow => (&*work, derivs_new),
        };
        if ergun {
            mole_fraction_derivatives(
                grid,
                components,
                &snapshot.qeq,
                &snapshot.q,
                &snapshot.v,
                &snapshot.y,
                &snapshot.pt,
                out,
            );
        } else {
            partial_pressure_derivatives(
                grid,
                components,
                &snapshot.qeq,
                &snapshot.q,
                &snapshot.v,
                &snapshot.p,
                out,
            );
        }
    }

    /// Shu-Osher convex combination into the shadow state:
    /// `work ← w_old·state + w_new·work + w_dt·F`
    fn combine_stage(&mut self, w_old: f64, w_new: f64, w_dt: f64, source: Snapshot) {
        let ergun = self.is_ergun();
        {
            let (grid, _components, state, work, derivs, derivs_new) = self.stage_buffers();
            let d: &Derivatives = match source {
                Snapshot::Committed => &*derivs,
                Snapshot::Shadow => &*derivs_new,
            };

            for k in 0..grid.nodes() * grid.n_comp() {
                work.q[k] = w_old * state.q[k] + w_new * work.q[k] + w_dt * d.dqdt[k];
            }
            if ergun {
                for i in 0..grid.nodes() {
                    work.pt[i] = w_old * state.pt[i] + w_new * work.pt[i] + w_dt * d.dptdt[i];
                }
                for k in 0..grid.nodes() * grid.n_comp() {
                    work.y[k] = w_old * state.y[k] + w_new * work.y[k] + w_dt * d.dydt[k];
                }
            } else {
                for k in 0..grid.nodes() * grid.n_comp() {
                    work.p[k] = w_old * state.p[k] + w_new * work.p[k] + w_dt * d.dpdt[k];
                }
            }
        }

        // re-derive the dependent gas-phase fields
        if ergun {
            self.reconstruct_partial_pressures();
        } else {
            self.reconstruct_from_partial_pressures();
        }
    }

    /// Re-equilibrate and recompute the velocity after a stage update
    fn close_stage(&mut self, step: usize) -> Result<(), SimulationError> {
        self.equilibrate(step)?;
        self.update_velocity();
        Ok(())
    }
}
