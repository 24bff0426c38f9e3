//! Implicit backward-Euler stepper (Newton-Krylov)
//!
//! Unknowns are the loadings and partial pressures at every node,
//! `u = [Q; P]` of size `2·Ncomp·(N+1)`. The residual is the backward-Euler
//! discretization of the baseline transport operator,
//!
//! ```text
//! G(u) = u − uⁿ − Δt·F(u)
//! ```
//!
//! with the equilibrium oracle and the continuity velocity evaluated inside
//! `F` — the stiff sorption coupling is what the implicitness buys. Newton
//! systems `J·δ = −G` are solved matrix-free: the Jacobian-vector product
//! is a one-sided finite difference of `G`, preconditioned by the analytic
//! diagonal estimate `1 + Δt·Kl` (loading rows) and `1 + Δt·|V|/dx`
//! (pressure rows).
//!
//! Convergence is the scaled infinity norm of the Newton update; exceeding
//! the iteration cap fails the step with `StepDiverged`.

use crate::solver::driver::Simulation;
use crate::solver::linear::bicgstab;
use crate::solver::{ImplicitSettings, SimulationError};
use crate::transport::partial_pressure_derivatives;

impl Simulation {
    pub(crate) fn implicit_step(
        &mut self,
        step: usize,
        implicit: &ImplicitSettings,
    ) -> Result<(), SimulationError> {
        let dt = self.settings().dt;
        let (grid, _) = self.grid_and_components();
        let m = grid.nodes() * grid.n_comp();
        let p_scale = grid.total_pressure();

        // unknowns seeded from the committed state
        let mut u = vec![0.0; 2 * m];
        let mut diag = vec![1.0; 2 * m];
        {
            let (grid, components, state, ..) = self.stage_buffers();
            u[..m].copy_from_slice(state.q.as_slice());
            u[m..].copy_from_slice(state.p.as_slice());
            for i in 0..grid.nodes() {
                for (j, component) in components.iter().enumerate() {
                    let k = grid.idx(i, j);
                    diag[k] = 1.0 + dt * component.mass_transfer;
                    diag[m + k] = 1.0 + dt * state.v[i].abs() / grid.dx();
                }
            }
        }

        let mut g = vec![0.0; 2 * m];
        let mut g_probe = vec![0.0; 2 * m];
        let mut u_probe = vec![0.0; 2 * m];
        let mut rhs = vec![0.0; 2 * m];
        let mut delta = vec![0.0; 2 * m];

        for newton in 1..=implicit.max_newton_iterations {
            self.implicit_residual(step, dt, &u, &mut g)?;
            for k in 0..2 * m {
                rhs[k] = -g[k];
            }
            delta.fill(0.0);

            let u_scale = 1.0 + u.iter().fold(0.0_f64, |a, &b| a.max(b.abs()));
            let mut probe_error: Option<SimulationError> = None;
            let outcome = {
                let apply = |direction: &[f64], out: &mut [f64]| {
                    if probe_error.is_some() {
                        out.fill(0.0);
                        return;
                    }
                    let direction_norm =
                        direction.iter().fold(0.0_f64, |a, &b| a.max(b.abs()));
                    if direction_norm == 0.0 {
                        out.fill(0.0);
                        return;
                    }
                    let h = f64::EPSILON.sqrt() * u_scale / direction_norm;
                    for k in 0..2 * m {
                        u_probe[k] = u[k] + h * direction[k];
                    }
                    match self.implicit_residual(step, dt, &u_probe, &mut g_probe) {
                        Ok(()) => {
                            for k in 0..2 * m {
                                out[k] = (g_probe[k] - g[k]) / h;
                            }
                        }
                        Err(e) => {
                            probe_error = Some(e);
                            out.fill(0.0);
                        }
                    }
                };
                bicgstab(apply, &rhs, &mut delta, &diag, &implicit.linear)
            };
            if let Some(e) = probe_error {
                return Err(e);
            }
            if !outcome.converged {
                log::warn!(
                    "step {step}, Newton {newton}: linear solve stalled at residual {:.3e} \
                     after {} iterations",
                    outcome.residual,
                    outcome.iterations
                );
            }

            for k in 0..2 * m {
                u[k] += delta[k];
            }

            // scaled infinity norm of the update, per block
            let q_scale = 1.0 + u[..m].iter().fold(0.0_f64, |a, &b| a.max(b.abs()));
            let mut update = 0.0_f64;
            for k in 0..m {
                update = update.max(delta[k].abs() / q_scale);
                update = update.max(delta[m + k].abs() / p_scale);
            }
            log::trace!("step {step}, Newton {newton}: scaled update {update:.3e}");

            if update < implicit.tolerance {
                // refresh the shadow state and the frame derivatives at the
                // converged solution
                self.implicit_residual(step, dt, &u, &mut g)?;
                let (_, _, _, _, derivs, derivs_new) = self.stage_buffers();
                derivs.dqdt.copy_from(&derivs_new.dqdt);
                derivs.dpdt.copy_from(&derivs_new.dpdt);
                derivs.dydt.copy_from(&derivs_new.dydt);
                derivs.dptdt.copy_from(&derivs_new.dptdt);
                return Ok(());
            }
        }

        Err(SimulationError::StepDiverged {
            step,
            iterations: implicit.max_newton_iterations,
        })
    }

    /// Backward-Euler residual `G(u) = u − uⁿ − Δt·F(u)`
    ///
    /// Side effect by design: the shadow state is left holding the gas
    /// phase, equilibrium loadings and velocity at `u`, so the converged
    /// call doubles as the commit snapshot.
    fn implicit_residual(
        &mut self,
        step: usize,
        dt: f64,
        u: &[f64],
        g: &mut [f64],
    ) -> Result<(), SimulationError> {
        let m = u.len() / 2;
        {
            let (_, _, _, work, ..) = self.stage_buffers();
            work.q.as_mut_slice().copy_from_slice(&u[..m]);
            work.p.as_mut_slice().copy_from_slice(&u[m..]);
        }
        self.reconstruct_from_partial_pressures();
        self.equilibrate(step)?;
        self.update_velocity();

        let (grid, components, state, work, _, derivs_new) = self.stage_buffers();
        partial_pressure_derivatives(
            grid,
            components,
            &work.qeq,
            &work.q,
            &work.v,
            &work.p,
            derivs_new,
        );
        for k in 0..m {
            g[k] = u[k] - state.q[k] - dt * derivs_new.dqdt[k];
            g[m + k] = u[m + k] - state.p[k] - dt * derivs_new.dpdt[k];
        }
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
