//! Simulation driver: state ownership, the step loop, observers
//!
//! The driver owns every array of the run (committed state, "new" shadow
//! state, two derivative buffers, the oracle scratch arena) and the step
//! loop with its stop criterion. Integration schemes are dispatched per
//! step; stages write the shadow buffers and the commit phase copies them
//! back, enforces the inlet boundary and runs the post-commit health
//! checks.
//!
//! Per-node oracle sweeps are the data-parallel hot spot: with the
//! `parallel` feature they fan out with rayon over node-partitioned
//! scratch, writing only the shadow buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DVector;

use crate::column::{
    BedState, ColumnGrid, ColumnParameters, Derivatives, EquilibriumCache, GasComponent,
};
use crate::equilibrium::{IastPerformance, MixturePrediction};
use crate::output::{ColumnObserver, Frame, Progress};
use crate::solver::{IntegrationScheme, SimulationError};
use crate::transport::MomentumClosure;

/// Outlet-composition tolerance of the auto-stop rule
const AUTO_STOP_TOLERANCE: f64 = 0.01;

// =================================================================================================
// Settings
// =================================================================================================

/// Pulse-injection boundary settings
///
/// After `t > time` the inlet switches to pure carrier and stays there.
/// `reset_mole_fractions` controls whether the mole fractions at the inlet
/// are switched together with the partial pressures (the conservative
/// default) or left to relax on their own.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseSettings {
    /// Pulse duration \[s\]
    pub time: f64,
    /// Also reset `Y[0,·]` at the switch (default true)
    pub reset_mole_fractions: bool,
}

impl PulseSettings {
    pub fn new(time: f64) -> Self {
        Self { time, reset_mole_fractions: true }
    }
}

/// Run control: step size, step count, emission cadence, scheme
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// Time step \[s\]
    pub dt: f64,
    /// Number of steps (a starting value when `auto_steps` is on)
    pub n_steps: usize,
    /// Stop automatically once the outlet composition converges
    pub auto_steps: bool,
    /// Emit a progress record every this many steps (0 = never)
    pub print_every: usize,
    /// Emit a column frame every this many steps (0 = never)
    pub write_every: usize,
    /// Optional pulse injection
    pub pulse: Option<PulseSettings>,
    /// Time-integration scheme
    pub scheme: IntegrationScheme,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dt: 0.01,
            n_steps: 1000,
            auto_steps: false,
            print_every: 100,
            write_every: 10,
            pulse: None,
            scheme: IntegrationScheme::SspRk3,
        }
    }
}

/// What a completed (or cancelled) run looked like
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Steps actually taken
    pub steps: usize,
    /// Simulated time \[s\]
    pub simulated_time: f64,
    /// True when the cancel token stopped the run early
    pub cancelled: bool,
    /// Oracle work accumulated over the run
    pub iast: IastPerformance,
}

// =================================================================================================
// Simulation
// =================================================================================================

/// A breakthrough simulation: column, components, oracle, scheme, state
pub struct Simulation {
    grid: ColumnGrid,
    components: Vec<GasComponent>,
    oracle: Box<dyn MixturePrediction>,
    momentum: MomentumClosure,
    settings: SimulationSettings,

    /// Committed solution
    state: BedState,
    /// Shadow buffers written during a step
    work: BedState,
    /// Derivatives at the committed state (stage 1; written to frames)
    derivs: Derivatives,
    /// Derivatives at the shadow state (stages 2 and 3)
    derivs_new: Derivatives,
    cache: EquilibriumCache,
    perf: IastPerformance,

    /// Runtime copy of the step target (the auto-stop rule rewrites it)
    n_steps: usize,
    auto_steps: bool,
    pulse_active: bool,
    initialized: bool,

    cancel: Option<Arc<AtomicBool>>,
    observers: Vec<Box<dyn ColumnObserver>>,
}

impl Simulation {
    /// Build a simulation; rejects inadmissible scheme/closure combinations
    pub fn new(
        params: ColumnParameters,
        components: Vec<GasComponent>,
        oracle: Box<dyn MixturePrediction>,
        momentum: MomentumClosure,
        settings: SimulationSettings,
    ) -> Result<Self, SimulationError> {
        let grid =
            ColumnGrid::new(params, &components).map_err(SimulationError::ConfigInvalid)?;

        if settings.dt < 0.0 || !settings.dt.is_finite() {
            return Err(SimulationError::ConfigInvalid(format!(
                "time step must be finite and non-negative, got {}",
                settings.dt
            )));
        }
        if let Some(pulse) = &settings.pulse {
            if pulse.time < 0.0 {
                return Err(SimulationError::ConfigInvalid(format!(
                    "pulse time must be >= 0, got {}",
                    pulse.time
                )));
            }
        }
        if matches!(settings.scheme, IntegrationScheme::Implicit(_))
            && matches!(momentum, MomentumClosure::Ergun(_))
        {
            return Err(SimulationError::ConfigInvalid(
                "the implicit scheme only supports the continuity momentum closure".to_string(),
            ));
        }

        let state = BedState::zeros(&grid);
        let work = BedState::zeros(&grid);
        let derivs = Derivatives::zeros(&grid);
        let derivs_new = Derivatives::zeros(&grid);
        let cache = EquilibriumCache::new(&grid);
        let n_steps = settings.n_steps;
        let auto_steps = settings.auto_steps;

        Ok(Self {
            grid,
            components,
            oracle,
            momentum,
            settings,
            state,
            work,
            derivs,
            derivs_new,
            cache,
            perf: IastPerformance::default(),
            n_steps,
            auto_steps,
            pulse_active: false,
            initialized: false,
            cancel: None,
            observers: Vec::new(),
        })
    }

    // ====== wiring ======

    /// Register an observer; frames and progress records arrive in step
    /// order on the driver thread
    pub fn add_observer(&mut self, observer: Box<dyn ColumnObserver>) {
        self.observers.push(observer);
    }

    /// Cooperative cancellation token, checked at step boundaries and
    /// before frame emission
    pub fn set_cancel_token(&mut self, token: Arc<AtomicBool>) {
        self.cancel = Some(token);
    }

    // ====== accessors ======

    pub fn grid(&self) -> &ColumnGrid {
        &self.grid
    }

    pub fn components(&self) -> &[GasComponent] {
        &self.components
    }

    pub fn state(&self) -> &BedState {
        &self.state
    }

    pub fn performance(&self) -> IastPerformance {
        self.perf
    }

    /// Current step target (rewritten once by the auto-stop rule)
    pub fn steps_target(&self) -> usize {
        self.n_steps
    }

    /// True while the auto-stop rule is still watching the outlet
    pub fn auto_steps_active(&self) -> bool {
        self.auto_steps
    }

    pub(crate) fn is_ergun(&self) -> bool {
        matches!(self.momentum, MomentumClosure::Ergun(_))
    }

    pub(crate) fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub(crate) fn grid_and_components(&self) -> (&ColumnGrid, &[GasComponent]) {
        (&self.grid, &self.components)
    }

    /// Split borrows for the integration stages: grid and components
    /// read-only, committed state read-only, shadow state and both
    /// derivative buffers writable
    #[allow(clippy::type_complexity)]
    pub(crate) fn stage_buffers(
        &mut self,
    ) -> (&ColumnGrid, &[GasComponent], &BedState, &mut BedState, &mut Derivatives, &mut Derivatives)
    {
        (
            &self.grid,
            &self.components,
            &self.state,
            &mut self.work,
            &mut self.derivs,
            &mut self.derivs_new,
        )
    }

    /// Human-readable run header, logged at the start of a run
    pub fn summary(&self) -> String {
        let p = self.grid.params();
        let mut s = String::new();
        s.push_str("Column properties\n");
        s.push_str("=======================================================\n");
        s.push_str(&format!("Temperature:                           {} [K]\n", p.temperature));
        s.push_str(&format!("Column length:                         {} [m]\n", p.length));
        s.push_str(&format!("Column void-fraction:                  {} [-]\n", p.void_fraction));
        s.push_str(&format!("Particle density:                      {} [kg/m^3]\n", p.particle_density));
        s.push_str(&format!("Total pressure:                        {} [Pa]\n", p.total_pressure));
        s.push_str(&format!("Pressure gradient:                     {} [Pa/m]\n", p.pressure_gradient));
        s.push_str(&format!("Column entrance interstitial velocity: {} [m/s]\n", p.entrance_velocity));
        s.push_str("\nIntegration details\n");
        s.push_str("=======================================================\n");
        s.push_str(&format!("Time step:                     {} [s]\n", self.settings.dt));
        s.push_str(&format!("Number of time steps:          {}\n", self.settings.n_steps));
        s.push_str(&format!("Number of column grid points:  {}\n", self.grid.n_grid()));
        s.push_str(&format!("Column spacing:                {} [m]\n", self.grid.dx()));
        s.push_str("\nComponent data\n");
        s.push_str("=======================================================\n");
        s.push_str(&format!(
            "maximum isotherm terms:        {}\n",
            self.grid.max_isotherm_terms()
        ));
        for component in &self.components {
            s.push_str(&format!("{component}\n"));
        }
        s
    }

    // ====== lifecycle ======

    /// Set up the initial state: clean bed, pure carrier everywhere except
    /// the inlet node, the momentum closure's initial pressure profile, and
    /// one equilibrium sweep
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        let pt_init = self.momentum.initial_pressure(&self.grid);
        let carrier = self.grid.carrier_index();
        let v_in = self.grid.entrance_velocity();

        self.state.q.fill(0.0);
        for i in 0..self.grid.nodes() {
            self.state.pt[i] = pt_init[i];
            // constant molar flux v·Pt, anchored at the entrance velocity
            self.state.v[i] = v_in * pt_init[0] / pt_init[i];
            for j in 0..self.grid.n_comp() {
                let k = self.grid.idx(i, j);
                let y = if i == 0 {
                    self.components[j].y_in
                } else if j == carrier {
                    1.0
                } else {
                    0.0
                };
                self.state.y[k] = y;
                self.state.p[k] = y * pt_init[i];
            }
        }

        // equilibrium loadings of the initial gas phase
        {
            let BedState { ref y, ref pt, ref mut qeq, .. } = self.state;
            equilibrium_sweep(
                self.oracle.as_ref(),
                &self.grid,
                y,
                pt,
                qeq,
                &mut self.cache,
                &mut self.perf,
                0,
            )?;
        }

        self.work.copy_from(&self.state);
        self.n_steps = self.settings.n_steps;
        self.auto_steps = self.settings.auto_steps;
        self.pulse_active = false;
        self.initialized = true;
        Ok(())
    }

    /// Advance one step: auto-stop bookkeeping, scheme dispatch, commit,
    /// boundary enforcement and health checks
    pub fn advance(&mut self, step: usize) -> Result<(), SimulationError> {
        if !self.initialized {
            self.initialize()?;
        }

        self.check_auto_stop(step);

        match self.settings.scheme.clone() {
            IntegrationScheme::SspRk3 => self.ssprk3_step(step)?,
            IntegrationScheme::Implicit(implicit) => self.implicit_step(step, &implicit)?,
        }

        self.commit(step)
    }

    /// Run to the stop criterion, emitting frames and progress records
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        if !self.initialized {
            self.initialize()?;
        }
        log::info!(
            "starting breakthrough run: {} steps{}",
            self.n_steps,
            if self.auto_steps { " (auto-stop armed)" } else { "" }
        );

        let mut step = 0;
        while step < self.n_steps || self.auto_steps {
            if self.is_cancelled() {
                log::info!("run cancelled at step {step}");
                return Ok(self.report(step, true));
            }

            self.advance(step)?;
            let t = step as f64 * self.settings.dt;

            if self.settings.write_every > 0 && step % self.settings.write_every == 0 {
                if self.is_cancelled() {
                    log::info!("run cancelled at step {step}");
                    return Ok(self.report(step, true));
                }
                self.emit_frame(step, t);
            }

            if self.settings.print_every > 0 && step % self.settings.print_every == 0 {
                log::info!(
                    "timestep {step}, time: {t:.6} [s] — average mixture-prediction steps: {:.3}",
                    self.perf.average()
                );
                self.emit_progress(step, t);
            }

            step += 1;
        }

        log::info!(
            "final timestep {}, time: {:.6} [s]",
            self.n_steps,
            self.settings.dt * self.n_steps as f64
        );
        Ok(self.report(step, false))
    }

    fn report(&self, steps: usize, cancelled: bool) -> RunReport {
        RunReport {
            steps,
            simulated_time: steps as f64 * self.settings.dt,
            cancelled,
            iast: self.perf,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|token| token.load(Ordering::Relaxed)).unwrap_or(false)
    }

    // ====== step internals ======

    /// Auto-stop rule: once every outlet composition is within 1% of its
    /// feed value, run 10% longer and stop checking
    fn check_auto_stop(&mut self, step: usize) {
        if !self.auto_steps {
            return;
        }
        let n = self.grid.n_grid();
        let outlet_pressure = self.grid.outlet_pressure();
        let mut tolerance = 0.0_f64;
        for (j, component) in self.components.iter().enumerate() {
            let normalized =
                self.state.p[self.grid.idx(n, j)] / (outlet_pressure * component.y_in);
            tolerance = tolerance.max((normalized - 1.0).abs());
        }
        if tolerance < AUTO_STOP_TOLERANCE {
            self.n_steps = (1.1 * step as f64).ceil() as usize;
            self.auto_steps = false;
            log::info!(
                "convergence criteria reached at step {step}, running 10% longer (to {})",
                self.n_steps
            );
        }
    }

    /// Oracle sweep over the shadow state: `work.qeq ← q*(work.y, work.pt)`
    pub(crate) fn equilibrate(&mut self, step: usize) -> Result<(), SimulationError> {
        let BedState { ref y, ref pt, ref mut qeq, .. } = self.work;
        equilibrium_sweep(
            self.oracle.as_ref(),
            &self.grid,
            y,
            pt,
            qeq,
            &mut self.cache,
            &mut self.perf,
            step,
        )
    }

    /// Velocity of the shadow state from the momentum closure
    pub(crate) fn update_velocity(&mut self) {
        let BedState { ref pt, ref qeq, ref q, ref mut v, .. } = self.work;
        self.momentum.compute_velocity(&self.grid, pt, qeq, q, v);
    }

    /// Rebuild `work`'s total pressure and mole fractions from its partial
    /// pressures (baseline variant)
    pub(crate) fn reconstruct_from_partial_pressures(&mut self) {
        for i in 0..self.grid.nodes() {
            let mut total = 0.0;
            for j in 0..self.grid.n_comp() {
                total += self.work.p[self.grid.idx(i, j)].max(0.0);
            }
            self.work.pt[i] = total;
            for j in 0..self.grid.n_comp() {
                let k = self.grid.idx(i, j);
                self.work.y[k] = self.work.p[k].max(0.0) / total;
            }
        }
    }

    /// Rebuild `work`'s partial pressures as `Y·Pt` (Ergun variant); keeps
    /// the partial-pressure closure exact by construction
    pub(crate) fn reconstruct_partial_pressures(&mut self) {
        for i in 0..self.grid.nodes() {
            for j in 0..self.grid.n_comp() {
                let k = self.grid.idx(i, j);
                self.work.p[k] = self.work.y[k] * self.work.pt[i];
            }
        }
    }

    /// Commit the shadow state, enforce the inlet boundary and the
    /// post-commit health checks
    fn commit(&mut self, step: usize) -> Result<(), SimulationError> {
        self.state.copy_from(&self.work);

        // pulse switch: activates once t exceeds the pulse time, persists
        let t = step as f64 * self.settings.dt;
        let mut reset_mole_fractions = true;
        if let Some(pulse) = &self.settings.pulse {
            if t > pulse.time {
                self.pulse_active = true;
            }
            reset_mole_fractions = pulse.reset_mole_fractions;
        }

        self.enforce_inlet(reset_mole_fractions);
        self.state.v[0] = self.grid.entrance_velocity();

        // health checks on the committed state
        let outlet = self.state.pt[self.grid.n_grid()];
        if outlet < 0.0 {
            return Err(SimulationError::InvalidPressureGradient { step, outlet_pressure: outlet });
        }
        if !self.is_ergun() {
            let expected_outlet =
                self.state.pt[0] + self.grid.pressure_gradient() * self.grid.length();
            if expected_outlet < 0.0 {
                return Err(SimulationError::InvalidPressureGradient {
                    step,
                    outlet_pressure: expected_outlet,
                });
            }
        }
        if let Some(field) = self.state.first_non_finite() {
            return Err(SimulationError::NumericalBreakdown { step, field });
        }
        Ok(())
    }

    fn enforce_inlet(&mut self, reset_mole_fractions: bool) {
        let carrier = self.grid.carrier_index();
        let n_comp = self.grid.n_comp();

        if self.is_ergun() {
            // the inlet total pressure floats with the momentum closure;
            // only the composition is pinned
            for j in 0..n_comp {
                let y = if self.pulse_active {
                    if j == carrier { 1.0 } else { 0.0 }
                } else {
                    self.components[j].y_in
                };
                let k = self.grid.idx(0, j);
                if !self.pulse_active || reset_mole_fractions {
                    self.state.y[k] = y;
                }
                self.state.p[k] = y * self.state.pt[0];
            }
        } else {
            let p_total = self.grid.total_pressure();
            for j in 0..n_comp {
                let k = self.grid.idx(0, j);
                self.state.p[k] = if self.pulse_active {
                    if j == carrier { p_total } else { 0.0 }
                } else {
                    p_total * self.components[j].y_in
                };
            }
            let total: f64 = (0..n_comp).map(|j| self.state.p[self.grid.idx(0, j)]).sum();
            self.state.pt[0] = total;
            for j in 0..n_comp {
                let k = self.grid.idx(0, j);
                self.state.y[k] = self.state.p[k] / total;
            }
        }
    }

    // ====== observer emission ======

    fn emit_frame(&mut self, step: usize, time: f64) {
        let Simulation { grid, components, state, derivs, observers, .. } = self;
        let frame = Frame {
            step,
            time,
            tau: time * grid.entrance_velocity() / grid.length(),
            grid,
            components: components.as_slice(),
            state,
            derivatives: derivs,
        };
        for observer in observers.iter_mut() {
            if let Err(e) = observer.on_frame(&frame) {
                log::warn!("observer failed to write frame at step {step}: {e}");
            }
        }
    }

    fn emit_progress(&mut self, step: usize, time: f64) {
        let progress = Progress { step, time, iast_average: self.perf.average() };
        for observer in self.observers.iter_mut() {
            if let Err(e) = observer.on_progress(&progress) {
                log::warn!("observer failed to record progress at step {step}: {e}");
            }
        }
    }
}

// =================================================================================================
// Equilibrium sweep
// =================================================================================================

/// One oracle call per node, writing `qeq`; scratch is partitioned by node
#[allow(clippy::too_many_arguments)]
pub(crate) fn equilibrium_sweep(
    oracle: &dyn MixturePrediction,
    grid: &ColumnGrid,
    y: &DVector<f64>,
    pt: &DVector<f64>,
    qeq: &mut DVector<f64>,
    cache: &mut EquilibriumCache,
    perf: &mut IastPerformance,
    step: usize,
) -> Result<(), SimulationError> {
    let n_comp = grid.n_comp();
    let nodes = grid.nodes();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let (p0, p0_stride, psi, psi_stride) = cache.arenas_mut();
        let y_slice = y.as_slice();
        let outcome: Result<usize, usize> = qeq
            .as_mut_slice()
            .par_chunks_mut(n_comp)
            .zip(p0.par_chunks_mut(p0_stride))
            .zip(psi.par_chunks_mut(psi_stride))
            .enumerate()
            .map(|(node, ((ni, p0_node), psi_node))| {
                let mut xi = vec![0.0; n_comp];
                let y_node = &y_slice[node * n_comp..(node + 1) * n_comp];
                oracle
                    .predict(y_node, pt[node], &mut xi, ni, p0_node, psi_node)
                    .map_err(|_| node)
            })
            .try_reduce(|| 0, |a, b| Ok(a + b));

        match outcome {
            Ok(iterations) => {
                perf.inner_iterations += iterations;
                perf.calls += nodes;
                Ok(())
            }
            Err(node) => Err(SimulationError::EquilibriumDiverged { step, node }),
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut xi = vec![0.0; n_comp];
        for node in 0..nodes {
            let (p0_node, psi_node) = cache.node_mut(node);
            let y_node = &y.as_slice()[node * n_comp..(node + 1) * n_comp];
            let ni = &mut qeq.as_mut_slice()[node * n_comp..(node + 1) * n_comp];
            let iterations = oracle
                .predict(y_node, pt[node], &mut xi, ni, p0_node, psi_node)
                .map_err(|_| SimulationError::EquilibriumDiverged { step, node })?;
            perf.record(iterations);
        }
        Ok(())
    }
}

// =================================================================================================
// Tests
// =================================================================================================
