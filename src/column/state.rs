//! Mutable bed state, stage derivatives and equilibrium scratch
//!
//! The state split keeps ownership simple through the multi-stage
//! integration: [`BedState`] is the committed solution, a second `BedState`
//! serves as the "new" shadow written during a stage, and [`Derivatives`]
//! holds one stage's time derivatives. All arrays are allocated once, sized
//! from the grid, and never reallocated.

use nalgebra::DVector;

use crate::column::ColumnGrid;

// =================================================================================================
// BedState
// =================================================================================================

/// All mutable per-node fields of the column
///
/// Per-node-per-component arrays (`p`, `q`, `qeq`, `y`) use the grid's flat
/// node-major layout; `pt` and `v` are per-node.
#[derive(Debug, Clone, PartialEq)]
pub struct BedState {
    /// Total pressure \[Pa\], length N+1
    pub pt: DVector<f64>,
    /// Interstitial velocity \[m/s\], length N+1
    pub v: DVector<f64>,
    /// Partial pressures \[Pa\], length (N+1)·Ncomp
    pub p: DVector<f64>,
    /// Sorbed loadings \[mol/kg\], length (N+1)·Ncomp
    pub q: DVector<f64>,
    /// Equilibrium loadings from the oracle \[mol/kg\], length (N+1)·Ncomp
    pub qeq: DVector<f64>,
    /// Gas-phase mole fractions \[-\], length (N+1)·Ncomp
    pub y: DVector<f64>,
}

impl BedState {
    /// Zero-initialized state sized for `grid`
    pub fn zeros(grid: &ColumnGrid) -> Self {
        let nodes = grid.nodes();
        let per_comp = nodes * grid.n_comp();
        Self {
            pt: DVector::zeros(nodes),
            v: DVector::zeros(nodes),
            p: DVector::zeros(per_comp),
            q: DVector::zeros(per_comp),
            qeq: DVector::zeros(per_comp),
            y: DVector::zeros(per_comp),
        }
    }

    /// Copy every field from `other` (sizes must match)
    pub fn copy_from(&mut self, other: &BedState) {
        self.pt.copy_from(&other.pt);
        self.v.copy_from(&other.v);
        self.p.copy_from(&other.p);
        self.q.copy_from(&other.q);
        self.qeq.copy_from(&other.qeq);
        self.y.copy_from(&other.y);
    }

    /// Name of the first field containing a non-finite entry, if any
    pub fn first_non_finite(&self) -> Option<&'static str> {
        let fields: [(&'static str, &DVector<f64>); 6] = [
            ("Pt", &self.pt),
            ("V", &self.v),
            ("P", &self.p),
            ("Q", &self.q),
            ("Qeq", &self.qeq),
            ("Y", &self.y),
        ];
        for (name, field) in fields {
            if field.iter().any(|x| !x.is_finite()) {
                return Some(name);
            }
        }
        None
    }
}

// =================================================================================================
// Derivatives
// =================================================================================================

/// One stage's time derivatives
///
/// The baseline (partial-pressure) operator fills `dqdt` and `dpdt`; the
/// Ergun (mole-fraction) operator fills `dqdt`, `dydt` and the per-node
/// `dptdt`, and reconstructs `dpdt` by the chain rule for observability.
/// A non-isothermal extension would add its temperature channel here.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    /// dQ/dt \[mol/kg/s\], length (N+1)·Ncomp
    pub dqdt: DVector<f64>,
    /// dP/dt \[Pa/s\], length (N+1)·Ncomp
    pub dpdt: DVector<f64>,
    /// dY/dt \[1/s\], length (N+1)·Ncomp
    pub dydt: DVector<f64>,
    /// dPt/dt \[Pa/s\], length N+1
    pub dptdt: DVector<f64>,
}

impl Derivatives {
    pub fn zeros(grid: &ColumnGrid) -> Self {
        let nodes = grid.nodes();
        let per_comp = nodes * grid.n_comp();
        Self {
            dqdt: DVector::zeros(per_comp),
            dpdt: DVector::zeros(per_comp),
            dydt: DVector::zeros(per_comp),
            dptdt: DVector::zeros(nodes),
        }
    }
}

// =================================================================================================
// EquilibriumCache
// =================================================================================================

/// Node-indexed warm-start arena for the equilibrium oracle
///
/// Per node: `n_comp · max_terms` hypothetical pressures and `max_terms`
/// reduced spreading pressures. Slices are partitioned by node index with no
/// cross-references, so parallel per-node oracle calls are race-free.
#[derive(Debug, Clone)]
pub struct EquilibriumCache {
    p0: Vec<f64>,
    psi: Vec<f64>,
    p0_stride: usize,
    psi_stride: usize,
}

impl EquilibriumCache {
    pub fn new(grid: &ColumnGrid) -> Self {
        let nodes = grid.nodes();
        let p0_stride = grid.n_comp() * grid.max_isotherm_terms();
        let psi_stride = grid.max_isotherm_terms();
        Self {
            p0: vec![0.0; nodes * p0_stride],
            psi: vec![0.0; nodes * psi_stride],
            p0_stride,
            psi_stride,
        }
    }

    /// Scratch slices owned by node `i`
    pub fn node_mut(&mut self, i: usize) -> (&mut [f64], &mut [f64]) {
        let p0 = &mut self.p0[i * self.p0_stride..(i + 1) * self.p0_stride];
        let psi = &mut self.psi[i * self.psi_stride..(i + 1) * self.psi_stride];
        (p0, psi)
    }

    /// Both arenas with their per-node strides, for chunked parallel sweeps
    pub fn arenas_mut(&mut self) -> (&mut [f64], usize, &mut [f64], usize) {
        (&mut self.p0, self.p0_stride, &mut self.psi, self.psi_stride)
    }
}

// =================================================================================================
// Tests
// =================================================================================================
