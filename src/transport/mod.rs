//! Spatial discretization and momentum closures
//!
//! [`stencil`] turns a state snapshot into time derivatives;
//! [`momentum`] turns a pressure profile into a velocity profile.
//! Both are pure: they read snapshots and write caller-owned buffers.

pub mod momentum;
pub mod stencil;

pub use momentum::{CarrierGas, MomentumClosure};
pub use stencil::{mole_fraction_derivatives, partial_pressure_derivatives};
