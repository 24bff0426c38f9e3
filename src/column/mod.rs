//! Column grid, components and state
//!
//! The data model follows a strict split:
//! - [`ColumnGrid`]: immutable descriptor (resolution, operating conditions,
//!   sorption prefactors, flat array layout)
//! - [`GasComponent`]: immutable per-species descriptors
//! - [`BedState`] / [`Derivatives`]: the mutable arrays, allocated once
//! - [`EquilibriumCache`]: node-partitioned oracle scratch

mod component;
mod grid;
mod state;

pub use component::{validate_components, GasComponent};
pub use grid::{ColumnGrid, ColumnParameters};
pub use state::{BedState, Derivatives, EquilibriumCache};
