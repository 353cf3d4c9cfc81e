//! Domain types shared across `fieldcrypt` crates.

pub mod model;

pub use model::{Customer, CustomerAddress, Identified};
