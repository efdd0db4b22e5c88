//! Core types and constants for the location sampling agent

pub mod types;
pub mod constants;
pub mod geodesy;

pub use types::*;
pub use constants::*;
pub use geodesy::surface_distance_m;
