//! # Domain Module
//!
//! Core domain types for the blinding engine: the study aggregate, its
//! lifecycle state machine, errors and invariants.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod lifecycle;
pub mod mutation;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use lifecycle::*;
pub use mutation::*;
pub use value_objects::*;
