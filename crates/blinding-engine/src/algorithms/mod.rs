//! # Algorithms Module
//!
//! Randomization strategies. Every strategy is a pure function over the
//! study snapshot and an injected random source, so seeded runs are
//! reproducible.

pub mod adaptive;
pub mod assignment;
pub mod block;
pub mod minimization;
pub mod simple;
pub mod stratified;

pub use adaptive::{adaptive_assign, ranked_gaps};
pub use assignment::{assign, ArmAssignment, AssignmentInput};
pub use block::{block_assign, block_position, generate_block};
pub use minimization::{imbalance_scores, minimization_assign};
pub use simple::{simple_assign, weighted_index};
pub use stratified::{stratified_assign, stratum_key};
