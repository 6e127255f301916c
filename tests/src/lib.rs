//! # Blind-Trial Test Suite
//!
//! Unified test crate for the blinding engine.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── randomization_benchmarks.rs   # criterion: strategies and projection
//! └── src/
//!     ├── fixtures.rs                   # Shared study definitions and harness
//!     └── integration/                  # End-to-end flows through BlindingService
//!         ├── lifecycle_flows.rs
//!         ├── randomization_properties.rs
//!         ├── unblinding_flows.rs
//!         └── concurrency.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p blinding-tests
//!
//! # By category
//! cargo test -p blinding-tests integration::unblinding_flows::
//!
//! # Benchmarks
//! cargo bench -p blinding-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
