//! # Investment Core Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── ledger_benchmarks.rs   # reserve/release throughput
//! └── src/integration/
//!     ├── scenarios.rs           # end-to-end operator scenarios
//!     └── concurrency.rs         # races on capacity, mint and lifecycle
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ic-tests
//! cargo test -p ic-tests integration::concurrency::
//! cargo bench -p ic-tests
//! ```

pub mod integration;
