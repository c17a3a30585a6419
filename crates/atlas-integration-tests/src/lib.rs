//! Integration test crate for the Atlas royalty engine.
//!
//! No library code. The tests under `tests/` drive agreements from storage
//! through the statement runner and check the stored statements.
//!
//! ```sh
//! cargo test -p atlas-integration-tests
//! ```
