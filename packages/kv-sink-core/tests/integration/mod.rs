//! Integration tests for the operation log.
//!
//! 1. Reorg scenarios: single block, multi-block undo survival, fork replay
//! 2. Flush and checkpoint behavior
//! 3. File-backed store recovery

pub mod file_store_tests;
pub mod flush_tests;
pub mod helpers;
pub mod reorg_tests;
