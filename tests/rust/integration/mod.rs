//! Integration tests - full define/save/read/delete cycles through the public store API
//!
//! These tests run against the in-memory backend, which interprets the same statements
//! that would be sent to PostgreSQL.

mod common;
mod garage_scenario_tests;
mod hierarchy_tests;
mod lifecycle_tests;
