//! Integration tests for projdup
//!
//! These tests drive capture, the store and apply together against an
//! in-memory host.

#[path = "../common/mod.rs"]
pub mod common;

pub mod snapshot_file;
pub mod transfer_flow;
