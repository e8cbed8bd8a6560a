//! Shared test utilities for projdup
//!
//! - Workspace fixtures with a populated source and a partly populated target
//! - Host and controller wiring

pub mod fixtures;
