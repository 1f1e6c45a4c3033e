//! Utility modules: timeout, atomic file writes.

pub mod fs;
pub mod timeout;
