//! Utility modules: retry, timeout, history truncation.

pub mod retry;
pub mod timeout;
pub mod truncation;
