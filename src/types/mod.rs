//! Core types for Baton.

pub mod message;

pub use message::*;
