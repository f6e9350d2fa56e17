//! Utility functions for the engine

pub mod sort;
pub mod time;
