//! Shared fixtures for the unit tests of the store and its watchers
mod common;

pub use common::*;
