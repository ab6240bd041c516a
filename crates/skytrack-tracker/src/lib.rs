//! Shared library surface for the tracker binary and its tests.

pub mod canvas;
pub mod commands;
pub mod config;
pub mod loops;
pub mod state;
