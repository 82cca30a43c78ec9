//! Command line driver for the epidemiology pipeline chains.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod summary;
