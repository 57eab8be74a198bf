//! Integration tests for the concord synchronization engine

mod cli_commands;
mod config_integration;
mod contract_interface;
mod convergence;
mod coordinator;
mod delta_sync;
