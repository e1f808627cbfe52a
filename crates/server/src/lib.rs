//! social-gateway server crate
//!
//! Route handlers, request schemas, and configuration for the HTTP gateway.
//! The binary in `main.rs` wires these together behind a clap CLI.

pub mod app;
pub mod args;
pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod requests;
pub mod routes;
