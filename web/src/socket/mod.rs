//! WebSocket endpoint for the web layer.
//!
//! This module only performs the HTTP upgrade and adapts axum's socket to the
//! hub's `Connection` trait. Registry, pumps and dispatch live in the `ws`
//! crate.

pub mod connection;
pub mod handler;
