//! # raylink-node
//!
//! Runs one side of the ray relay over TCP.
//!
//! ## Roles
//!
//! - **Capture**: listens for display nodes, turns operator taps into
//!   rays against the tracked anchor and logs where replies land.
//! - **Display**: connects to the capture node, resolves each ray
//!   against a configured scene and answers on the same connection.

pub mod config;
pub mod service;
