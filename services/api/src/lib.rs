//! JARVIS API Library Crate
//!
//! This library contains the HTTP surface of the JARVIS backend: configuration,
//! application state, request handlers, speech adapters and routing. The
//! `api` binary is a thin wrapper around this library.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod speech;
pub mod state;
