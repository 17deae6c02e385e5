//! services/api/src/lib.rs
//!
//! The HTTP service: database and generation adapters, configuration and the
//! Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
