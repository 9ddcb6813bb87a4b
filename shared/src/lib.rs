//! Types shared between the reconciliation engine, the HTTP backend and its CLI.

pub mod api;
pub mod models;
