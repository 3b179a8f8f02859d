#![deny(missing_docs)]

//! Core library for the Firegate JSON API.

/// HTTP routing and REST handlers.
pub mod api;
/// Collections exposed over HTTP and their validation rules.
pub mod catalog;
/// Environment-driven configuration management.
pub mod config;
/// Identity provider abstraction and the Identity Toolkit client.
pub mod identity;
/// Structured logging and tracing setup.
pub mod logging;
/// Search and pagination over fetched records.
pub mod query;
/// Request-level operations shared by every route.
pub mod service;
/// Object storage abstraction and the Firebase Storage client.
pub mod storage;
/// Firestore document store integration.
pub mod store;

#[cfg(test)]
mod test_support;
