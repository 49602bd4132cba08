//! Shared test utilities for the knife-sync workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`repo`]: [`TestRepo`](repo::TestRepo), a temporary chef repository
//! - [`server`]: [`TestServer`](server::TestServer), a seeded in-memory server

pub mod repo;
pub mod server;

pub use repo::TestRepo;
pub use server::TestServer;
