//! Remote server backend for knife-sync
//!
//! - [`RestApi`]: the transport capability (get/put/post/delete)
//! - [`MemoryServer`]: an in-process server, optionally persisted to JSON
//! - [`HttpRestApi`]: JSON over HTTP via `ureq`
//! - [`ServerTree`]: the server seen as an [`repo_tree::ObjectTree`]

pub mod endpoints;
pub mod error;
pub mod http;
pub mod memory;
pub mod rest;
pub mod server;

pub use error::{RestError, Result};
pub use http::HttpRestApi;
pub use memory::MemoryServer;
pub use rest::RestApi;
pub use server::ServerTree;
