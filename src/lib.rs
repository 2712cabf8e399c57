//! Storage and retrieval for a forum: users, forums, threads, nested posts
//! and votes.
//!
//! [`ForumService`](service::ForumService) is the entry point. It runs over
//! any [`Store`](store::Store): the PostgreSQL-backed
//! [`Database`](models::Database) or the in-process
//! [`MemoryStore`](store::MemoryStore).

#[macro_use]
extern crate diesel;

pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod params;
pub mod schema;
pub mod service;
pub mod store;
pub mod tree;

pub use error::{Error, ErrorKind, Result};
pub use service::ForumService;
