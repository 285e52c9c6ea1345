//! # Rebus Store
//!
//! Low-level Redis client for the rebus transport.
//!
//! ## Design Principles
//!
//! - **No queue logic** - pure infrastructure layer
//! - **No dependencies** on other rebus-* crates
//! - **Generic operations** - counters, lists, sets, expiry, scripts
//!
//! ## Features
//!
//! - Connection management with automatic reconnection
//! - Key-value operations
//! - Expiry and TTL management
//! - Atomic operations (INCR, Lua scripts)
//! - List and set operations
//!
//! ## Example
//!
//! ```rust,no_run
//! use rebus_store::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!
//!     let id = client.incr("rebus:message:counter").await?;
//!     client.set_ex(&format!("rebus:transaction:{}", id), id, 60).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::{RedisError, Script};

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
