//! Common type aliases used across the codebase.

use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, send-safe future.
///
/// Lets the `Transport` and `Peer` traits return futures while staying usable
/// as `Arc<dyn _>` trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
