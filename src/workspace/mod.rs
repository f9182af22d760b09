//! Workspace REST client.
//!
//! One blocking client serves as conversation source, SQL engine and
//! registry store for a single space.

mod client;
mod wire;

pub use client::WorkspaceClient;
