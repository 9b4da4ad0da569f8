//! Dataverse-style source connector for recordflow
//!
//! Adapts a CRM entity store's change-tracking API to the engine's
//! [`ChangeFeed`](recordflow_api::ChangeFeed) contract:
//!
//! - `client` - DataverseClient (HTTP client for the changes endpoint)
//! - `models` - wire models for change pages
//! - `feed` - DataverseChangeFeed, the ChangeFeed implementation

pub mod client;
pub mod feed;
pub mod models;

pub use client::{DataverseClient, DataverseError};
pub use feed::DataverseChangeFeed;
pub use models::{ChangesPage, EntityChange};
