//! Remote configuration service access.
//!
//! The engine only talks to [`ConfigApi`]; [`ClientFactory`] builds one for a
//! given base URL so a switched endpoint gets a fresh client.

pub mod client;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::{ConfigTriple, Parameter};

pub use client::{ClientConfig, HttpClientFactory, HttpConfigClient};

/// Request/response access to parameters keyed by triple and identifier.
///
/// Implementations do not retry.
#[async_trait]
pub trait ConfigApi: Send + Sync {
    /// `GET` one parameter.
    async fn fetch_parameter(
        &self,
        triple: &ConfigTriple,
        parameter_id: &str,
    ) -> Result<Parameter, SyncError>;

    /// `PUT` one parameter. Success carries no body; re-fetch to observe
    /// what the server accepted.
    async fn put_parameter(
        &self,
        triple: &ConfigTriple,
        parameter_id: &str,
        parameter: &Parameter,
    ) -> Result<(), SyncError>;
}

/// Builds a [`ConfigApi`] targeting one base URL.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, base_url: &str) -> Result<Arc<dyn ConfigApi>, SyncError>;
}
