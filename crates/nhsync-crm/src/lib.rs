//! nhsync CRM adapter
//!
//! Capability interface over the CRM tenant plus two implementations:
//!
//! - [`SalesforceClient`]: REST data plane, Tooling API metadata plane, OAuth2
//!   client-credentials authentication
//! - [`InMemoryCrm`]: a process-local tenant enforcing the same invariants
//!   (unique business keys, known fields only, idempotent describe)
//!
//! Pipelines only see `&dyn CrmClient`.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod memory;
pub mod query;
pub mod salesforce;
pub mod types;

pub use auth::CrmConfig;
pub use client::{CrmClient, FieldInfo, ObjectDescription, RecordRef};
pub use error::{CrmError, Result};
pub use memory::{CrmCall, InMemoryCrm};
pub use query::RecordQuery;
pub use salesforce::SalesforceClient;
