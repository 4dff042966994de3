//! nhsync Common Library
//!
//! Shared types, utilities, and error handling for the nhsync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SyncError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: CRM field descriptors and Account payloads
//! - **Pacing**: the [`pacing::Sleeper`] seam used for throttling CRM calls
//!
//! # Example
//!
//! ```no_run
//! use nhsync_common::types::{FieldDescriptor, FieldKind};
//!
//! let field = FieldDescriptor::new("Account", "Overall_Rating__c", FieldKind::number(3, 1));
//! field.validate().unwrap();
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod pacing;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SyncError};
