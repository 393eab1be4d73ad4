//! Domain types and business rules
//!
//! This module contains the core domain types for Logship:
//! - Upload policy, transport selection and endpoint parsing
//! - File queue entries and extension classes
//! - Per-file and per-job transfer results
//! - Connectivity state
//! - Domain-specific error types

pub mod connectivity;
pub mod errors;
pub mod policy;
pub mod queue;
pub mod transfer;

// Re-export commonly used types
pub use connectivity::ConnectivityState;
pub use errors::{DomainError, TransportError, TransportStage, UploadError};
pub use policy::{
    parse_share_interval, Credentials, Endpoint, HostKeyPolicy, TransportKind, UploadPolicy,
    DEFAULT_SHARE_INTERVAL_MINUTES,
};
pub use queue::{ExtensionClass, FileQueueEntry};
pub use transfer::{FileReport, FileResult, JobId, JobOutcome, JobReport};
