//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! upload engine. The engine depends on these interfaces; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITransport`] / [`ITransportFactory`] - FTP, FTPS and SFTP sessions
//! - [`ISettingsStore`] - Upload policy snapshots and change notifications
//! - [`INotificationService`] - User-visible activity and error messages
//! - [`IReachabilitySource`] - OS-reported internet reachability

pub mod notification;
pub mod reachability;
pub mod settings;
pub mod transport;

pub use notification::INotificationService;
pub use reachability::{IReachabilitySource, ReachabilityEvent};
pub use settings::{ISettingsStore, SettingKey};
pub use transport::{ITransport, ITransportFactory, SessionTarget};
