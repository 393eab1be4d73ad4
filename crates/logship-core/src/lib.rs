//! Logship Core - Domain types, configuration and ports
//!
//! This crate contains the pieces every other Logship crate agrees on:
//! - **Domain types** - `UploadPolicy`, `FileQueueEntry`, `JobReport`, `ConnectivityState`
//! - **Configuration** - YAML-backed [`config::Config`] with validation and a builder
//! - **Settings store** - [`settings::FileSettingsStore`], the default settings collaborator
//! - **Port definitions** - Traits for adapters: `ITransport`, `ISettingsStore`,
//!   `INotificationService`, `IReachabilitySource`
//!
//! # Architecture
//!
//! The domain module holds plain data and validation with no I/O. Ports
//! define the trait interfaces that the upload engine depends on; their
//! implementations live in `logship-transport` and `logship-daemon`.

pub mod config;
pub mod domain;
pub mod ports;
pub mod settings;
