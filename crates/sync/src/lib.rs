//! Marketplace synchronization.
//!
//! This crate provides:
//! - The [`PlatformAdapter`] contract and an [`AdapterSet`] keyed by platform
//! - A simulated [`InMemoryPlatformAdapter`] with fault injection
//! - The credential store port
//! - Bounded retry of transient platform failures
//! - The [`SyncOrchestrator`], which turns per-item outcomes into one
//!   [`SyncResult`]

pub mod adapter;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod result;
pub mod retry;

pub use adapter::{AdapterSet, Credentials, PlatformAdapter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MirrorPolicy, SyncConfig};
pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use error::{AdapterError, Result, SyncError};
pub use memory::{InMemoryPlatformAdapter, RemoteListing};
pub use orchestrator::{OrderStatusChange, SyncOrchestrator};
pub use result::{ItemError, SyncItem, SyncResult, SyncScope};
pub use retry::{BackoffStrategy, RetryPolicy};
