//! # CacheKit SW
//!
//! Offline worker core for the CacheKit cache engine: lifecycle state
//! machine, fetch interception, and the purge side-channel.
//!
//! ## Features
//!
//! - **Lifecycle**: install (bulk precache), activate (stale-bucket sweep)
//! - **Fetch interception**: serve-from-cache with network fallback
//! - **Purge protocol**: companion worker sweeps expired entries on request
//! - **Registration**: explicit host seam, no ambient event target
//!
//! ## Architecture
//!
//! ```text
//! RegistrationHost (hosting runtime)
//!     │  on_install / on_activate / on_fetch
//!     ▼
//! LifecycleController ──── CacheFetcher ──── network
//!     │                        │
//!     └────── BucketStore ◄────┘
//!                 ▲
//! PurgeWorker ────┘  (PURGE_EXPIRED, outside the request path)
//! ```
//!
//! The hosting runtime invokes the controller's named methods for its
//! lifecycle events; the controller calls back through [`RegistrationHost`]
//! for `skip_waiting` and `claim`. Nothing here touches global state.

use thiserror::Error;

pub mod config;
pub mod lifecycle;
pub mod purge;
pub mod registration;

pub use cachekit_net::FetchError;
pub use config::CacheConfig;
pub use lifecycle::{FetchResponse, InstallReport, LifecycleController, WorkerPhase};
pub use purge::{PurgeChannel, PurgeWorker, WorkerCommand, PURGE_EXPIRED_ACTION};
pub use registration::{register, Registration, RegistrationHost};

/// Errors that can occur in the worker core.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Claim failed: {0}")]
    ClaimFailed(String),

    #[error("Unregistration failed: {0}")]
    UnregisterFailed(String),

    #[error("Purge delivery failed: {0}")]
    PurgeDeliveryFailed(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
}
