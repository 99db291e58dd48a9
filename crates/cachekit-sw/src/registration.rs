//! Registration surface.
//!
//! The hosting runtime owns the mechanics of standing between pages and
//! the network; this module owns the order of operations. [`register`]
//! drives the controller through install and activation and then nudges
//! the companion worker to sweep expired entries; [`Registration`] is the
//! handle that can later tear everything down.

use std::sync::Arc;

use cachekit_store::BucketStore;
use tracing::{error, info, warn};

use crate::lifecycle::LifecycleController;
use crate::purge::{PurgeChannel, WorkerCommand};
use crate::SwError;

/// The seam to the hosting runtime's registration mechanism.
///
/// The controller calls these; the runtime is expected to invoke the
/// controller's `on_install` / `on_activate` / `on_fetch` for its
/// lifecycle events in return.
pub trait RegistrationHost: Send + Sync {
    /// Activate the newly installed worker immediately instead of waiting
    /// for every controlled client to close.
    fn skip_waiting(&self);

    /// Take control of already-open clients.
    fn claim(&self) -> Result<(), SwError>;

    /// Tear down the intercepting registration. Returns whether a
    /// registration existed.
    fn unregister(&self) -> Result<bool, SwError>;
}

/// A live registration.
pub struct Registration {
    host: Arc<dyn RegistrationHost>,
    store: BucketStore,
}

/// Drive the full lifecycle against `host`, then opportunistically request
/// an expired-entry sweep from the companion worker.
///
/// Install is best-effort (see [`InstallReport`](crate::InstallReport));
/// partial precache failure is logged here but does not block
/// registration. The purge request is fire-and-forget: failure to deliver
/// is logged, never escalated.
pub async fn register(
    controller: &LifecycleController,
    host: Arc<dyn RegistrationHost>,
    purge: &PurgeChannel,
) -> Registration {
    let report = controller.on_install(host.as_ref()).await;
    if !report.is_complete() {
        warn!(
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install finished with failures"
        );
    }

    controller.on_activate(host.as_ref()).await;
    info!("registered");

    if let Err(e) = purge.post(&WorkerCommand::purge_expired()) {
        warn!(error = %e, "purge request not delivered");
    }

    Registration {
        host,
        store: controller.store().clone(),
    }
}

impl Registration {
    /// Clear every cache bucket and tear down the registration.
    ///
    /// The caches are cleared even if the teardown itself then fails; a
    /// failed teardown is logged and surfaced to the caller.
    pub async fn unregister(self) -> Result<bool, SwError> {
        self.store.clear_all().await;

        match self.host.unregister() {
            Ok(existed) => {
                info!(existed, "UNREGISTERED");
                Ok(existed)
            }
            Err(e) => {
                error!(error = %e, "unregistration failed");
                Err(e)
            }
        }
    }
}
