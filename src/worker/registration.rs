//! Worker registration: which worker version is active, which is waiting,
//! and how a new version takes over.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::lifecycle::{FetchOutcome, MessageOutcome, OfflineWorker, WorkerState};
use super::request::FetchRequest;
use super::storage::CacheStorage;
use crate::error::Result;
use crate::models::ControlMessage;

#[derive(Default)]
struct Slots {
    active: Option<Arc<OfflineWorker>>,
    waiting: Option<Arc<OfflineWorker>>,
    /// Version that has claimed the open clients.
    controller: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active_version: Option<String>,
    pub active_state: Option<WorkerState>,
    pub waiting_version: Option<String>,
    pub controller: Option<String>,
    pub cache_names: Vec<String>,
    pub revalidation_failures: u64,
}

pub struct Registration {
    storage: CacheStorage,
    slots: RwLock<Slots>,
    /// Held for a whole install or activation so only one runs at a time.
    transition: Mutex<()>,
}

impl Registration {
    pub fn new(storage: CacheStorage) -> Self {
        Self {
            storage,
            slots: RwLock::new(Slots::default()),
            transition: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    // == Register ==
    /// Installs `worker` and, if it skips waiting, activates it.
    ///
    /// A failed install leaves the current active worker in control.
    /// Registering the version that is already active is a no-op.
    pub async fn register(&self, worker: OfflineWorker) -> Result<WorkerState> {
        let _transition = self.transition.lock().await;

        let active = self.slots.read().await.active.clone();
        if let Some(active) = active {
            if active.version() == worker.version() {
                info!("Worker {} already active", worker.version());
                return Ok(active.state().await);
            }
        }

        let worker = Arc::new(worker);
        worker.on_install().await?;

        if worker.config().skip_waiting {
            self.activate(worker).await?;
            return Ok(WorkerState::Activated);
        }

        let replaced = self.slots.write().await.waiting.replace(worker.clone());
        if let Some(replaced) = replaced {
            replaced.set_state(WorkerState::Redundant).await;
        }
        info!("Worker {} installed and waiting", worker.version());
        Ok(WorkerState::Installed)
    }

    // == Skip Waiting ==
    /// Activates the waiting worker, if any, returning its version.
    pub async fn skip_waiting(&self) -> Result<Option<String>> {
        let _transition = self.transition.lock().await;

        let waiting = self.slots.write().await.waiting.take();
        match waiting {
            Some(worker) => {
                let version = worker.version().to_string();
                self.activate(worker).await?;
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    /// Callers hold `transition`.
    async fn activate(&self, worker: Arc<OfflineWorker>) -> Result<()> {
        worker.on_activate().await?;

        let (previous, stale_waiting) = {
            let mut slots = self.slots.write().await;
            slots.controller = Some(worker.version().to_string());
            // A worker still waiting was installed before this one; its
            // precache is gone now, so it must never take over later.
            let stale_waiting = match slots.waiting.take() {
                Some(waiting) if !Arc::ptr_eq(&waiting, &worker) => Some(waiting),
                other => {
                    slots.waiting = other;
                    None
                }
            };
            (slots.active.replace(worker.clone()), stale_waiting)
        };

        if let Some(stale) = stale_waiting {
            stale.set_state(WorkerState::Redundant).await;
            info!(
                "Waiting worker {} discarded in favour of {}",
                stale.version(),
                worker.version()
            );
        }
        if let Some(previous) = previous {
            previous.set_state(WorkerState::Redundant).await;
            info!(
                "Worker {} superseded by {}",
                previous.version(),
                worker.version()
            );
        }
        info!("Worker {} now controls all clients", worker.version());
        Ok(())
    }

    // == Fetch ==
    /// Hands `request` to the active worker; without one, nothing is intercepted.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let active = self.slots.read().await.active.clone();
        match active {
            Some(worker) => worker.on_fetch(request).await,
            None => Ok(FetchOutcome::Bypassed),
        }
    }

    // == Message ==
    /// Delivers a control message, returning a human-readable summary.
    ///
    /// SKIP_WAITING concerns the waiting worker; CLEAR_CACHE goes to the
    /// worker in control, whose partitions are the ones being served.
    pub async fn post_message(&self, message: ControlMessage) -> Result<String> {
        let (active, waiting) = {
            let slots = self.slots.read().await;
            (slots.active.clone(), slots.waiting.clone())
        };

        let target = match message {
            ControlMessage::SkipWaiting => waiting.or(active),
            ControlMessage::ClearCache => active.or(waiting),
        };
        let Some(target) = target else {
            warn!("Control message {:?} with no registered worker", message);
            return Ok("No worker registered".to_string());
        };

        match target.on_message(&message).await {
            MessageOutcome::SkipWaitingRequested => match self.skip_waiting().await? {
                Some(version) => Ok(format!("Worker {} activated", version)),
                None => Ok("No worker waiting".to_string()),
            },
            MessageOutcome::CachesCleared { deleted } => {
                Ok(format!("Cleared {} cache partitions", deleted))
            }
        }
    }

    pub async fn status(&self) -> RegistrationStatus {
        let (active, waiting, controller) = {
            let slots = self.slots.read().await;
            (
                slots.active.clone(),
                slots.waiting.clone(),
                slots.controller.clone(),
            )
        };

        let active_state = match &active {
            Some(worker) => Some(worker.state().await),
            None => None,
        };

        RegistrationStatus {
            active_version: active.as_ref().map(|w| w.version().to_string()),
            active_state,
            waiting_version: waiting.as_ref().map(|w| w.version().to_string()),
            controller,
            cache_names: self.storage.keys().await,
            revalidation_failures: active.map_or(0, |w| w.revalidation_failures()),
        }
    }
}
