use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::info;

use crate::errors::ServiceError;
use crate::models::{Disk, DiskProperties};

/// Behavior of the fake service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    polls_before_done: usize,
}

impl ServiceConfig {
    pub const DEFAULT_POLLS_BEFORE_DONE: usize = 2;

    /// Number of `Running` answers of an operation monitor before it completes.
    #[must_use]
    pub fn with_polls_before_done(mut self, polls_before_done: usize) -> Self {
        self.polls_before_done = polls_before_done;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            polls_before_done: Self::DEFAULT_POLLS_BEFORE_DONE,
        }
    }
}

#[derive(Debug, Clone)]
enum Effect {
    Create(Disk),
    Delete(String),
    Fail { code: String, message: String },
}

#[derive(Debug)]
struct Operation {
    remaining: usize,
    effect: Option<Effect>,
    outcome: Option<OperationStatus>,
}

/// What an operation monitor reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OperationStatus {
    Running,
    Succeeded { resource: Option<String> },
    Failed { code: String, message: String },
}

/// The application state
#[derive(Clone)]
pub(crate) struct AppState {
    started_at: Instant,
    config: ServiceConfig,
    disks: Arc<RwLock<HashMap<String, Disk>>>,
    operations: Arc<RwLock<HashMap<String, Operation>>>,
    next_operation: Arc<AtomicU64>,
}

impl AppState {
    pub(crate) fn new(config: ServiceConfig) -> Self {
        Self {
            started_at: Instant::now(),
            config,
            disks: Arc::default(),
            operations: Arc::default(),
            next_operation: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) async fn disk(&self, name: &str) -> Result<Disk, ServiceError> {
        let disks = self.disks.read().await;
        disks
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::DiskNotFound {
                name: name.to_string(),
            })
    }

    /// Starts creating or resizing a disk, returns the operation id and the disk as accepted.
    pub(crate) async fn begin_create_or_update(&self, name: &str, size_gb: u32) -> (String, Disk) {
        let accepted = Disk {
            name: name.to_string(),
            size_gb,
            properties: DiskProperties {
                provisioning_state: "Creating".to_string(),
            },
        };
        let effect = if size_gb == 0 {
            Effect::Fail {
                code: "InvalidDiskSize".to_string(),
                message: format!("disk '{name}' cannot have a size of 0 GB"),
            }
        } else {
            Effect::Create(Disk {
                properties: DiskProperties {
                    provisioning_state: "Succeeded".to_string(),
                },
                ..accepted.clone()
            })
        };
        let id = self.start(effect).await;

        (id, accepted)
    }

    /// Starts deleting a disk, returns the operation id.
    pub(crate) async fn begin_delete(&self, name: &str) -> Result<String, ServiceError> {
        self.disk(name).await?;
        Ok(self.start(Effect::Delete(name.to_string())).await)
    }

    async fn start(&self, effect: Effect) -> String {
        let id = format!("op-{}", self.next_operation.fetch_add(1, Ordering::Relaxed));
        info!(%id, ?effect, "operation started");
        let operation = Operation {
            remaining: self.config.polls_before_done,
            effect: Some(effect),
            outcome: None,
        };
        self.operations.write().await.insert(id.clone(), operation);
        id
    }

    /// Answers one poll of an operation monitor, completing it when due.
    pub(crate) async fn poll_operation(&self, id: &str) -> Result<OperationStatus, ServiceError> {
        let mut operations = self.operations.write().await;
        let operation = operations
            .get_mut(id)
            .ok_or_else(|| ServiceError::OperationNotFound { id: id.to_string() })?;

        if let Some(outcome) = &operation.outcome {
            return Ok(outcome.clone());
        }
        if operation.remaining > 0 {
            operation.remaining -= 1;
            return Ok(OperationStatus::Running);
        }

        let outcome = match operation.effect.take() {
            Some(Effect::Create(disk)) => {
                let resource = format!("/api/disks/{}", disk.name);
                self.disks.write().await.insert(disk.name.clone(), disk);
                OperationStatus::Succeeded {
                    resource: Some(resource),
                }
            }
            Some(Effect::Delete(name)) => {
                self.disks.write().await.remove(&name);
                OperationStatus::Succeeded { resource: None }
            }
            Some(Effect::Fail { code, message }) => OperationStatus::Failed { code, message },
            None => OperationStatus::Succeeded { resource: None },
        };
        info!(%id, ?outcome, "operation completed");
        operation.outcome = Some(outcome.clone());

        Ok(outcome)
    }
}
