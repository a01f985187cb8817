//! # Liveness Probe
//!
//! Reconciles a stored in-progress status with what the execution host says
//! about the activation that wrote it. A worker killed between writing
//! IN_PROGRESS and writing a terminal status would otherwise block every
//! later run for the same target.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

use super::RunStatus;
use crate::error::Result;

/// Host's answer about one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationLiveness {
    Active,
    Inactive,
    Unknown,
}

/// Execution host that can report whether an activation is still running
#[async_trait]
pub trait ActivationHost: Send + Sync + Debug {
    async fn is_active(&self, activation_handle: &str) -> Result<ActivationLiveness>;
}

/// Outcome of reconciling a stored status with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// Stored status is not in progress
    NotRunning,
    /// Stored status is in progress and the host agrees
    Running,
    /// Stored status says in progress but the activation is gone or unknown
    Stale,
}

#[derive(Debug, Clone)]
pub struct LivenessProbe {
    host: Arc<dyn ActivationHost>,
}

impl LivenessProbe {
    pub fn new(host: Arc<dyn ActivationHost>) -> Self {
        Self { host }
    }

    /// Reconcile `status` against the host.
    ///
    /// `activation_handle` overrides the handle stored in the record. An
    /// in-progress record with no handle at all cannot be checked and is
    /// trusted as running.
    pub async fn check(
        &self,
        status: &RunStatus,
        activation_handle: Option<&str>,
    ) -> Result<LivenessVerdict> {
        if !status.status.is_in_progress() {
            return Ok(LivenessVerdict::NotRunning);
        }

        let Some(handle) = activation_handle.or(status.activation_handle.as_deref()) else {
            debug!(status = %status.status, "In-progress status has no activation handle, trusting it");
            return Ok(LivenessVerdict::Running);
        };

        match self.host.is_active(handle).await? {
            ActivationLiveness::Active => Ok(LivenessVerdict::Running),
            liveness => {
                warn!(
                    activation = %handle,
                    liveness = ?liveness,
                    stored_status = %status.status,
                    "Stale in-progress status: activation is no longer running"
                );
                Ok(LivenessVerdict::Stale)
            }
        }
    }

    /// True only when the stored status and the host agree the run is executing
    pub async fn is_in_progress(
        &self,
        status: &RunStatus,
        activation_handle: Option<&str>,
    ) -> Result<bool> {
        Ok(self.check(status, activation_handle).await? == LivenessVerdict::Running)
    }

    /// Ask the host directly about a handle, independent of any stored status
    pub async fn activation(&self, activation_handle: &str) -> Result<ActivationLiveness> {
        self.host.is_active(activation_handle).await
    }
}
