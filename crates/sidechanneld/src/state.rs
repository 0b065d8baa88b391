//! In-memory update state shared by the polling task and apply requests.
//!
//! Recreated at every process start; a fresh check after a restart rebuilds
//! it. The lock is only held for short synchronous sections, never across an
//! await.

use chrono::{DateTime, Utc};
use sidechannel_shared::UpdateStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateState {
    /// A remote revision ahead of local has been seen and announced
    pub pending_update: bool,
    /// Remote revision of the last announcement
    pub pending_sha: Option<String>,
    /// An apply or rollback sequence is running
    pub applying: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl UpdateState {
    /// Record a divergence at `remote_sha`.
    ///
    /// Returns true when this revision has not been announced yet.
    pub fn record_divergence(&mut self, remote_sha: &str) -> bool {
        if self.pending_sha.as_deref() == Some(remote_sha) {
            self.pending_update = true;
            return false;
        }
        self.pending_update = true;
        self.pending_sha = Some(remote_sha.to_string());
        true
    }

    pub fn clear_pending(&mut self) {
        self.pending_update = false;
        self.pending_sha = None;
    }

    pub fn snapshot(&self) -> UpdateStatus {
        UpdateStatus {
            pending_update: self.pending_update,
            pending_sha: self.pending_sha.clone(),
            applying: self.applying,
            last_checked_at: self.last_checked_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Why an apply could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyRefusal {
    NothingPending,
    AlreadyApplying,
}

#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<UpdateState>>);

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, UpdateState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&UpdateState) -> R) -> R {
        f(&*self.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut UpdateState) -> R) -> R {
        f(&mut *self.lock())
    }

    pub fn snapshot(&self) -> UpdateStatus {
        self.lock().snapshot()
    }

    /// Claim the single apply slot.
    ///
    /// `applying` stays set until the returned guard is dropped.
    pub fn begin_apply(&self) -> Result<ApplyGuard, ApplyRefusal> {
        let mut state = self.lock();
        if state.applying {
            return Err(ApplyRefusal::AlreadyApplying);
        }
        if !state.pending_update {
            return Err(ApplyRefusal::NothingPending);
        }
        state.applying = true;
        Ok(ApplyGuard {
            state: self.clone(),
        })
    }
}

/// Holds the apply slot; releases it on drop, including on panic
#[derive(Debug)]
pub struct ApplyGuard {
    state: SharedState,
}

impl Drop for ApplyGuard {
    fn drop(&mut self) {
        self.state.write(|s| s.applying = false);
    }
}
