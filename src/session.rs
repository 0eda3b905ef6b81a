// WHY: Single owner of scan state. Status only changes through the transition
// methods below; everything else reads.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::SessionError;
use crate::hasher::{hash_content, ContentHash};
use crate::model::ScanResult;

/// Client-visible scan lifecycle. Cyclic, no terminal state.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Idle,
    Typing,
    Scanning,
    Protected,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Typing => "typing",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Protected => "protected",
        };
        f.write_str(name)
    }
}

/// Content frozen for an in-flight request
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    pub content: Arc<str>,
    pub hash: ContentHash,
}

/// How a completed scan relates to the content at completion time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Scanned content is still current; session is `Protected`
    Current,
    /// Content changed during the scan; session is `Idle`
    Stale,
}

/// State of one scan surface, from mount to unmount
#[derive(Debug, Default)]
pub struct ScanSession {
    status: ScanStatus,
    current_content: Arc<str>,
    current_hash: Option<ContentHash>,
    last_scanned_content: Option<Arc<str>>,
    last_scanned_hash: Option<ContentHash>,
    last_result: Option<Arc<ScanResult>>,
}

impl ScanSession {
    pub fn new(initial_content: impl Into<Arc<str>>) -> Self {
        let mut session = Self::default();
        session.update_content(initial_content.into());
        session
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn current_content(&self) -> &Arc<str> {
        &self.current_content
    }

    pub fn current_hash(&self) -> ContentHash {
        self.current_hash
            .unwrap_or_else(|| hash_content(&self.current_content))
    }

    pub fn last_scanned_content(&self) -> Option<&str> {
        self.last_scanned_content.as_deref()
    }

    pub fn last_scanned_hash(&self) -> Option<ContentHash> {
        self.last_scanned_hash
    }

    pub fn last_result(&self) -> Option<&Arc<ScanResult>> {
        self.last_result.as_ref()
    }

    pub fn is_scanning(&self) -> bool {
        self.status == ScanStatus::Scanning
    }

    /// Cached result for `hash`, if it is the fingerprint of the last scanned content
    pub fn cached_result_for(&self, hash: ContentHash) -> Option<&Arc<ScanResult>> {
        match self.last_scanned_hash {
            Some(last) if last == hash => self.last_result.as_ref(),
            _ => None,
        }
    }

    /// Replace the live text reference. Status is left alone.
    pub fn update_content(&mut self, content: Arc<str>) -> ContentHash {
        let hash = hash_content(&content);
        self.current_content = content;
        self.current_hash = Some(hash);
        hash
    }

    /// Idle/Protected/Typing -> Typing
    pub fn start_typing(&mut self) -> Result<(), SessionError> {
        self.transition(ScanStatus::Typing)
    }

    /// Typing/Protected -> Idle
    pub fn settle_idle(&mut self) -> Result<(), SessionError> {
        self.transition(ScanStatus::Idle)
    }

    /// Freeze the current content and enter `Scanning`
    pub fn begin_scan(&mut self) -> Result<ScanSnapshot, SessionError> {
        self.transition(ScanStatus::Scanning)?;
        Ok(ScanSnapshot {
            content: Arc::clone(&self.current_content),
            hash: self.current_hash(),
        })
    }

    /// Scanning -> Protected (or Idle when the content moved on meanwhile)
    pub fn complete_scan(
        &mut self,
        snapshot: ScanSnapshot,
        result: Arc<ScanResult>,
    ) -> Result<Completion, SessionError> {
        if self.status != ScanStatus::Scanning {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: ScanStatus::Protected,
            });
        }

        self.last_scanned_hash = Some(snapshot.hash);
        self.last_scanned_content = Some(snapshot.content);
        self.last_result = Some(result);

        if snapshot.hash == self.current_hash() {
            self.transition(ScanStatus::Protected)?;
            Ok(Completion::Current)
        } else {
            self.transition(ScanStatus::Idle)?;
            Ok(Completion::Stale)
        }
    }

    /// Scanning -> Idle. Previous result and snapshot are kept.
    pub fn fail_scan(&mut self) -> Result<(), SessionError> {
        if self.status != ScanStatus::Scanning {
            return Err(SessionError::InvalidTransition {
                from: self.status,
                to: ScanStatus::Idle,
            });
        }
        self.transition(ScanStatus::Idle)
    }

    /// Enter `Protected` without a remote call because the current content
    /// is exactly what was last scanned
    pub fn serve_cache(&mut self) -> Result<Arc<ScanResult>, SessionError> {
        let result = self
            .cached_result_for(self.current_hash())
            .cloned()
            .ok_or(SessionError::NothingCached)?;
        self.transition(ScanStatus::Protected)?;
        Ok(result)
    }

    fn transition(&mut self, to: ScanStatus) -> Result<(), SessionError> {
        use ScanStatus::*;

        let from = self.status;
        let allowed = match (from, to) {
            (Idle | Typing | Protected, Typing) => true,
            (Typing | Protected | Idle, Idle) => true,
            (Idle | Typing | Protected, Scanning) => true,
            (Scanning, Protected | Idle) => true,
            (Idle | Typing | Protected, Protected) => true,
            _ => false,
        };
        if !allowed {
            return Err(SessionError::InvalidTransition { from, to });
        }

        if from != to {
            debug!(%from, %to, "Scan status transition");
        }
        self.status = to;
        Ok(())
    }
}
