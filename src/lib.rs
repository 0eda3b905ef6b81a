pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod hasher;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod similarity;
pub mod timer;

// Re-export main types for convenient access
pub use client::{HttpScanClient, RemoteScanClient, ScanRequest};
pub use config::ScanConfig;
pub use error::{ConfigError, ResultError, ScanError, ScanErrorKind, SessionClosed, SessionError};
pub use guard::{GuardDecision, RescanSafetyGuard};
pub use hasher::{hash_content, ContentHash};
pub use model::{Match, MatchClassification, MatchSeverity, ScanResult, SeverityCounts};
pub use scheduler::{ScanEvent, ScanHandle, ScanScheduler, SessionView};
pub use session::{ScanSession, ScanStatus};
pub use similarity::estimate_similarity;
