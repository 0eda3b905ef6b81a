// WHY: Pre-flight policy for the rate-limited remote service. Near-duplicates of
// the last scan need explicit consent; exact duplicates are served from cache.

use std::sync::Arc;
use tracing::debug;

use crate::hasher::hash_content;
use crate::model::ScanResult;
use crate::session::ScanSession;
use crate::similarity::estimate_similarity;

/// What the scheduler should do with a scan request
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Call the remote service
    Proceed,
    /// Show the user `similarity` and wait for explicit consent
    AskConfirmation { similarity: u8 },
    /// Content is unchanged since the last scan; reuse its result
    ServeCache(Arc<ScanResult>),
}

#[derive(Debug, Clone, Copy)]
pub struct RescanSafetyGuard {
    threshold: u8,
}

impl Default for RescanSafetyGuard {
    fn default() -> Self {
        Self::new(85)
    }
}

impl RescanSafetyGuard {
    /// Confirmation is required when similarity is strictly above `threshold`
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn evaluate(&self, new_content: &str, session: &ScanSession) -> GuardDecision {
        let hash = hash_content(new_content);
        if let Some(result) = session.cached_result_for(hash) {
            debug!(hash = %hash.short(), "Content unchanged since last scan");
            return GuardDecision::ServeCache(Arc::clone(result));
        }

        if let Some(last) = session.last_scanned_content() {
            let similarity = estimate_similarity(new_content, last);
            if similarity > self.threshold {
                debug!(similarity, threshold = self.threshold, "Rescan of near-duplicate content");
                return GuardDecision::AskConfirmation { similarity };
            }
            debug!(similarity, threshold = self.threshold, "Content changed enough to rescan");
        }

        GuardDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanned_session(text: &str) -> ScanSession {
        let mut session = ScanSession::new(text);
        let snapshot = session.begin_scan().unwrap();
        session
            .complete_scan(
                snapshot,
                Arc::new(ScanResult {
                    overall_score: 92.0,
                    matches: vec![],
                    words_scanned: 4,
                }),
            )
            .unwrap();
        session
    }

    #[test]
    fn test_first_scan_proceeds() {
        let session = ScanSession::new("anything");
        assert_eq!(
            RescanSafetyGuard::default().evaluate("anything", &session),
            GuardDecision::Proceed
        );
    }

    #[test]
    fn test_identical_content_served_from_cache() {
        let session = scanned_session("The quick brown fox");
        match RescanSafetyGuard::default().evaluate("The quick brown fox", &session) {
            GuardDecision::ServeCache(result) => assert_eq!(result.overall_score, 92.0),
            other => panic!("expected cache hit, got {other:?}"),
        }
    }

    #[test]
    fn test_sixty_percent_proceeds() {
        let session = scanned_session("a b c d");
        assert_eq!(
            RescanSafetyGuard::default().evaluate("a b c e", &session),
            GuardDecision::Proceed
        );
    }

    #[test]
    fn test_near_duplicate_asks_confirmation() {
        let last = "students must cite every source they paraphrase in a research essay";
        let session = scanned_session(last);
        let edited = "students must cite every source that they paraphrase in a research essay";
        assert_eq!(
            RescanSafetyGuard::default().evaluate(edited, &session),
            GuardDecision::AskConfirmation { similarity: 92 }
        );
    }

    #[test]
    fn test_whitespace_only_edit_asks_confirmation() {
        let session = scanned_session("The quick brown fox");
        assert_eq!(
            RescanSafetyGuard::default().evaluate("The quick brown fox ", &session),
            GuardDecision::AskConfirmation { similarity: 100 }
        );
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 3 shared of 4 distinct tokens = 75
        let session = scanned_session("a b c");
        let guard = RescanSafetyGuard::new(75);
        assert_eq!(guard.evaluate("a b c d", &session), GuardDecision::Proceed);

        let guard = RescanSafetyGuard::new(74);
        assert_eq!(
            guard.evaluate("a b c d", &session),
            GuardDecision::AskConfirmation { similarity: 75 }
        );
    }
}
