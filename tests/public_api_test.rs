// Tests for the public building blocks used outside the scheduler
// WHY: Consumers may drive ScanSession and the guard directly, without the actor

use originality_scan::{
    hash_content, GuardDecision, RescanSafetyGuard, ScanConfig, ScanResult, ScanSession,
    ScanStatus,
};
use std::sync::Arc;
use tempfile::TempDir;

fn scanned(text: &str, score: f64) -> ScanSession {
    let mut session = ScanSession::new(text);
    let snapshot = session.begin_scan().expect("idle session can start a scan");
    session
        .complete_scan(
            snapshot,
            Arc::new(ScanResult {
                overall_score: score,
                matches: vec![],
                words_scanned: text.split_whitespace().count() as u64,
            }),
        )
        .expect("scanning session can complete");
    session
}

#[test]
fn test_last_scanned_hash_matches_content() {
    let session = scanned("The quick brown fox", 92.0);
    let content = session.last_scanned_content().expect("content recorded");
    assert_eq!(session.last_scanned_hash(), Some(hash_content(content)));
    assert_eq!(session.status(), ScanStatus::Protected);
}

#[test]
fn test_guard_decisions_follow_configured_threshold() {
    let session = scanned("one two three four five six seven eight nine ten", 80.0);
    // 10 shared of 11 distinct tokens = 91
    let edited = "one two three four five six seven eight nine ten eleven";

    let strict = RescanSafetyGuard::new(ScanConfig::default().rescan_similarity_threshold);
    assert_eq!(
        strict.evaluate(edited, &session),
        GuardDecision::AskConfirmation { similarity: 91 }
    );

    let relaxed = RescanSafetyGuard::new(95);
    assert_eq!(relaxed.evaluate(edited, &session), GuardDecision::Proceed);
}

#[test]
fn test_config_file_drives_guard() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("scan.toml");
    std::fs::write(&path, "rescan_similarity_threshold = 50\ndebounce_ms = 250\n")
        .expect("Failed to write config");

    let config = ScanConfig::load(&path).expect("config should load");
    assert_eq!(config.debounce_ms, 250);

    let session = scanned("a b c d", 70.0);
    let guard = RescanSafetyGuard::new(config.rescan_similarity_threshold);
    assert_eq!(
        guard.evaluate("a b c e", &session),
        GuardDecision::AskConfirmation { similarity: 60 }
    );
}
