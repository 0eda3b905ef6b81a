// WHY: Content fingerprints let the scheduler recognise unchanged text without
// holding a second copy of it or calling the remote service again

use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed-size SHA-256 digest of document text
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for log lines
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

/// Fingerprint text for cache-hit detection
/// WHY: pure function of the UTF-8 bytes; no normalisation, so any edit
/// (including whitespace) yields a different fingerprint
pub fn hash_content(text: &str) -> ContentHash {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    ContentHash(bytes)
}
