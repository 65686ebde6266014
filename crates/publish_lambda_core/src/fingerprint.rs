use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Base64 SHA-256 of a deployment package, the encoding Lambda reports as
/// `CodeSha256`.
pub fn code_sha256(archive: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(archive);
    STANDARD.encode(hasher.finalize())
}
