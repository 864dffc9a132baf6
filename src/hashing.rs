//! Hashing - SHA-256 Fingerprints for Control Specs
//!
//! The JSON control spec is already canonical, so its bytes are hashed as-is.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Fingerprint of one JSON control spec.
pub fn compute_control_hash(json_control: &str) -> String {
    sha256_hex(json_control.as_bytes())
}

/// Compute job hash for audit logging
/// job_hash = sha256(policy_id:policy_version:json_control:engine_version)
pub fn compute_job_hash(
    policy_id: &str,
    policy_version: &str,
    json_control: &str,
    engine_version: &str,
) -> String {
    let combined = format!(
        "{}:{}:{}:{}",
        policy_id, policy_version, json_control, engine_version
    );
    sha256_hex(combined.as_bytes())
}
