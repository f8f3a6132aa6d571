use sha2::{Digest, Sha256};

/// Stable identifier for this machine and user, used as the trial contact.
pub fn device_fingerprint() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    fingerprint_of(&[&host, std::env::consts::OS, std::env::consts::ARCH, &user])
}

/// Hex SHA-256 over the `|`-joined parts.
pub fn fingerprint_of(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    hex::encode(hasher.finalize())
}
