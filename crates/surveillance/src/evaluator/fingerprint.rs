//! Deterministic killmail fingerprints used as match-cache keys.

use killwatch_core::Killmail;
use sha2::{Digest, Sha256};

use crate::index::Fingerprint;

/// SHA-256 over the killmail identity.
///
/// With an upstream hash the identity is `id:hash`; without one it is the
/// serialized normalized killmail, whose field order is fixed by the type.
pub fn generate_cache_key(km: &Killmail) -> Fingerprint {
    let digest = match &km.killmail_hash {
        Some(hash) => Sha256::digest(format!("km:{}:{}", km.killmail_id, hash).as_bytes()),
        None => {
            let body = serde_json::to_vec(km).unwrap_or_else(|_| format!("{km:?}").into_bytes());
            let mut hasher = Sha256::new();
            hasher.update(b"json:");
            hasher.update(&body);
            hasher.finalize()
        }
    };
    format!("{digest:x}")
}
