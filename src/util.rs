//! Small helpers shared by the entity types

use rand::RngCore;
use sha2::{Digest, Sha512};

/// A fresh nonce for one proof request, from the thread-local CSPRNG
pub fn random_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Short hex tag for logs and `Debug`, never the bytes themselves
pub(crate) fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();

    // Domain separation from anything else hashing these bytes
    hasher.update(b"oberon-ffi fingerprint");
    hasher.update(bytes);

    hasher
        .finalize()
        .iter()
        .take(6)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
