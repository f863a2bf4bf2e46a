//! # Keys
//!
//! Usage:
//! ```no_run
//!     use oberon_ffi::Oberon;
//!
//!     let oberon = Oberon::global().unwrap();
//!
//!     // Secret key, only for the issuer
//!     let secret_key = oberon.new_secret_key().unwrap();
//!     // Public key, for verifiers
//!     let public_key = secret_key.public_key(&oberon).unwrap();
//!
//!     // The same seed always gives the same key
//!     let seeded = oberon.secret_key_from_seed(b"my super secret key seed").unwrap();
//!     assert_eq!(seeded, oberon.secret_key_from_seed(b"my super secret key seed").unwrap());
//! ```

use core::fmt;

use crate::context::Oberon;
use crate::error::{EngineCall, Result};
use crate::ffi::{call_output, call_output_unchecked, ByteArray};
use crate::tokens::Token;
use crate::util::fingerprint;

entity! {
    /// The issuer's signing key
    SecretKey => SecretKey
}

entity! {
    /// The verification key belonging to exactly one secret key
    PublicKey => PublicKey
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", fingerprint(self.as_bytes()))
    }
}

impl Oberon {
    /// A fresh random secret key; randomness comes from the engine
    pub fn new_secret_key(&self) -> Result<SecretKey> {
        let engine = self.engine();
        call_output_unchecked(engine, EngineCall::NewSecretKey, |out| {
            engine.new_secret_key(out)
        })
        .map(SecretKey::from_engine)
    }

    /// Deterministic secret key from a seed of any length
    pub fn secret_key_from_seed(&self, seed: impl AsRef<[u8]>) -> Result<SecretKey> {
        let engine = self.engine();
        let seed = ByteArray::new(seed.as_ref());
        call_output_unchecked(engine, EngineCall::SecretKeyFromSeed, |out| {
            engine.secret_key_from_seed(seed, out)
        })
        .map(SecretKey::from_engine)
    }

    pub fn public_key(&self, secret_key: &SecretKey) -> Result<PublicKey> {
        let engine = self.engine();
        let sk = ByteArray::new(secret_key.as_bytes());
        call_output(engine, EngineCall::GetPublicKey, |out, err| {
            engine.get_public_key(sk, out, err)
        })
        .map(PublicKey::from_engine)
    }
}

impl SecretKey {
    pub fn new(oberon: &Oberon) -> Result<Self> {
        oberon.new_secret_key()
    }

    pub fn from_seed(oberon: &Oberon, seed: impl AsRef<[u8]>) -> Result<Self> {
        oberon.secret_key_from_seed(seed)
    }

    pub fn public_key(&self, oberon: &Oberon) -> Result<PublicKey> {
        oberon.public_key(self)
    }

    /// Issue a token for `id`
    pub fn new_token(&self, oberon: &Oberon, id: impl AsRef<[u8]>) -> Result<Token> {
        oberon.new_token(self, id)
    }
}
