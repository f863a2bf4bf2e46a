//! # Tokens and blindings
//!
//! A token is the issuer's signature over an identifier. Blinding factors can be subtracted
//! from a token so that it is useless without them, and added back to undo that. The same
//! factors, in the same order, are handed to the proof builder later.
//!
//! ```no_run
//!     use oberon_ffi::Oberon;
//!
//!     let oberon = Oberon::global().unwrap();
//!     let secret_key = oberon.new_secret_key().unwrap();
//!     let public_key = secret_key.public_key(&oberon).unwrap();
//!
//!     let token = secret_key.new_token(&oberon, b"ed25519").unwrap();
//!     assert!(token.verify(&oberon, b"ed25519", &public_key).unwrap());
//!
//!     // Require a pin before the token can be used
//!     let blinded = token.add_blinding(&oberon, b"1234").unwrap();
//!     assert_eq!(blinded.remove_blinding(&oberon, b"1234").unwrap(), token);
//! ```

use core::fmt;

use crate::context::Oberon;
use crate::error::{EngineCall, Result};
use crate::ffi::{call_output, call_output_unchecked, call_verify, ByteArray};
use crate::keys::{PublicKey, SecretKey};
use crate::proof::Proof;
use crate::util::fingerprint;

entity! {
    /// A signed credential over an identifier
    Token => Token
}

entity! {
    /// The engine's blinding value derived from some factor data
    Blinding => Blinding
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", fingerprint(self.as_bytes()))
    }
}

impl fmt::Debug for Blinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blinding({})", fingerprint(self.as_bytes()))
    }
}

impl Oberon {
    pub fn new_token(&self, secret_key: &SecretKey, id: impl AsRef<[u8]>) -> Result<Token> {
        let engine = self.engine();
        let sk = ByteArray::new(secret_key.as_bytes());
        let id = ByteArray::new(id.as_ref());
        call_output(engine, EngineCall::NewToken, |out, err| {
            engine.new_token(sk, id, out, err)
        })
        .map(Token::from_engine)
    }

    /// `Ok(false)` when the token was not issued for `id` under this key; `Err` only when the
    /// engine finds the token or key malformed
    pub fn verify_token(
        &self,
        token: &Token,
        public_key: &PublicKey,
        id: impl AsRef<[u8]>,
    ) -> Result<bool> {
        let engine = self.engine();
        let token = ByteArray::new(token.as_bytes());
        let pk = ByteArray::new(public_key.as_bytes());
        let id = ByteArray::new(id.as_ref());
        call_verify(engine, EngineCall::VerifyToken, |err| {
            engine.verify_token(token, pk, id, err)
        })
    }

    pub fn create_blinding(&self, data: impl AsRef<[u8]>) -> Result<Blinding> {
        let engine = self.engine();
        let data = ByteArray::new(data.as_ref());
        call_output_unchecked(engine, EngineCall::CreateBlinding, |out| {
            engine.create_blinding(data, out)
        })
        .map(Blinding::from_engine)
    }

    /// Blind a token with the factor data
    pub fn add_blinding(&self, token: &Token, factor: impl AsRef<[u8]>) -> Result<Token> {
        let engine = self.engine();
        let token = ByteArray::new(token.as_bytes());
        let factor = ByteArray::new(factor.as_ref());
        call_output(engine, EngineCall::AddBlinding, |out, err| {
            engine.add_blinding(token, factor, out, err)
        })
        .map(Token::from_engine)
    }

    /// Undo [`Oberon::add_blinding`].
    ///
    /// Removing a factor that was never added is not an error; the resulting token just fails
    /// every later verification.
    pub fn remove_blinding(&self, token: &Token, factor: impl AsRef<[u8]>) -> Result<Token> {
        let engine = self.engine();
        let token = ByteArray::new(token.as_bytes());
        let factor = ByteArray::new(factor.as_ref());
        call_output(engine, EngineCall::RemoveBlinding, |out, err| {
            engine.remove_blinding(token, factor, out, err)
        })
        .map(Token::from_engine)
    }
}

impl Token {
    pub fn verify(
        &self,
        oberon: &Oberon,
        id: impl AsRef<[u8]>,
        public_key: &PublicKey,
    ) -> Result<bool> {
        oberon.verify_token(self, public_key, id)
    }

    pub fn add_blinding(&self, oberon: &Oberon, factor: impl AsRef<[u8]>) -> Result<Token> {
        oberon.add_blinding(self, factor)
    }

    pub fn remove_blinding(&self, oberon: &Oberon, factor: impl AsRef<[u8]>) -> Result<Token> {
        oberon.remove_blinding(self, factor)
    }

    /// Prove possession of this token for `id` and `nonce`.
    ///
    /// `blindings` are the factors that were added to the token, in the order they were added.
    pub fn create_proof<I>(
        &self,
        oberon: &Oberon,
        id: impl AsRef<[u8]>,
        blindings: I,
        nonce: impl AsRef<[u8]>,
    ) -> Result<Proof>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        oberon.create_proof(self, id, blindings, nonce)
    }
}

impl Blinding {
    pub fn from_data(oberon: &Oberon, data: impl AsRef<[u8]>) -> Result<Self> {
        oberon.create_blinding(data)
    }
}
