//! # Proofs
//!
//! A proof shows possession of a token for an identifier and a nonce without revealing the
//! token. It is built in an engine-side session, one call per input, through [`ProofBuilder`].
//! The builder's type parameter is the session state, so the calls can only be made in order:
//!
//! ```no_run
//!     use oberon_ffi::{random_nonce, Oberon};
//!
//!     let oberon = Oberon::global().unwrap();
//!     let secret_key = oberon.new_secret_key().unwrap();
//!     let public_key = secret_key.public_key(&oberon).unwrap();
//!     let token = secret_key.new_token(&oberon, b"ed25519").unwrap();
//!     let blinded = token.add_blinding(&oberon, b"1234").unwrap();
//!
//!     let nonce = random_nonce();
//!     let proof = oberon
//!         .proof_builder()
//!         .unwrap()
//!         .set_token(&blinded)
//!         .unwrap()
//!         .set_id(b"ed25519")
//!         .unwrap()
//!         .set_nonce(&nonce)
//!         .unwrap()
//!         .add_blinding(b"1234")
//!         .unwrap()
//!         .finish()
//!         .unwrap();
//!
//!     assert!(proof.verify(&oberon, b"ed25519", &public_key, &nonce).unwrap());
//! ```
//!
//! The session handle is given back to the engine exactly once, when the builder is dropped or
//! finished, whichever step failed.

use core::fmt;
use core::marker::PhantomData;

use crate::context::Oberon;
use crate::engine::Engine;
use crate::error::{EngineCall, Result};
use crate::ffi::{call_output, call_status, call_verify, ByteArray, ErrorSlot, ExternError};
use crate::keys::PublicKey;
use crate::tokens::Token;
use crate::util::fingerprint;

entity! {
    /// A one-time proof of token possession for an identifier and a nonce
    Proof => Proof
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({})", fingerprint(self.as_bytes()))
    }
}

// {{{ states

/// Session opened, nothing set
#[derive(Debug)]
pub struct Init;
#[derive(Debug)]
pub struct TokenSet;
#[derive(Debug)]
pub struct IdSet;
/// Every required input is set; blindings may follow
#[derive(Debug)]
pub struct NonceSet;

// }}}

// {{{ Session

/// An engine-side proof session, released on drop
struct Session<'o> {
    engine: &'o dyn Engine,
    handle: u64,
}

impl<'o> Session<'o> {
    fn open(engine: &'o dyn Engine) -> Result<Self> {
        let mut slot = ErrorSlot::new(engine, EngineCall::CreateProofInit);
        let handle = engine.create_proof_init(slot.record());
        if handle == 0 {
            // no handle, nothing to release
            return Err(slot.fail());
        }
        slot.check(0)?;
        tracing::trace!(handle, "proof session opened");
        Ok(Self { engine, handle })
    }

    fn step<F>(&self, call: EngineCall, f: F) -> Result<()>
    where
        F: FnOnce(&dyn Engine, u64, &mut ExternError) -> i32,
    {
        let (engine, handle) = (self.engine, self.handle);
        call_status(engine, call, |err| f(engine, handle, err))
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let mut slot = ErrorSlot::new(self.engine, EngineCall::CreateProofFree);
        // the session owns the handle and this is its only release
        unsafe { self.engine.create_proof_free(self.handle, slot.record()) };
        let record = slot.record();
        // A successful finish already retired the handle, engines may complain about that
        if record.is_populated() {
            let (code, message) = (record.code(), record.message());
            tracing::debug!(
                handle = self.handle,
                code,
                message = ?message,
                "engine reported an error releasing a proof session"
            );
        } else {
            tracing::trace!(handle = self.handle, "proof session released");
        }
    }
}

// }}}

// {{{ ProofBuilder

/// A proof under construction, in state `S`
pub struct ProofBuilder<'o, S> {
    session: Session<'o>,
    _state: PhantomData<S>,
}

impl<'o, S> ProofBuilder<'o, S> {
    /// The engine's handle for this session
    pub fn handle(&self) -> u64 {
        self.session.handle
    }

    fn advance<T>(self) -> ProofBuilder<'o, T> {
        ProofBuilder {
            session: self.session,
            _state: PhantomData,
        }
    }
}

impl<S> fmt::Debug for ProofBuilder<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofBuilder")
            .field("handle", &self.session.handle)
            .field("state", &core::any::type_name::<S>())
            .finish()
    }
}

impl<'o> ProofBuilder<'o, Init> {
    pub fn new(oberon: &'o Oberon) -> Result<Self> {
        Ok(Self {
            session: Session::open(oberon.engine())?,
            _state: PhantomData,
        })
    }

    pub fn set_token(self, token: &Token) -> Result<ProofBuilder<'o, TokenSet>> {
        let token = ByteArray::new(token.as_bytes());
        self.session
            .step(EngineCall::CreateProofSetToken, |engine, handle, err| {
                engine.create_proof_set_token(handle, token, err)
            })?;
        Ok(self.advance())
    }
}

impl<'o> ProofBuilder<'o, TokenSet> {
    /// The identifier the proof is bound to
    pub fn set_id(self, id: impl AsRef<[u8]>) -> Result<ProofBuilder<'o, IdSet>> {
        let id = ByteArray::new(id.as_ref());
        self.session
            .step(EngineCall::CreateProofSetId, |engine, handle, err| {
                engine.create_proof_set_id(handle, id, err)
            })?;
        Ok(self.advance())
    }
}

impl<'o> ProofBuilder<'o, IdSet> {
    pub fn set_nonce(self, nonce: impl AsRef<[u8]>) -> Result<ProofBuilder<'o, NonceSet>> {
        let nonce = ByteArray::new(nonce.as_ref());
        self.session
            .step(EngineCall::CreateProofSetNonce, |engine, handle, err| {
                engine.create_proof_set_nonce(handle, nonce, err)
            })?;
        Ok(self.advance())
    }
}

impl<'o> ProofBuilder<'o, NonceSet> {
    /// Add a blinding factor.
    ///
    /// Order matters: a proof built with factors in a different order than they were added to
    /// the token is still produced, it just does not verify.
    pub fn add_blinding(self, factor: impl AsRef<[u8]>) -> Result<Self> {
        let factor = ByteArray::new(factor.as_ref());
        self.session
            .step(EngineCall::CreateProofAddBlinding, |engine, handle, err| {
                engine.create_proof_add_blinding(handle, factor, err)
            })?;
        Ok(self)
    }

    /// Create the proof; the session is released either way
    pub fn finish(self) -> Result<Proof> {
        let (engine, handle) = (self.session.engine, self.session.handle);
        let bytes = call_output(engine, EngineCall::CreateProofFinish, |out, err| {
            engine.create_proof_finish(handle, out, err)
        })?;
        Ok(Proof::from_engine(bytes))
    }
}

// }}}

impl Oberon {
    /// Open a proof session
    pub fn proof_builder(&self) -> Result<ProofBuilder<'_, Init>> {
        ProofBuilder::new(self)
    }

    /// Build a proof in one go.
    ///
    /// `blindings` are the factors added to `token`, in the order they were added.
    pub fn create_proof<I>(
        &self,
        token: &Token,
        id: impl AsRef<[u8]>,
        blindings: I,
        nonce: impl AsRef<[u8]>,
    ) -> Result<Proof>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut builder = self
            .proof_builder()?
            .set_token(token)?
            .set_id(id)?
            .set_nonce(nonce)?;
        for blinding in blindings {
            builder = builder.add_blinding(blinding)?;
        }
        builder.finish()
    }

    /// `Ok(false)` when the proof does not hold for this key, identifier and nonce; `Err` only
    /// for malformed input
    pub fn verify_proof(
        &self,
        proof: &Proof,
        public_key: &PublicKey,
        id: impl AsRef<[u8]>,
        nonce: impl AsRef<[u8]>,
    ) -> Result<bool> {
        let engine = self.engine();
        let proof = ByteArray::new(proof.as_bytes());
        let pk = ByteArray::new(public_key.as_bytes());
        let id = ByteArray::new(id.as_ref());
        let nonce = ByteArray::new(nonce.as_ref());
        call_verify(engine, EngineCall::VerifyProof, |err| {
            engine.verify_proof(proof, pk, id, nonce, err)
        })
    }
}

impl Proof {
    pub fn verify(
        &self,
        oberon: &Oberon,
        id: impl AsRef<[u8]>,
        public_key: &PublicKey,
        nonce: impl AsRef<[u8]>,
    ) -> Result<bool> {
        oberon.verify_proof(self, public_key, id, nonce)
    }
}
