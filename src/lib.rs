//! # Oberon tokens through a foreign engine
//!
//! Issue anonymous tokens for an identifier, prove possession of a token without revealing it,
//! and verify such proofs against a public key. All of the math happens in the oberon engine
//! library; this crate carries bytes across its C ABI and makes sure everything the engine
//! allocates is given back.
//!
//! ```no_run
//!     use oberon_ffi::{random_nonce, Oberon};
//!
//!     // Loads the engine library on first use
//!     let oberon = Oberon::global().unwrap();
//!
//!     // Secret key, only for the issuer
//!     let sk = oberon.new_secret_key().unwrap();
//!     // Public key, for verifiers
//!     let pk = sk.public_key(&oberon).unwrap();
//!
//!     let id = b"ed25519";
//!     let token = sk.new_token(&oberon, id).unwrap();
//!     assert!(token.verify(&oberon, id, &pk).unwrap());
//!
//!     // The verifier picks the nonce, so a proof can not be replayed
//!     let nonce = random_nonce();
//!     let proof = token.create_proof(&oberon, id, Vec::<&[u8]>::new(), &nonce).unwrap();
//!     assert!(proof.verify(&oberon, id, &pk, &nonce).unwrap());
//! ```
//!
//! ## Engines
//!
//! [`Oberon::global`] loads the library found by [`engine::DefaultLocator`], configured from
//! the environment (see [`config::LoaderConfig`]). Anything implementing [`engine::Engine`] can
//! be used instead with [`Oberon::new`].

#[macro_use]
mod entity;

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod keys;
pub mod proof;
pub mod tokens;
pub(crate) mod util;

pub use context::Oberon;
pub use entity::{Entity, EntityKind, EntitySeed, Sizes};
pub use error::{EngineCall, Error, ErrorKind, LinkageError, Result};
pub use keys::{PublicKey, SecretKey};
pub use proof::{IdSet, Init, NonceSet, Proof, ProofBuilder, TokenSet};
pub use tokens::{Blinding, Token};
pub use util::random_nonce;
