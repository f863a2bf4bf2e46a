//! Errors raised by the binding
//!
//! Every failure carries a stable numeric code (see [`ErrorKind`]) so callers can branch on the
//! class of error without matching on message text.

use core::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityKind;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
/// Stable error classes
pub enum ErrorKind {
    Success = 0,
    /// Malformed lengths or invalid key/token/proof material
    Input = 1,
    /// The engine failed to sign or to build a proof
    Signing = 2,
    /// The binding itself could not do its job (library not loadable, bad config)
    Wrapper = 99,
}

impl ErrorKind {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Every call into the engine that can fail
pub enum EngineCall {
    NewSecretKey,
    SecretKeyFromSeed,
    GetPublicKey,
    NewToken,
    VerifyToken,
    CreateBlinding,
    AddBlinding,
    RemoveBlinding,
    CreateProofInit,
    CreateProofSetToken,
    CreateProofSetId,
    CreateProofSetNonce,
    CreateProofAddBlinding,
    CreateProofFinish,
    CreateProofFree,
    VerifyProof,
}

impl EngineCall {
    /// The exported symbol behind this call
    pub fn symbol(self) -> &'static str {
        match self {
            EngineCall::NewSecretKey => "oberon_new_secret_key",
            EngineCall::SecretKeyFromSeed => "oberon_secret_key_from_seed",
            EngineCall::GetPublicKey => "oberon_get_public_key",
            EngineCall::NewToken => "oberon_new_token",
            EngineCall::VerifyToken => "oberon_verify_token",
            EngineCall::CreateBlinding => "oberon_create_blinding",
            EngineCall::AddBlinding => "oberon_add_blinding",
            EngineCall::RemoveBlinding => "oberon_remove_blinding",
            EngineCall::CreateProofInit => "oberon_create_proof_init",
            EngineCall::CreateProofSetToken => "oberon_create_proof_set_token",
            EngineCall::CreateProofSetId => "oberon_create_proof_set_id",
            EngineCall::CreateProofSetNonce => "oberon_create_proof_set_nonce",
            EngineCall::CreateProofAddBlinding => "oberon_create_proof_add_blinding",
            EngineCall::CreateProofFinish => "oberon_create_proof_finish",
            EngineCall::CreateProofFree => "oberon_create_proof_free",
            EngineCall::VerifyProof => "oberon_verify_proof",
        }
    }

    /// Decide whether an engine error code from this call means bad input or a failed
    /// signing/proving step.
    pub fn classify(self, code: i32) -> ErrorKind {
        match (self, code) {
            // "Unable to create token"
            (EngineCall::NewToken, 2) => ErrorKind::Signing,
            // "Invalid proof parameters"
            (EngineCall::CreateProofFinish, 4) => ErrorKind::Signing,
            // these never report bad input, a nonzero status is an engine fault
            (EngineCall::NewSecretKey, _)
            | (EngineCall::SecretKeyFromSeed, _)
            | (EngineCall::CreateBlinding, _)
            | (EngineCall::CreateProofInit, _) => ErrorKind::Signing,
            _ => ErrorKind::Input,
        }
    }
}

impl fmt::Display for EngineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Failures to find or bind the engine library
#[derive(Debug, Error)]
pub enum LinkageError {
    #[error("library `{name}` not found, tried: {tried:?}")]
    NotFound { name: String, tried: Vec<PathBuf> },

    #[error("failed to load `{}`: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol `{symbol}` missing from engine library: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bytes handed to an entity constructor have the wrong length
    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: EntityKind,
        expected: usize,
        actual: usize,
    },

    /// The engine reported a size no buffer can have
    #[error("engine reported a negative {kind} size: {size}")]
    EngineSize { kind: EntityKind, size: i32 },

    /// The engine rejected malformed input
    #[error("{call} rejected input (code {code}): {message}")]
    Input {
        call: EngineCall,
        code: i32,
        message: String,
    },

    /// The engine failed while signing or proving
    #[error("{call} failed (code {code}): {message}")]
    Crypto {
        call: EngineCall,
        code: i32,
        message: String,
    },

    #[error("engine library unavailable: {0}")]
    Linkage(#[from] LinkageError),

    #[error("invalid loader configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Build the error for a failed engine call from its error record
    pub(crate) fn from_engine(call: EngineCall, code: i32, message: String) -> Self {
        match call.classify(code) {
            ErrorKind::Signing => Error::Crypto {
                call,
                code,
                message,
            },
            _ => Error::Input {
                call,
                code,
                message,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidLength { .. } | Error::Input { .. } => ErrorKind::Input,
            Error::Crypto { .. } => ErrorKind::Signing,
            Error::EngineSize { .. } | Error::Linkage(_) | Error::Config(_) => ErrorKind::Wrapper,
        }
    }

    /// The engine's own code when the engine reported the error, otherwise the class code
    pub fn code(&self) -> i32 {
        match self {
            Error::Input { code, .. } | Error::Crypto { code, .. } => *code,
            other => other.kind().code(),
        }
    }

    /// The engine's original message, or our own description for host-side failures
    pub fn message(&self) -> String {
        match self {
            Error::Input { message, .. } | Error::Crypto { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_signing_failures() {
        assert_eq!(EngineCall::NewToken.classify(2), ErrorKind::Signing);
        assert_eq!(EngineCall::NewToken.classify(1), ErrorKind::Input);
        assert_eq!(
            EngineCall::CreateProofFinish.classify(4),
            ErrorKind::Signing
        );
        assert_eq!(EngineCall::CreateProofFinish.classify(1), ErrorKind::Input);
        assert_eq!(EngineCall::VerifyProof.classify(1), ErrorKind::Input);
    }

    #[test]
    fn engine_code_is_kept() {
        let err = Error::from_engine(EngineCall::NewToken, 2, "Unable to create token".into());
        assert_eq!(err.kind(), ErrorKind::Signing);
        assert_eq!(err.code(), 2);
        assert_eq!(err.message(), "Unable to create token");
        assert!(err.to_string().contains("oberon_new_token"));
    }

    #[test]
    fn invalid_length_is_input() {
        let err = Error::InvalidLength {
            kind: EntityKind::PublicKey,
            expected: 96,
            actual: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.code(), 1);
        assert_eq!(
            err.to_string(),
            "invalid public key length: expected 96 bytes, got 3"
        );
    }

    #[test]
    fn negative_size_is_wrapper() {
        let err = Error::EngineSize {
            kind: EntityKind::Proof,
            size: -1,
        };
        assert_eq!(err.kind(), ErrorKind::Wrapper);
        assert_eq!(err.code(), 99);
        assert_eq!(err.to_string(), "engine reported a negative proof size: -1");
    }
}
