//! Fixed-size byte wrappers
//!
//! The engine is versioned separately from this crate, so entity sizes are asked from the engine
//! every time bytes from outside are wrapped. Bytes the engine produced are trusted as they are.

use core::fmt;
use core::marker::PhantomData;
use std::convert::TryFrom;

use serde::de::{self, Deserialize, DeserializeSeed, Deserializer};

use crate::context::Oberon;
use crate::engine::Engine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    SecretKey,
    PublicKey,
    Token,
    Blinding,
    Proof,
}

impl EntityKind {
    /// The size the engine currently reports for this kind
    pub fn expected_len(self, engine: &dyn Engine) -> Result<usize> {
        let size = match self {
            EntityKind::SecretKey => engine.secret_key_size(),
            EntityKind::PublicKey => engine.public_key_size(),
            EntityKind::Token => engine.token_size(),
            EntityKind::Blinding => engine.blinding_size(),
            EntityKind::Proof => engine.proof_size(),
        };
        usize::try_from(size).map_err(|_| Error::EngineSize { kind: self, size })
    }

    pub(crate) fn validate(self, engine: &dyn Engine, bytes: &[u8]) -> Result<()> {
        let expected = self.expected_len(engine)?;
        if bytes.len() != expected {
            return Err(Error::InvalidLength {
                kind: self,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::SecretKey => "secret key",
            EntityKind::PublicKey => "public key",
            EntityKind::Token => "token",
            EntityKind::Blinding => "blinding",
            EntityKind::Proof => "proof",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Every entity size, as reported by the engine at the time of the query
pub struct Sizes {
    pub secret_key: usize,
    pub public_key: usize,
    pub token: usize,
    pub blinding: usize,
    pub proof: usize,
}

impl Sizes {
    pub fn query(engine: &dyn Engine) -> Result<Self> {
        Ok(Self {
            secret_key: EntityKind::SecretKey.expected_len(engine)?,
            public_key: EntityKind::PublicKey.expected_len(engine)?,
            token: EntityKind::Token.expected_len(engine)?,
            blinding: EntityKind::Blinding.expected_len(engine)?,
            proof: EntityKind::Proof.expected_len(engine)?,
        })
    }
}

pub(crate) mod private {
    pub trait Sealed {
        fn wrap(bytes: Box<[u8]>) -> Self;
    }
}

/// A fixed-size artifact produced by the engine
pub trait Entity: private::Sealed + Sized {
    const KIND: EntityKind;

    fn as_bytes(&self) -> &[u8];
}

pub(crate) fn decode<E: Entity>(engine: &dyn Engine, bytes: &[u8]) -> Result<E> {
    E::KIND.validate(engine, bytes)?;
    Ok(E::wrap(Box::from(bytes)))
}

macro_rules! entity {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            bytes: Box<[u8]>,
        }

        impl $name {
            /// Wrap bytes from outside the engine (storage, network), checking the length
            pub fn from_bytes(
                oberon: &$crate::context::Oberon,
                bytes: impl AsRef<[u8]>,
            ) -> $crate::error::Result<Self> {
                oberon.decode(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            pub fn to_vec(&self) -> Vec<u8> {
                self.bytes.to_vec()
            }

            pub(crate) fn from_engine(bytes: Vec<u8>) -> Self {
                Self {
                    bytes: bytes.into_boxed_slice(),
                }
            }
        }

        impl $crate::entity::private::Sealed for $name {
            fn wrap(bytes: Box<[u8]>) -> Self {
                Self { bytes }
            }
        }

        impl $crate::entity::Entity for $name {
            const KIND: $crate::entity::EntityKind = $crate::entity::EntityKind::$kind;

            fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.bytes
            }
        }

        impl subtle::ConstantTimeEq for $name {
            fn ct_eq(&self, other: &Self) -> subtle::Choice {
                subtle::ConstantTimeEq::ct_eq(&self.bytes[..], &other.bytes[..])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                bool::from(subtle::ConstantTimeEq::ct_eq(self, other))
            }
        }

        impl Eq for $name {}

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&self.bytes)
            }
        }
    };
}

/// Deserialize an entity, checking its length against the engine
///
/// ```
///     # fn run(oberon: &oberon_ffi::Oberon, json: &str) -> serde_json::Result<oberon_ffi::PublicKey> {
///     use serde::de::DeserializeSeed;
///     use oberon_ffi::{EntitySeed, PublicKey};
///
///     let mut deserializer = serde_json::Deserializer::from_str(json);
///     EntitySeed::<PublicKey>::new(oberon).deserialize(&mut deserializer)
///     # }
/// ```
pub struct EntitySeed<'o, E> {
    oberon: &'o Oberon,
    _entity: PhantomData<E>,
}

impl<'o, E> EntitySeed<'o, E> {
    pub fn new(oberon: &'o Oberon) -> Self {
        Self {
            oberon,
            _entity: PhantomData,
        }
    }
}

impl<'de, E: Entity> DeserializeSeed<'de> for EntitySeed<'_, E> {
    type Value = E;

    fn deserialize<D>(self, deserializer: D) -> core::result::Result<E, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        self.oberon.decode(bytes).map_err(de::Error::custom)
    }
}
