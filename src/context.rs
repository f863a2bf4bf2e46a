//! The handle every operation goes through

use core::fmt;
use std::sync::Arc;

use crate::engine::{self, Engine};
use crate::entity::{self, Entity, Sizes};
use crate::error::Result;

/// An engine to run operations on
///
/// Cloning is cheap, and clones share the engine. One-shot operations may run concurrently from
/// any number of threads.
#[derive(Clone)]
pub struct Oberon {
    engine: Arc<dyn Engine>,
}

impl Oberon {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Use the process-wide engine, loading the library on first use
    pub fn global() -> Result<Self> {
        Ok(Self::new(engine::global()?))
    }

    pub fn engine(&self) -> &dyn Engine {
        &*self.engine
    }

    pub fn sizes(&self) -> Result<Sizes> {
        Sizes::query(self.engine())
    }

    /// Wrap outside bytes as an entity, failing on a length mismatch before anything else is
    /// asked of the engine
    pub fn decode<E: Entity>(&self, bytes: impl AsRef<[u8]>) -> Result<E> {
        entity::decode(self.engine(), bytes.as_ref())
    }
}

impl fmt::Debug for Oberon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Oberon").finish_non_exhaustive()
    }
}
