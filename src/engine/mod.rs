//! # The cryptographic engine
//!
//! The engine does all signature and proof math behind a C ABI. [`Engine`] mirrors that ABI one
//! method per exported function, so the native library and any test double are interchangeable.
//!
//! Ownership rules every implementation follows:
//! - output [`ByteBuffer`]s are allocated by the engine and come back through
//!   [`Engine::byte_buffer_free`], exactly once;
//! - a message written into an [`ExternError`] comes back through [`Engine::string_free`],
//!   exactly once;
//! - a proof handle from [`Engine::create_proof_init`] is given back through
//!   [`Engine::create_proof_free`].
//!
//! The release calls are `unsafe`; only the guards in [`crate::ffi`] and the proof session make
//! them. Safe code holding an engine can not hand it a host buffer:
//!
//! ```compile_fail,E0133
//!     use oberon_ffi::ffi::ByteBuffer;
//!
//!     fn release(oberon: &oberon_ffi::Oberon) {
//!         oberon.engine().byte_buffer_free(ByteBuffer::from_vec(vec![1, 2, 3]));
//!     }
//! ```
//!
//! nor a pointer it never allocated:
//!
//! ```compile_fail,E0133
//!     fn release(oberon: &oberon_ffi::Oberon) {
//!         let mut stack = [b'x', 0];
//!         oberon.engine().string_free(stack.as_mut_ptr() as *mut std::os::raw::c_char);
//!     }
//! ```
//!
//! The process-wide engine is loaded lazily by [`global`] and lives until the process exits.

use std::os::raw::c_char;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::ffi::{ByteArray, ByteBuffer, ExternError};

mod locator;
mod native;

pub use locator::{DefaultLocator, LibraryLocator, Platform};
pub use native::NativeEngine;

/// The engine ABI.
///
/// Status returns are `0` for success. Verification calls return nonzero both for "does not
/// verify" (error code left at `0`) and for malformed input (error code set).
pub trait Engine: Send + Sync {
    fn secret_key_size(&self) -> i32;
    fn public_key_size(&self) -> i32;
    fn token_size(&self) -> i32;
    fn blinding_size(&self) -> i32;
    fn proof_size(&self) -> i32;

    fn new_secret_key(&self, secret_key: &mut ByteBuffer) -> i32;
    fn secret_key_from_seed(&self, seed: ByteArray<'_>, secret_key: &mut ByteBuffer) -> i32;
    fn get_public_key(
        &self,
        secret_key: ByteArray<'_>,
        public_key: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32;

    fn new_token(
        &self,
        secret_key: ByteArray<'_>,
        id: ByteArray<'_>,
        token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32;
    fn verify_token(
        &self,
        token: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32;

    fn create_blinding(&self, data: ByteArray<'_>, blinding: &mut ByteBuffer) -> i32;
    fn add_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32;
    fn remove_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32;

    /// Returns `0` when no session could be created
    fn create_proof_init(&self, err: &mut ExternError) -> u64;
    fn create_proof_set_token(&self, handle: u64, token: ByteArray<'_>, err: &mut ExternError)
        -> i32;
    fn create_proof_set_id(&self, handle: u64, id: ByteArray<'_>, err: &mut ExternError) -> i32;
    fn create_proof_set_nonce(&self, handle: u64, nonce: ByteArray<'_>, err: &mut ExternError)
        -> i32;
    fn create_proof_add_blinding(
        &self,
        handle: u64,
        blinding: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32;
    fn create_proof_finish(&self, handle: u64, proof: &mut ByteBuffer, err: &mut ExternError)
        -> i32;

    /// Give a proof session back to the engine.
    ///
    /// # Safety
    ///
    /// `handle` came from [`Engine::create_proof_init`] on this engine, has not been given back
    /// before, and is not used again afterwards.
    unsafe fn create_proof_free(&self, handle: u64, err: &mut ExternError);

    fn verify_proof(
        &self,
        proof: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        nonce: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32;

    /// # Safety
    ///
    /// `buffer` was written into an output slot by this engine and has not been released yet.
    /// Host-allocated buffers must never come back here.
    unsafe fn byte_buffer_free(&self, buffer: ByteBuffer);

    /// # Safety
    ///
    /// `message` is a pointer this engine placed in an [`ExternError`], not released yet.
    unsafe fn string_free(&self, message: *mut c_char);
}

// {{{ process-wide engine

static GLOBAL: OnceCell<Arc<dyn Engine>> = OnceCell::new();

/// The process-wide engine, loaded on first use from [`LoaderConfig::from_env`].
///
/// Loading happens at most once even under concurrent first calls; a failed load is retried on
/// the next call.
pub fn global() -> Result<Arc<dyn Engine>> {
    global_with(&LoaderConfig::from_env())
}

/// Like [`global`], but the first successful call decides the configuration.
pub fn global_with(config: &LoaderConfig) -> Result<Arc<dyn Engine>> {
    GLOBAL
        .get_or_try_init(|| {
            let locator = DefaultLocator::new(config);
            let engine = NativeEngine::locate(config, &locator)?;
            Ok(Arc::new(engine) as Arc<dyn Engine>)
        })
        .map(Arc::clone)
}

/// Substitute the process-wide engine before anything loaded it.
///
/// Gives the engine back if one is already installed.
pub fn install(engine: Arc<dyn Engine>) -> std::result::Result<(), Arc<dyn Engine>> {
    GLOBAL.set(engine)
}

// }}}
