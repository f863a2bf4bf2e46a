//! An instrumented stand-in for the engine library
//!
//! The "crypto" is hashing and byte arithmetic: keys, tokens and proofs behave like the real
//! engine's (determinism, blinding as an invertible transform, proofs bound to key, id and
//! nonce), which is all the binding can observe. Every allocation, release and proof session
//! is counted, and any proof step can be forced to fail.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use oberon_ffi::engine::Engine;
use oberon_ffi::ffi::{ByteArray, ByteBuffer, ExternError};
use oberon_ffi::Oberon;
use rand::RngCore;
use sha2::{Digest, Sha512};

pub const SECRET_KEY_BYTES: usize = 32;
pub const PUBLIC_KEY_BYTES: usize = 48;
pub const TOKEN_BYTES: usize = 32;
pub const BLINDING_BYTES: usize = 32;
pub const PROOF_BYTES: usize = 64;

/// Proof session steps that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Init,
    SetToken,
    SetId,
    SetNonce,
    AddBlinding,
    Finish,
}

/// Ways the engine can bend its own conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quirk {
    /// Failing `get_public_key` still hands back an output buffer
    OutputOnFailure,
    /// Successful `get_public_key` leaves a message in the error record
    MessageOnSuccess,
    /// `new_token` fails with status 7 and a clean error record
    SilentFailure,
    /// Calls without an error record fail with status 5, after writing their output
    UncheckedFailure,
    /// Every size query reports -1
    NegativeSize,
}

pub const BUILDER_STEPS: [Step; 5] = [
    Step::SetToken,
    Step::SetId,
    Step::SetNonce,
    Step::AddBlinding,
    Step::Finish,
];

#[derive(Default)]
struct Session {
    token: Option<Vec<u8>>,
    id: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    blindings: Vec<Vec<u8>>,
}

#[derive(Default)]
pub struct FakeEngine {
    sessions: Mutex<HashMap<u64, Session>>,
    next_handle: AtomicU64,
    fail_at: Mutex<Option<Step>>,
    quirk: Mutex<Option<Quirk>>,

    pub buffers_allocated: AtomicUsize,
    pub buffers_freed: AtomicUsize,
    pub strings_allocated: AtomicUsize,
    pub strings_freed: AtomicUsize,
    pub inits: AtomicUsize,
    pub frees: AtomicUsize,
    /// Calls other than size queries and releases
    pub operations: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub buffers_allocated: usize,
    pub buffers_freed: usize,
    pub strings_allocated: usize,
    pub strings_freed: usize,
    pub inits: usize,
    pub frees: usize,
    pub operations: usize,
}

impl Counts {
    pub fn balanced(&self) -> bool {
        self.buffers_allocated == self.buffers_freed
            && self.strings_allocated == self.strings_freed
            && self.inits == self.frees
    }
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(1),
            ..Self::default()
        })
    }

    pub fn oberon(self: &Arc<Self>) -> Oberon {
        Oberon::new(self.clone())
    }

    pub fn fail_at(&self, step: Step) {
        *self.fail_at.lock().unwrap() = Some(step);
    }

    pub fn quirk(&self, quirk: Quirk) {
        *self.quirk.lock().unwrap() = Some(quirk);
    }

    fn has_quirk(&self, quirk: Quirk) -> bool {
        *self.quirk.lock().unwrap() == Some(quirk)
    }

    fn size(&self, size: usize) -> i32 {
        if self.has_quirk(Quirk::NegativeSize) {
            -1
        } else {
            size as i32
        }
    }

    fn unchecked_status(&self) -> i32 {
        if self.has_quirk(Quirk::UncheckedFailure) {
            5
        } else {
            0
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            buffers_allocated: self.buffers_allocated.load(Ordering::SeqCst),
            buffers_freed: self.buffers_freed.load(Ordering::SeqCst),
            strings_allocated: self.strings_allocated.load(Ordering::SeqCst),
            strings_freed: self.strings_freed.load(Ordering::SeqCst),
            inits: self.inits.load(Ordering::SeqCst),
            frees: self.frees.load(Ordering::SeqCst),
            operations: self.operations.load(Ordering::SeqCst),
        }
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn operation(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }

    fn should_fail(&self, step: Step) -> bool {
        *self.fail_at.lock().unwrap() == Some(step)
    }

    fn output(&self, out: &mut ByteBuffer, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.buffers_allocated.fetch_add(1, Ordering::SeqCst);
        }
        *out = ByteBuffer::from_vec(bytes);
    }

    fn error(&self, err: &mut ExternError, code: i32, message: &str) -> i32 {
        self.strings_allocated.fetch_add(1, Ordering::SeqCst);
        *err = ExternError::new_error(code, message);
        code
    }
}

// {{{ fake math

fn hash(domain: &[u8], parts: &[&[u8]], len: usize) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize()[..len].to_vec()
}

fn public_key_of(sk: &[u8]) -> Vec<u8> {
    let mut pk = sk.to_vec();
    pk.extend(hash(b"pk", &[sk], PUBLIC_KEY_BYTES - SECRET_KEY_BYTES));
    pk
}

/// The secret key inside a well-formed fake public key
fn secret_of(pk: &[u8]) -> Option<&[u8]> {
    if pk.len() != PUBLIC_KEY_BYTES {
        return None;
    }
    let sk = &pk[..SECRET_KEY_BYTES];
    if public_key_of(sk) == pk {
        Some(sk)
    } else {
        None
    }
}

fn sign(sk: &[u8], id: &[u8]) -> Vec<u8> {
    hash(b"token", &[sk, id], TOKEN_BYTES)
}

fn blinding(data: &[u8]) -> Vec<u8> {
    hash(b"blinding", &[data], BLINDING_BYTES)
}

fn blind(token: &[u8], data: &[u8]) -> Vec<u8> {
    token
        .iter()
        .zip(blinding(data))
        .map(|(t, b)| t.wrapping_sub(b))
        .collect()
}

fn unblind(token: &[u8], data: &[u8]) -> Vec<u8> {
    token
        .iter()
        .zip(blinding(data))
        .map(|(t, b)| t.wrapping_add(b))
        .collect()
}

fn prove(token: &[u8], id: &[u8], nonce: &[u8]) -> Vec<u8> {
    hash(b"proof", &[token, id, nonce], PROOF_BYTES)
}

// }}}

impl Engine for FakeEngine {
    fn secret_key_size(&self) -> i32 {
        self.size(SECRET_KEY_BYTES)
    }

    fn public_key_size(&self) -> i32 {
        self.size(PUBLIC_KEY_BYTES)
    }

    fn token_size(&self) -> i32 {
        self.size(TOKEN_BYTES)
    }

    fn blinding_size(&self) -> i32 {
        self.size(BLINDING_BYTES)
    }

    fn proof_size(&self) -> i32 {
        self.size(PROOF_BYTES)
    }

    fn new_secret_key(&self, secret_key: &mut ByteBuffer) -> i32 {
        self.operation();
        let mut sk = vec![0u8; SECRET_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut sk);
        self.output(secret_key, sk);
        self.unchecked_status()
    }

    fn secret_key_from_seed(&self, seed: ByteArray<'_>, secret_key: &mut ByteBuffer) -> i32 {
        self.operation();
        let sk = hash(b"seed", &[seed.as_slice()], SECRET_KEY_BYTES);
        self.output(secret_key, sk);
        self.unchecked_status()
    }

    fn get_public_key(
        &self,
        secret_key: ByteArray<'_>,
        public_key: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        let sk = secret_key.as_slice();
        if self.has_quirk(Quirk::OutputOnFailure) {
            self.output(public_key, public_key_of(sk));
            return self.error(err, 1, "Invalid secret key");
        }
        if sk.len() != SECRET_KEY_BYTES || sk.iter().all(|b| *b == 0) {
            return self.error(err, 1, "Invalid secret key");
        }
        self.output(public_key, public_key_of(sk));
        if self.has_quirk(Quirk::MessageOnSuccess) {
            self.error(err, 0, "left over");
        }
        0
    }

    fn new_token(
        &self,
        secret_key: ByteArray<'_>,
        id: ByteArray<'_>,
        token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        let sk = secret_key.as_slice();
        if sk.len() != SECRET_KEY_BYTES || sk.iter().all(|b| *b == 0) {
            return self.error(err, 1, "Invalid secret key");
        }
        if id.is_empty() {
            return self.error(err, 2, "Unable to create token");
        }
        if self.has_quirk(Quirk::SilentFailure) {
            return 7;
        }
        self.output(token, sign(sk, id.as_slice()));
        0
    }

    fn verify_token(
        &self,
        token: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        match (token.len() == TOKEN_BYTES, secret_of(public_key.as_slice())) {
            (true, Some(sk)) => {
                if sign(sk, id.as_slice()) == token.as_slice() {
                    0
                } else {
                    1
                }
            }
            _ => self.error(err, 1, "Invalid token and/or public key"),
        }
    }

    fn create_blinding(&self, data: ByteArray<'_>, out: &mut ByteBuffer) -> i32 {
        self.operation();
        self.output(out, blinding(data.as_slice()));
        self.unchecked_status()
    }

    fn add_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if old_token.len() != TOKEN_BYTES {
            return self.error(err, 1, "Invalid token");
        }
        self.output(new_token, blind(old_token.as_slice(), data.as_slice()));
        0
    }

    fn remove_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if old_token.len() != TOKEN_BYTES {
            return self.error(err, 1, "Invalid token");
        }
        self.output(new_token, unblind(old_token.as_slice(), data.as_slice()));
        0
    }

    fn create_proof_init(&self, err: &mut ExternError) -> u64 {
        self.operation();
        if self.should_fail(Step::Init) {
            self.error(err, 99, "injected failure: init");
            return 0;
        }
        self.inits.fetch_add(1, Ordering::SeqCst);
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .insert(handle, Session::default());
        handle
    }

    fn create_proof_set_token(
        &self,
        handle: u64,
        token: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if self.should_fail(Step::SetToken) {
            return self.error(err, 99, "injected failure: set token");
        }
        if token.len() != TOKEN_BYTES {
            return self.error(err, 1, "Invalid token");
        }
        match self.sessions.lock().unwrap().get_mut(&handle) {
            Some(session) => {
                session.token = Some(token.to_vec());
                0
            }
            None => self.error(err, 1, "Invalid handle"),
        }
    }

    fn create_proof_set_id(&self, handle: u64, id: ByteArray<'_>, err: &mut ExternError) -> i32 {
        self.operation();
        if self.should_fail(Step::SetId) {
            return self.error(err, 99, "injected failure: set id");
        }
        match self.sessions.lock().unwrap().get_mut(&handle) {
            Some(session) => {
                session.id = Some(id.to_vec());
                0
            }
            None => self.error(err, 1, "Invalid handle"),
        }
    }

    fn create_proof_set_nonce(
        &self,
        handle: u64,
        nonce: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if self.should_fail(Step::SetNonce) {
            return self.error(err, 99, "injected failure: set nonce");
        }
        match self.sessions.lock().unwrap().get_mut(&handle) {
            Some(session) => {
                session.nonce = Some(nonce.to_vec());
                0
            }
            None => self.error(err, 1, "Invalid handle"),
        }
    }

    fn create_proof_add_blinding(
        &self,
        handle: u64,
        blinding: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if self.should_fail(Step::AddBlinding) {
            return self.error(err, 99, "injected failure: add blinding");
        }
        match self.sessions.lock().unwrap().get_mut(&handle) {
            Some(session) => {
                session.blindings.push(blinding.to_vec());
                0
            }
            None => self.error(err, 1, "Invalid handle"),
        }
    }

    fn create_proof_finish(
        &self,
        handle: u64,
        proof: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        if self.should_fail(Step::Finish) {
            return self.error(err, 4, "Invalid proof parameters");
        }
        let mut sessions = self.sessions.lock().unwrap();
        let bytes = match sessions.get(&handle) {
            None => return self.error(err, 1, "Invalid handle"),
            Some(Session { id: None, .. }) => return self.error(err, 1, "Id must be set"),
            Some(Session { nonce: None, .. }) => return self.error(err, 2, "Nonce must be set"),
            Some(Session { token: None, .. }) => return self.error(err, 3, "Token must be set"),
            Some(Session {
                token: Some(token),
                id: Some(id),
                nonce: Some(nonce),
                blindings,
            }) => {
                let token = blindings
                    .iter()
                    .fold(token.clone(), |token, data| unblind(&token, data));
                prove(&token, id, nonce)
            }
        };
        // a successful finish retires the session
        sessions.remove(&handle);
        self.output(proof, bytes);
        0
    }

    unsafe fn create_proof_free(&self, handle: u64, err: &mut ExternError) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        if self.sessions.lock().unwrap().remove(&handle).is_none() {
            self.error(err, 1, "Invalid handle");
        }
    }

    fn verify_proof(
        &self,
        proof: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        nonce: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        self.operation();
        match (proof.len() == PROOF_BYTES, secret_of(public_key.as_slice())) {
            (true, Some(sk)) => {
                let token = sign(sk, id.as_slice());
                if prove(&token, id.as_slice(), nonce.as_slice()) == proof.as_slice() {
                    0
                } else {
                    1
                }
            }
            _ => self.error(err, 1, "Invalid proof and/or public key"),
        }
    }

    unsafe fn byte_buffer_free(&self, buffer: ByteBuffer) {
        self.buffers_freed.fetch_add(1, Ordering::SeqCst);
        drop(buffer.destroy_into_vec());
    }

    unsafe fn string_free(&self, message: *mut c_char) {
        self.strings_freed.fetch_add(1, Ordering::SeqCst);
        if !message.is_null() {
            drop(CString::from_raw(message));
        }
    }
}
