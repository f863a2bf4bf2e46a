//! The engine as a dynamically loaded library

use std::os::raw::c_char;
use std::path::{Path, PathBuf};

use libloading::Library;

use super::{Engine, LibraryLocator};
use crate::config::LoaderConfig;
use crate::error::LinkageError;
use crate::ffi::{ByteArray, ByteBuffer, ExternError};

type SizeFn = unsafe extern "C" fn() -> i32;
type NewKeyFn = unsafe extern "C" fn(*mut ByteBuffer) -> i32;
type DeriveFn = for<'a> unsafe extern "C" fn(ByteArray<'a>, *mut ByteBuffer) -> i32;
type TransformFn =
    for<'a> unsafe extern "C" fn(ByteArray<'a>, *mut ByteBuffer, *mut ExternError) -> i32;
type BinaryFn = for<'a, 'b> unsafe extern "C" fn(
    ByteArray<'a>,
    ByteArray<'b>,
    *mut ByteBuffer,
    *mut ExternError,
) -> i32;
type VerifyTokenFn = for<'a, 'b, 'c> unsafe extern "C" fn(
    ByteArray<'a>,
    ByteArray<'b>,
    ByteArray<'c>,
    *mut ExternError,
) -> i32;
type InitFn = unsafe extern "C" fn(*mut ExternError) -> u64;
type SetFn = for<'a> unsafe extern "C" fn(u64, ByteArray<'a>, *mut ExternError) -> i32;
type FinishFn = unsafe extern "C" fn(u64, *mut ByteBuffer, *mut ExternError) -> i32;
type FreeHandleFn = unsafe extern "C" fn(u64, *mut ExternError);
type VerifyProofFn = for<'a, 'b, 'c, 'd> unsafe extern "C" fn(
    ByteArray<'a>,
    ByteArray<'b>,
    ByteArray<'c>,
    ByteArray<'d>,
    *mut ExternError,
) -> i32;
type BufferFreeFn = unsafe extern "C" fn(ByteBuffer);
type StringFreeFn = unsafe extern "C" fn(*mut c_char);

macro_rules! symbol {
    ($library:expr, $name:literal, $type:ty) => {{
        let symbol = $library
            .get::<$type>(concat!($name, "\0").as_bytes())
            .map_err(|source| LinkageError::MissingSymbol {
                symbol: $name,
                source,
            })?;
        *symbol
    }};
}

/// Every `oberon_*` entry point, resolved once when the library is opened
pub struct NativeEngine {
    path: PathBuf,

    secret_key_size: SizeFn,
    public_key_size: SizeFn,
    token_size: SizeFn,
    blinding_size: SizeFn,
    proof_size: SizeFn,

    new_secret_key: NewKeyFn,
    secret_key_from_seed: DeriveFn,
    get_public_key: TransformFn,
    new_token: BinaryFn,
    verify_token: VerifyTokenFn,
    create_blinding: DeriveFn,
    add_blinding: BinaryFn,
    remove_blinding: BinaryFn,

    create_proof_init: InitFn,
    create_proof_set_token: SetFn,
    create_proof_set_id: SetFn,
    create_proof_set_nonce: SetFn,
    create_proof_add_blinding: SetFn,
    create_proof_finish: FinishFn,
    create_proof_free: FreeHandleFn,
    verify_proof: VerifyProofFn,

    byte_buffer_free: BufferFreeFn,
    string_free: StringFreeFn,

    // the function pointers above are only valid while this is loaded
    _library: Library,
}

impl NativeEngine {
    /// Open the library at `path` and resolve every entry point.
    ///
    /// # Safety
    ///
    /// Loading runs the library's initialisers, and the library must export the oberon ABI with
    /// the exact signatures declared here.
    pub unsafe fn open(path: impl AsRef<Path>) -> Result<Self, LinkageError> {
        let path = path.as_ref().to_path_buf();
        let library = Library::new(&path).map_err(|source| LinkageError::Load {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            secret_key_size: symbol!(library, "oberon_secret_key_size", SizeFn),
            public_key_size: symbol!(library, "oberon_public_key_size", SizeFn),
            token_size: symbol!(library, "oberon_token_size", SizeFn),
            blinding_size: symbol!(library, "oberon_blinding_size", SizeFn),
            proof_size: symbol!(library, "oberon_proof_size", SizeFn),

            new_secret_key: symbol!(library, "oberon_new_secret_key", NewKeyFn),
            secret_key_from_seed: symbol!(library, "oberon_secret_key_from_seed", DeriveFn),
            get_public_key: symbol!(library, "oberon_get_public_key", TransformFn),
            new_token: symbol!(library, "oberon_new_token", BinaryFn),
            verify_token: symbol!(library, "oberon_verify_token", VerifyTokenFn),
            create_blinding: symbol!(library, "oberon_create_blinding", DeriveFn),
            add_blinding: symbol!(library, "oberon_add_blinding", BinaryFn),
            remove_blinding: symbol!(library, "oberon_remove_blinding", BinaryFn),

            create_proof_init: symbol!(library, "oberon_create_proof_init", InitFn),
            create_proof_set_token: symbol!(library, "oberon_create_proof_set_token", SetFn),
            create_proof_set_id: symbol!(library, "oberon_create_proof_set_id", SetFn),
            create_proof_set_nonce: symbol!(library, "oberon_create_proof_set_nonce", SetFn),
            create_proof_add_blinding: symbol!(
                library,
                "oberon_create_proof_add_blinding",
                SetFn
            ),
            create_proof_finish: symbol!(library, "oberon_create_proof_finish", FinishFn),
            create_proof_free: symbol!(library, "oberon_create_proof_free", FreeHandleFn),
            verify_proof: symbol!(library, "oberon_verify_proof", VerifyProofFn),

            byte_buffer_free: symbol!(library, "oberon_byte_buffer_free", BufferFreeFn),
            string_free: symbol!(library, "oberon_string_free", StringFreeFn),

            path,
            _library: library,
        })
    }

    /// Try every candidate the locator produces, in order, and keep the first that loads.
    pub fn locate(
        config: &LoaderConfig,
        locator: &dyn LibraryLocator,
    ) -> Result<Self, LinkageError> {
        let mut tried = Vec::new();

        for candidate in locator.candidates(&config.library_name) {
            if candidate.is_absolute() && !candidate.exists() {
                tracing::trace!(path = %candidate.display(), "no engine library here");
                tried.push(candidate);
                continue;
            }

            // Candidates only name the configured engine library
            match unsafe { Self::open(&candidate) } {
                Ok(engine) => {
                    tracing::info!(path = %candidate.display(), "loaded engine library");
                    return Ok(engine);
                }
                Err(LinkageError::Load { source, .. }) => {
                    tracing::debug!(
                        path = %candidate.display(),
                        error = %source,
                        "failed to load engine library"
                    );
                    tried.push(candidate);
                }
                // the library is there but it is not the engine we expect
                Err(err) => return Err(err),
            }
        }

        Err(LinkageError::NotFound {
            name: config.library_name.clone(),
            tried,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for NativeEngine {
    fn secret_key_size(&self) -> i32 {
        unsafe { (self.secret_key_size)() }
    }

    fn public_key_size(&self) -> i32 {
        unsafe { (self.public_key_size)() }
    }

    fn token_size(&self) -> i32 {
        unsafe { (self.token_size)() }
    }

    fn blinding_size(&self) -> i32 {
        unsafe { (self.blinding_size)() }
    }

    fn proof_size(&self) -> i32 {
        unsafe { (self.proof_size)() }
    }

    fn new_secret_key(&self, secret_key: &mut ByteBuffer) -> i32 {
        unsafe { (self.new_secret_key)(secret_key) }
    }

    fn secret_key_from_seed(&self, seed: ByteArray<'_>, secret_key: &mut ByteBuffer) -> i32 {
        unsafe { (self.secret_key_from_seed)(seed, secret_key) }
    }

    fn get_public_key(
        &self,
        secret_key: ByteArray<'_>,
        public_key: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.get_public_key)(secret_key, public_key, err) }
    }

    fn new_token(
        &self,
        secret_key: ByteArray<'_>,
        id: ByteArray<'_>,
        token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.new_token)(secret_key, id, token, err) }
    }

    fn verify_token(
        &self,
        token: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.verify_token)(token, public_key, id, err) }
    }

    fn create_blinding(&self, data: ByteArray<'_>, blinding: &mut ByteBuffer) -> i32 {
        unsafe { (self.create_blinding)(data, blinding) }
    }

    fn add_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.add_blinding)(old_token, data, new_token, err) }
    }

    fn remove_blinding(
        &self,
        old_token: ByteArray<'_>,
        data: ByteArray<'_>,
        new_token: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.remove_blinding)(old_token, data, new_token, err) }
    }

    fn create_proof_init(&self, err: &mut ExternError) -> u64 {
        unsafe { (self.create_proof_init)(err) }
    }

    fn create_proof_set_token(
        &self,
        handle: u64,
        token: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.create_proof_set_token)(handle, token, err) }
    }

    fn create_proof_set_id(&self, handle: u64, id: ByteArray<'_>, err: &mut ExternError) -> i32 {
        unsafe { (self.create_proof_set_id)(handle, id, err) }
    }

    fn create_proof_set_nonce(
        &self,
        handle: u64,
        nonce: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.create_proof_set_nonce)(handle, nonce, err) }
    }

    fn create_proof_add_blinding(
        &self,
        handle: u64,
        blinding: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.create_proof_add_blinding)(handle, blinding, err) }
    }

    fn create_proof_finish(
        &self,
        handle: u64,
        proof: &mut ByteBuffer,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.create_proof_finish)(handle, proof, err) }
    }

    unsafe fn create_proof_free(&self, handle: u64, err: &mut ExternError) {
        (self.create_proof_free)(handle, err)
    }

    fn verify_proof(
        &self,
        proof: ByteArray<'_>,
        public_key: ByteArray<'_>,
        id: ByteArray<'_>,
        nonce: ByteArray<'_>,
        err: &mut ExternError,
    ) -> i32 {
        unsafe { (self.verify_proof)(proof, public_key, id, nonce, err) }
    }

    unsafe fn byte_buffer_free(&self, buffer: ByteBuffer) {
        (self.byte_buffer_free)(buffer)
    }

    unsafe fn string_free(&self, message: *mut c_char) {
        (self.string_free)(message)
    }
}
