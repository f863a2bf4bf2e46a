//! Byte buffers crossing the engine boundary
//!
//! There are two kinds of buffer. A [`ByteArray`] is a zero-copy view of host memory handed
//! to the engine for the duration of one call. A [`ByteBuffer`] is memory the engine allocated
//! and handed back; it stays engine-owned until it is returned through `byte_buffer_free`,
//! which [`EngineBuffer`] does exactly once when dropped.

use core::marker::PhantomData;
use core::{fmt, mem, ptr, slice};

use crate::engine::Engine;

// {{{ ByteBuffer

/// Engine-allocated output buffer, `{ int64_t len; uint8_t *data; }`
#[repr(C)]
pub struct ByteBuffer {
    len: i64,
    data: *mut u8,
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self {
            len: 0,
            data: ptr::null_mut(),
        }
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len)
            .field("data", &self.data)
            .finish()
    }
}

impl ByteBuffer {
    /// Hand a vector over the boundary.
    ///
    /// This is the allocation side used by engines written in Rust (test doubles included);
    /// the matching release is [`ByteBuffer::destroy_into_vec`]. An empty vector becomes the
    /// null buffer.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len() as i64;
        let data = Box::into_raw(boxed) as *mut u8;
        Self { len, data }
    }

    /// Take back a buffer created by [`ByteBuffer::from_vec`].
    ///
    /// # Safety
    ///
    /// The buffer must come from `from_vec` and must not have been destroyed before.
    pub unsafe fn destroy_into_vec(self) -> Vec<u8> {
        if self.data.is_null() || self.len <= 0 {
            return Vec::new();
        }
        let raw = ptr::slice_from_raw_parts_mut(self.data, self.len as usize);
        Box::from_raw(raw).into_vec()
    }

    pub fn len(&self) -> usize {
        if self.data.is_null() || self.len <= 0 {
            0
        } else {
            self.len as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// View the referenced region. A null or zero-length buffer is the empty slice.
    ///
    /// # Safety
    ///
    /// `data` must point at `len` readable bytes for as long as the returned slice lives.
    pub unsafe fn as_slice(&self) -> &[u8] {
        match self.len() {
            0 => &[],
            len => slice::from_raw_parts(self.data, len),
        }
    }
}

// }}}

// {{{ ByteArray

/// Borrowed host bytes, `{ uintptr_t length; const uint8_t *data; }`
///
/// The view cannot outlive the slice it was made from. An empty or absent input is the null
/// view, so the engine never sees a dangling pointer with length zero.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ByteArray<'a> {
    length: usize,
    data: *const u8,
    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> ByteArray<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        if bytes.is_empty() {
            return Self::null();
        }
        Self {
            length: bytes.len(),
            data: bytes.as_ptr(),
            _bytes: PhantomData,
        }
    }

    pub const fn null() -> Self {
        Self {
            length: 0,
            data: ptr::null(),
            _bytes: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        if self.data.is_null() {
            &[]
        } else {
            // Only `new` sets a non-null pointer, from a slice borrowed for 'a
            unsafe { slice::from_raw_parts(self.data, self.length) }
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Default for ByteArray<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ByteArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteArray")
            .field("length", &self.length)
            .field("data", &self.data)
            .finish()
    }
}

impl<'a> From<&'a [u8]> for ByteArray<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteArray<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Self::new(&bytes[..])
    }
}

impl<'a> From<&'a Vec<u8>> for ByteArray<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::new(bytes.as_slice())
    }
}

impl<'a> From<&'a str> for ByteArray<'a> {
    fn from(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<'a> From<Option<&'a [u8]>> for ByteArray<'a> {
    fn from(bytes: Option<&'a [u8]>) -> Self {
        bytes.map(Self::new).unwrap_or_default()
    }
}

impl<'a, 'e> From<&'a EngineBuffer<'e>> for ByteArray<'a> {
    fn from(buffer: &'a EngineBuffer<'e>) -> Self {
        Self::new(buffer.as_slice())
    }
}

// }}}

// {{{ EngineBuffer

/// An engine-allocated buffer that is released when dropped
pub struct EngineBuffer<'e> {
    raw: ByteBuffer,
    engine: &'e dyn Engine,
}

impl<'e> EngineBuffer<'e> {
    /// Take ownership of a buffer the engine wrote into an output slot.
    ///
    /// # Safety
    ///
    /// `raw` must be null or allocated by `engine` and not released yet.
    pub(crate) unsafe fn adopt(engine: &'e dyn Engine, raw: ByteBuffer) -> Self {
        Self { raw, engine }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        // `adopt` guarantees the region stays engine-owned until we release it in drop
        unsafe { self.raw.as_slice() }
    }

    /// Copy the bytes out; the engine memory is released right after.
    pub fn into_vec(self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Drop for EngineBuffer<'_> {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        let raw = mem::take(&mut self.raw);
        // adopted from this engine, and taken out so it is released only here
        unsafe { self.engine.byte_buffer_free(raw) };
    }
}

// }}}
