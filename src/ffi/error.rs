//! The out-of-band error record
//!
//! Fallible engine calls take a pointer to an [`ExternError`]. The status returned by the call
//! is checked first; only a failing status means the record holds something worth reading.
//! Whatever message the engine left behind is returned through `string_free` exactly once, when
//! the [`ErrorSlot`] that owns the record is dropped.

use core::{fmt, mem, ptr};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::engine::Engine;
use crate::error::{EngineCall, Error, ErrorKind};

// {{{ ExternError

/// `{ int32_t code; char *message; }`
#[repr(C)]
pub struct ExternError {
    code: i32,
    message: *mut c_char,
}

impl Default for ExternError {
    fn default() -> Self {
        Self {
            code: 0,
            message: ptr::null_mut(),
        }
    }
}

impl fmt::Debug for ExternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternError")
            .field("code", &self.code)
            .field("message", &self.message)
            .finish()
    }
}

impl ExternError {
    /// Populate a record, engine side.
    ///
    /// The message is allocated as a `CString`; interior nul bytes are dropped. Engines written
    /// in Rust release it in `string_free` with `CString::from_raw`.
    pub fn new_error(code: i32, message: impl Into<String>) -> Self {
        let mut message = message.into();
        message.retain(|c| c != '\0');
        let message = CString::new(message)
            .map(CString::into_raw)
            .unwrap_or_else(|_| ptr::null_mut());
        Self { code, message }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn has_message(&self) -> bool {
        !self.message.is_null()
    }

    pub fn is_populated(&self) -> bool {
        self.code != 0 || self.has_message()
    }

    /// Read the message without taking it. `None` when the record carries no message.
    pub fn message(&self) -> Option<String> {
        if self.message.is_null() {
            return None;
        }
        // non-null messages are nul terminated strings owned by the engine
        let text = unsafe { CStr::from_ptr(self.message) };
        Some(text.to_string_lossy().into_owned())
    }

    fn take_message(&mut self) -> *mut c_char {
        mem::replace(&mut self.message, ptr::null_mut())
    }
}

// }}}

// {{{ ErrorSlot

/// A clean error record for exactly one engine call
pub(crate) struct ErrorSlot<'e> {
    record: ExternError,
    engine: &'e dyn Engine,
    call: EngineCall,
}

impl<'e> ErrorSlot<'e> {
    pub(crate) fn new(engine: &'e dyn Engine, call: EngineCall) -> Self {
        Self {
            record: ExternError::default(),
            engine,
            call,
        }
    }

    pub(crate) fn record(&mut self) -> &mut ExternError {
        &mut self.record
    }

    /// Turn a plain status into a result.
    pub(crate) fn check(self, status: i32) -> Result<(), Error> {
        if status == 0 {
            if self.record.has_message() {
                tracing::warn!(
                    call = %self.call,
                    code = self.record.code,
                    "engine left a message on a successful call"
                );
            }
            tracing::trace!(call = %self.call, "engine call succeeded");
            return Ok(());
        }
        Err(self.into_error(status))
    }

    /// Turn a verification status into a result.
    ///
    /// Zero verifies. A failing status with a clean record code is a proof or token that did
    /// not verify; with a populated code the input was malformed.
    pub(crate) fn verdict(self, status: i32) -> Result<bool, Error> {
        if status == 0 {
            tracing::trace!(call = %self.call, "verified");
            return Ok(true);
        }
        if self.record.code != 0 {
            return Err(self.into_error(status));
        }
        tracing::trace!(call = %self.call, status, "did not verify");
        Ok(false)
    }

    /// The call reported failure without a status, e.g. by returning a null handle.
    pub(crate) fn fail(self) -> Error {
        let code = match self.record.code {
            0 => ErrorKind::Signing.code(),
            code => code,
        };
        let message = self
            .record
            .message()
            .unwrap_or_else(|| String::from("engine returned nothing"));
        tracing::debug!(call = %self.call, code, %message, "engine call failed");
        Error::from_engine(self.call, code, message)
    }

    fn into_error(self, status: i32) -> Error {
        let code = match self.record.code {
            0 => status,
            code => code,
        };
        let message = self
            .record
            .message()
            .unwrap_or_else(|| format!("engine returned status {}", status));
        tracing::debug!(call = %self.call, code, %message, "engine call failed");
        Error::from_engine(self.call, code, message)
    }
}

impl Drop for ErrorSlot<'_> {
    fn drop(&mut self) {
        let message = self.record.take_message();
        if !message.is_null() {
            // only the engine writes into the slot's record
            unsafe { self.engine.string_free(message) };
        }
    }
}

// }}}
