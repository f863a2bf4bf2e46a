//! # The engine boundary
//!
//! Types shared with the C ABI and the helpers every operation routes its calls through.
//! A helper owns the error record and the output slot of one call, so whatever the engine
//! allocated is released on every path out of it.

mod buffer;
mod error;

pub use buffer::{ByteArray, ByteBuffer, EngineBuffer};
pub use error::ExternError;

pub(crate) use error::ErrorSlot;

use crate::engine::Engine;
use crate::error::{EngineCall, Error, Result};

/// Call that writes an output buffer and reports failure through an error record.
pub(crate) fn call_output<F>(engine: &dyn Engine, call: EngineCall, f: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut ByteBuffer, &mut ExternError) -> i32,
{
    let mut slot = ErrorSlot::new(engine, call);
    let mut out = ByteBuffer::default();
    let status = f(&mut out, slot.record());
    // the slot only ever holds null or what the engine just allocated
    let out = unsafe { EngineBuffer::adopt(engine, out) };
    slot.check(status)?;
    Ok(out.into_vec())
}

/// Call that only reports a status and an error record.
pub(crate) fn call_status<F>(engine: &dyn Engine, call: EngineCall, f: F) -> Result<()>
where
    F: FnOnce(&mut ExternError) -> i32,
{
    let mut slot = ErrorSlot::new(engine, call);
    let status = f(slot.record());
    slot.check(status)
}

/// Verification call: `Ok(false)` when the check fails, `Err` only for malformed input.
pub(crate) fn call_verify<F>(engine: &dyn Engine, call: EngineCall, f: F) -> Result<bool>
where
    F: FnOnce(&mut ExternError) -> i32,
{
    let mut slot = ErrorSlot::new(engine, call);
    let status = f(slot.record());
    slot.verdict(status)
}

/// Call that writes an output buffer but has no error record.
pub(crate) fn call_output_unchecked<F>(
    engine: &dyn Engine,
    call: EngineCall,
    f: F,
) -> Result<Vec<u8>>
where
    F: FnOnce(&mut ByteBuffer) -> i32,
{
    let mut out = ByteBuffer::default();
    let status = f(&mut out);
    let out = unsafe { EngineBuffer::adopt(engine, out) };
    if status != 0 {
        tracing::debug!(%call, status, "engine call failed");
        return Err(Error::from_engine(
            call,
            status,
            format!("engine returned status {}", status),
        ));
    }
    tracing::trace!(%call, "engine call succeeded");
    Ok(out.into_vec())
}
