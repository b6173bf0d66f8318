//! Stream primitives for admin transport messages.
//!
//! Integers are LEB128 vints (at most five bytes for a `u32`); strings are a
//! vint byte length followed by UTF-8.

use crate::{Error, Result};
use bytes::{Buf, BufMut};

const MAX_VINT_BYTES: usize = 5;

pub fn write_vint(out: &mut impl BufMut, mut value: u32) {
    while value & !0x7F != 0 {
        out.put_u8(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

pub fn read_vint(input: &mut impl Buf) -> Result<u32> {
    let mut result: u32 = 0;
    for i in 0..MAX_VINT_BYTES {
        if !input.has_remaining() {
            return Err(Error::Wire("unexpected end of stream reading vint".to_string()));
        }
        let b = input.get_u8();
        if i == MAX_VINT_BYTES - 1 && b & 0xF0 != 0 {
            return Err(Error::Wire(format!("vint overflows u32 (last byte {:#04x})", b)));
        }
        result |= ((b & 0x7F) as u32) << (7 * i);
        if b & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(Error::Wire("vint too long".to_string()))
}

pub fn write_string(out: &mut impl BufMut, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| Error::Wire(format!("string of {} bytes is too long", value.len())))?;
    write_vint(out, len);
    out.put_slice(value.as_bytes());
    Ok(())
}

pub fn read_string(input: &mut impl Buf) -> Result<String> {
    let len = read_vint(input)? as usize;
    if input.remaining() < len {
        return Err(Error::Wire(format!(
            "string needs {} bytes but only {} remain",
            len,
            input.remaining()
        )));
    }
    let mut raw = vec![0u8; len];
    input.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|e| Error::Wire(format!("invalid UTF-8 in string: {}", e)))
}

pub fn write_bool(out: &mut impl BufMut, value: bool) {
    out.put_u8(u8::from(value));
}

pub fn read_bool(input: &mut impl Buf) -> Result<bool> {
    if !input.has_remaining() {
        return Err(Error::Wire("unexpected end of stream reading bool".to_string()));
    }
    match input.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::Wire(format!("invalid bool byte {}", other))),
    }
}
