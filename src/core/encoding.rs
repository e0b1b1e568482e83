/*!
 * Payload Encoding
 * Hex encoding and single-line sanitization for audit payloads
 */

use crate::core::errors::NetError;
use crate::core::types::NetResult;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as a lowercase hex string.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decode a hex string produced by [`to_hex`].
///
/// Accepts upper- or lowercase digits. Fails on odd length or non-hex input.
pub fn from_hex(text: &str) -> NetResult<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(NetError::invalid_argument("odd-length hex string"));
    }
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = hex_value(pair[0])?;
        let lo = hex_value(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_value(digit: u8) -> NetResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(NetError::invalid_argument(format!(
            "non-hex digit {:#04x}",
            other
        ))),
    }
}

/// Replace newline and carriage-return characters with single spaces so a
/// payload renders on one audit line.
#[must_use]
pub fn flatten_lines(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}
