use crate::error::ChatError;

/// Decode a hex string into bytes, two characters per byte.
///
/// Accepts upper and lower case digits. Odd-length input or any non-hex
/// character is rejected as `InvalidAudioEncoding`.
pub fn decode_hex(encoded: &str) -> Result<Vec<u8>, ChatError> {
    let digits = encoded.as_bytes();

    if digits.len() % 2 != 0 {
        return Err(ChatError::InvalidAudioEncoding(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }

    digits
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let high = nibble(pair[0]);
            let low = nibble(pair[1]);
            match (high, low) {
                (Some(h), Some(l)) => Ok((h << 4) | l),
                _ => Err(ChatError::InvalidAudioEncoding(format!(
                    "non-hex character at offset {}",
                    if high.is_none() { i * 2 } else { i * 2 + 1 }
                ))),
            }
        })
        .collect()
}

/// Encode bytes as lowercase hex
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
