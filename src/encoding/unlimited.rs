//! Self-terminating length prefix
//!
//! The length is written as base-15 digits, one per nibble, followed by an
//! `F` nibble. A leading `0` nibble is added when needed so the prefix fills
//! whole bytes. `0` encodes as `0F`, `15` as `01 0F`.

use super::CodecError;

const TERMINATOR: u8 = 0x0f;

pub fn encode_length_for_unlimited(length: usize) -> Vec<u8> {
    let mut digits = Vec::new();
    let mut rest = length;
    loop {
        digits.push((rest % 15) as u8);
        rest /= 15;
        if rest == 0 {
            break;
        }
    }
    digits.reverse();
    digits.push(TERMINATOR);
    if digits.len() % 2 == 1 {
        digits.insert(0, 0);
    }

    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect()
}

/// Returns `(length, prefix_byte_length)`.
pub fn decode_length_from_unlimited(data: &[u8]) -> Result<(usize, usize), CodecError> {
    let mut length: usize = 0;
    for position in 0..data.len() * 2 {
        let byte = data[position / 2];
        let nibble = if position % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if nibble == TERMINATOR {
            return Ok((length, (position + 2) / 2));
        }

        length = length
            .checked_mul(15)
            .and_then(|l| l.checked_add(nibble as usize))
            .ok_or_else(|| CodecError::Decode("unlimited length overflows".to_string()))?;
    }

    Err(CodecError::Decode(
        "unlimited length prefix has no terminator".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_prefixes() {
        assert_eq!(encode_length_for_unlimited(0), vec![0x0f]);
        assert_eq!(encode_length_for_unlimited(1), vec![0x1f]);
        assert_eq!(encode_length_for_unlimited(14), vec![0xef]);
        assert_eq!(encode_length_for_unlimited(15), vec![0x01, 0x0f]);
        // 224 = 14 * 15 + 14
        assert_eq!(encode_length_for_unlimited(224), vec![0x0e, 0xef]);
        assert_eq!(encode_length_for_unlimited(225), vec![0x10, 0x0f]);
    }

    #[test]
    fn test_prefix_round_trip() {
        for length in [0usize, 1, 14, 15, 224, 10_000] {
            let prefix = encode_length_for_unlimited(length);
            let mut data = prefix.clone();
            data.extend_from_slice(&[0xff, 0x00, 0xaa]);
            assert_eq!(
                decode_length_from_unlimited(&data).unwrap(),
                (length, prefix.len()),
                "length {length}"
            );
        }
    }

    #[test]
    fn test_missing_terminator() {
        assert!(decode_length_from_unlimited(&[0x12, 0x34]).is_err());
        assert!(decode_length_from_unlimited(&[]).is_err());
    }

    #[test]
    fn test_overflowing_digits() {
        let data = vec![0xee; 64];
        assert!(matches!(
            decode_length_from_unlimited(&data),
            Err(CodecError::Decode(_))
        ));
    }
}
