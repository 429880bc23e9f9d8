//! ABI encoding of parameter lists. Used to build log data for fixtures and
//! tests; the pipeline itself only decodes.

use primitive_types::U256;

use shared_crypto::parse_address;

use super::value::AbiValue;

const WORD: usize = 32;

/// Encode values with the standard head/tail layout.
///
/// Invalid addresses encode as the zero address.
pub fn encode_params(values: &[AbiValue]) -> Vec<u8> {
    let head_len = values.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        if value.param_type().is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            tail.extend_from_slice(&encode_dynamic(value));
        } else {
            head.extend_from_slice(&encode_static(value));
        }
    }
    head.extend_from_slice(&tail);
    head
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn encode_static(value: &AbiValue) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match value {
        AbiValue::Address(address) => {
            let bytes = parse_address(address).unwrap_or([0u8; 20]);
            word[12..].copy_from_slice(&bytes);
        }
        AbiValue::Bool(flag) => word[31] = u8::from(*flag),
        AbiValue::Uint(v) | AbiValue::Int(v) => word = uint_word(*v),
        AbiValue::FixedBytes(bytes) => {
            let len = bytes.len().min(WORD);
            word[..len].copy_from_slice(&bytes[..len]);
        }
        AbiValue::Bytes(_) | AbiValue::String(_) => {}
    }
    word
}

fn encode_dynamic(value: &AbiValue) -> Vec<u8> {
    let bytes: &[u8] = match value {
        AbiValue::Bytes(bytes) => bytes,
        AbiValue::String(s) => s.as_bytes(),
        _ => &[],
    };
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded_len);
    out.extend_from_slice(&uint_word(U256::from(bytes.len())));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_string_layout() {
        let data = encode_params(&[AbiValue::String("abc".into())]);
        assert_eq!(data.len(), 96);
        assert_eq!(data[31], 32);
        assert_eq!(data[63], 3);
        assert_eq!(&data[64..67], b"abc");
    }

    #[test]
    fn test_encode_static_words() {
        let data = encode_params(&[AbiValue::Bool(true), AbiValue::Uint(U256::from(7u64))]);
        assert_eq!(data.len(), 64);
        assert_eq!(data[31], 1);
        assert_eq!(data[63], 7);
    }
}
