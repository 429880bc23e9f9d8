//! # Log Decoder
//!
//! Head/tail ABI decoding of log data with strict checks: every read is
//! bounds-checked, address words must be left-padded with zeros, bools must
//! be 0 or 1, `uintN` must fit N bits and strings must be valid UTF-8.

use primitive_types::U256;

use shared_crypto::checksum_encode;
use shared_types::{hex_to_bytes, RawLog};

use super::errors::AbiError;
use super::types::{EventDefinition, ParamType};
use super::value::AbiValue;

const WORD: usize = 32;

/// Decode a sequence of parameters from ABI-encoded data.
pub fn decode_params(types: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    types
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let head = read_word(data, i * WORD)?;
            if kind.is_dynamic() {
                let offset = word_to_usize(head, "offset")?;
                decode_dynamic(*kind, data, offset)
            } else {
                decode_static(*kind, head)
            }
        })
        .collect()
}

/// Decode a log against its event definition. Returns `(name, value)` pairs
/// in declaration order. Indexed dynamic parameters come back as their
/// 32-byte topic hash.
pub fn decode_log(
    definition: &EventDefinition,
    log: &RawLog,
) -> Result<Vec<(String, AbiValue)>, AbiError> {
    let indexed_count = definition.inputs.iter().filter(|p| p.indexed).count();
    let topics = log.topics.get(1..).unwrap_or_default();
    if topics.len() < indexed_count {
        return Err(AbiError::TopicCount {
            event: definition.name.clone(),
            expected: indexed_count + 1,
            actual: log.topics.len(),
        });
    }

    let data = hex_to_bytes(&log.data).map_err(|e| AbiError::InvalidHex(e.to_string()))?;
    let data_types: Vec<ParamType> = definition
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.kind)
        .collect();
    let mut data_values = decode_params(&data_types, &data)?.into_iter();
    let mut topic_iter = topics.iter();

    definition
        .inputs
        .iter()
        .map(|param| {
            let value = if param.indexed {
                let topic = topic_iter.next().ok_or_else(|| AbiError::TopicCount {
                    event: definition.name.clone(),
                    expected: indexed_count + 1,
                    actual: log.topics.len(),
                })?;
                decode_topic(param.kind, topic)?
            } else {
                data_values.next().ok_or_else(|| AbiError::Shape {
                    event: definition.name.clone(),
                    reason: format!("missing value for {}", param.name),
                })?
            };
            Ok((param.name.clone(), value))
        })
        .collect()
}

fn decode_topic(kind: ParamType, topic: &str) -> Result<AbiValue, AbiError> {
    let bytes = hex_to_bytes(topic).map_err(|e| AbiError::InvalidHex(e.to_string()))?;
    let word: [u8; WORD] = bytes.as_slice().try_into().map_err(|_| AbiError::InvalidValue {
        kind: "topic".to_string(),
        reason: format!("expected 32 bytes, got {}", bytes.len()),
    })?;
    if kind.is_dynamic() {
        Ok(AbiValue::FixedBytes(word.to_vec()))
    } else {
        decode_static(kind, &word)
    }
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8; WORD], AbiError> {
    read_slice(data, offset, WORD).and_then(|slice| {
        slice.try_into().map_err(|_| AbiError::OutOfBounds {
            offset,
            needed: WORD,
            available: data.len().saturating_sub(offset),
        })
    })
}

fn read_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], AbiError> {
    let end = offset.checked_add(len).ok_or(AbiError::OutOfBounds {
        offset,
        needed: len,
        available: data.len().saturating_sub(offset),
    })?;
    data.get(offset..end).ok_or(AbiError::OutOfBounds {
        offset,
        needed: len,
        available: data.len().saturating_sub(offset),
    })
}

fn word_to_usize(word: &[u8; WORD], what: &str) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(word);
    if value.bits() > 64 {
        return Err(AbiError::InvalidValue {
            kind: what.to_string(),
            reason: format!("{} does not fit in 64 bits", value),
        });
    }
    usize::try_from(value.low_u64()).map_err(|_| AbiError::InvalidValue {
        kind: what.to_string(),
        reason: format!("{} exceeds addressable size", value),
    })
}

fn decode_static(kind: ParamType, word: &[u8; WORD]) -> Result<AbiValue, AbiError> {
    let invalid = |reason: &str| AbiError::InvalidValue {
        kind: kind.to_string(),
        reason: reason.to_string(),
    };
    match kind {
        ParamType::Address => {
            if word[..12].iter().any(|b| *b != 0) {
                return Err(invalid("non-zero padding"));
            }
            let mut address = [0u8; 20];
            address.copy_from_slice(&word[12..]);
            Ok(AbiValue::Address(checksum_encode(&address)))
        }
        ParamType::Bool => {
            if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
                return Err(invalid("not 0 or 1"));
            }
            Ok(AbiValue::Bool(word[31] == 1))
        }
        ParamType::Uint(bits) => {
            let value = U256::from_big_endian(word);
            if value.bits() > bits {
                return Err(invalid("value exceeds type width"));
            }
            Ok(AbiValue::Uint(value))
        }
        ParamType::Int(_) => Ok(AbiValue::Int(U256::from_big_endian(word))),
        ParamType::FixedBytes(len) => {
            if word[len..].iter().any(|b| *b != 0) {
                return Err(invalid("non-zero padding"));
            }
            Ok(AbiValue::FixedBytes(word[..len].to_vec()))
        }
        ParamType::Bytes | ParamType::String => Err(invalid("dynamic type in static position")),
    }
}

fn decode_dynamic(kind: ParamType, data: &[u8], offset: usize) -> Result<AbiValue, AbiError> {
    let len = word_to_usize(read_word(data, offset)?, "length")?;
    let start = offset.checked_add(WORD).ok_or(AbiError::OutOfBounds {
        offset,
        needed: WORD,
        available: data.len().saturating_sub(offset),
    })?;
    let bytes = read_slice(data, start, len)?.to_vec();
    match kind {
        ParamType::String => String::from_utf8(bytes)
            .map(AbiValue::String)
            .map_err(|e| AbiError::InvalidValue {
                kind: "string".to_string(),
                reason: e.to_string(),
            }),
        _ => Ok(AbiValue::Bytes(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encoder::encode_params;
    use proptest::prelude::*;

    fn word(last: u8) -> Vec<u8> {
        let mut w = vec![0u8; 32];
        w[31] = last;
        w
    }

    #[test]
    fn test_decode_static_and_dynamic() {
        let values = vec![
            AbiValue::FixedBytes(vec![0xab; 32]),
            AbiValue::String("isMember".to_string()),
            AbiValue::Uint(U256::from(42u64)),
        ];
        let data = encode_params(&values);
        let decoded = decode_params(
            &[ParamType::FixedBytes(32), ParamType::String, ParamType::Uint(256)],
            &data,
        )
        .unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_address_is_checksummed() {
        let mut w = vec![0u8; 32];
        w[12..].copy_from_slice(&hex::decode("7e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap());
        let decoded = decode_params(&[ParamType::Address], &w).unwrap();
        assert_eq!(
            decoded[0],
            AbiValue::Address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".to_string())
        );
    }

    #[test]
    fn test_address_with_dirty_padding_rejected() {
        let mut w = vec![0u8; 32];
        w[0] = 1;
        assert!(matches!(
            decode_params(&[ParamType::Address], &w),
            Err(AbiError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_bool_must_be_zero_or_one() {
        assert_eq!(
            decode_params(&[ParamType::Bool], &word(1)).unwrap(),
            vec![AbiValue::Bool(true)]
        );
        assert!(decode_params(&[ParamType::Bool], &word(2)).is_err());
    }

    #[test]
    fn test_uint_width_enforced() {
        let mut w = vec![0u8; 32];
        w[30] = 1;
        assert!(decode_params(&[ParamType::Uint(8)], &w).is_err());
        assert!(decode_params(&[ParamType::Uint(16)], &w).is_ok());
    }

    #[test]
    fn test_short_data_rejected() {
        assert!(matches!(
            decode_params(&[ParamType::FixedBytes(32)], &[0u8; 31]),
            Err(AbiError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_dynamic_offset_out_of_range() {
        let mut data = word(0);
        data[31] = 0xff;
        assert!(matches!(
            decode_params(&[ParamType::String], &data),
            Err(AbiError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let data = encode_params(&[AbiValue::Bytes(vec![0xff, 0xfe])]);
        assert!(decode_params(&[ParamType::String], &data).is_err());
        assert!(decode_params(&[ParamType::Bytes], &data).is_ok());
    }

    #[test]
    fn test_decode_log_with_indexed_param() {
        let definition = EventDefinition::new(
            "Transfer",
            &[
                ("node", ParamType::FixedBytes(32), true),
                ("owner", ParamType::Address, false),
            ],
        );
        let owner = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".to_string();
        let data = encode_params(&[AbiValue::Address(owner.clone())]);
        let log = RawLog {
            address: "0x00".into(),
            data: shared_types::bytes_to_hex(&data),
            topics: vec![definition.topic(), format!("0x{}", "11".repeat(32))],
            block_number: 1,
            transaction_index: 0,
            log_index: 0,
            transaction_hash: String::new(),
        };
        let decoded = decode_log(&definition, &log).unwrap();
        assert_eq!(decoded[0].0, "node");
        assert_eq!(decoded[0].1, AbiValue::FixedBytes(vec![0x11; 32]));
        assert_eq!(decoded[1].1, AbiValue::Address(owner));
    }

    #[test]
    fn test_decode_log_missing_topic() {
        let definition =
            EventDefinition::new("Transfer", &[("node", ParamType::FixedBytes(32), true)]);
        let log = RawLog {
            address: "0x00".into(),
            data: "0x".into(),
            topics: vec![definition.topic()],
            block_number: 1,
            transaction_index: 0,
            log_index: 0,
            transaction_hash: String::new(),
        };
        assert!(matches!(
            decode_log(&definition, &log),
            Err(AbiError::TopicCount { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_decoder_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode_params(
                &[ParamType::FixedBytes(32), ParamType::String, ParamType::Uint(256), ParamType::Bytes],
                &data,
            );
        }

        #[test]
        fn prop_string_round_trip(s in ".{0,80}") {
            let data = encode_params(&[AbiValue::String(s.clone())]);
            let decoded = decode_params(&[ParamType::String], &data).unwrap();
            prop_assert_eq!(decoded, vec![AbiValue::String(s)]);
        }
    }
}
