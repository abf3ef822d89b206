//! Decodes validator manager receipts into the warp message they carry.
//!
//! Direct and multisig-executed transactions emit their logs in different
//! orders, so each known log shape is a variant with its own structural
//! check, tried in a fixed priority. New shapes are added as new variants.

use alloy_primitives::B256;
use alloy_sol_types::SolEvent;

use crate::models::{
    contract::{abi, WARP_PRECOMPILE_ADDRESS},
    message::{ChangeEventKind, ExtractedMessage, MessageSource, UnsignedMessage, ValidatorChangeEvent},
    receipt::{LogEntry, TransactionReceipt},
};
use crate::utils::errors::{OrchestratorError, Result};

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
enum KnownLog<'a> {
    WarpMessage {
        log: &'a LogEntry,
        message_id: B256,
    },
    RegistrationInitiated {
        validation_id: B256,
        weight: u64,
    },
    RemovalInitiated {
        validation_id: B256,
        message_id: B256,
        weight: u64,
        end_time: u64,
    },
    WeightUpdateInitiated {
        validation_id: B256,
        nonce: u64,
        message_id: B256,
        weight: u64,
    },
}

type Decoder = for<'a> fn(&'a LogEntry) -> Option<KnownLog<'a>>;

/// Decode priority; the first structurally valid match wins.
const DECODERS: &[Decoder] = &[
    decode_warp_message,
    decode_registration,
    decode_removal,
    decode_weight_update,
];

fn word(data: &[u8], index: usize) -> Option<&[u8]> {
    data.get(index * WORD..(index + 1) * WORD)
}

fn word_b256(data: &[u8], index: usize) -> Option<B256> {
    word(data, index).map(B256::from_slice)
}

/// A uint64 ABI word; any set bit above the low 8 bytes is malformed.
fn word_u64(data: &[u8], index: usize) -> Option<u64> {
    let w = word(data, index)?;
    let (high, low) = w.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    Some(u64::from_be_bytes(buf))
}

fn has_topic(log: &LogEntry, topic: B256, min_topics: usize) -> bool {
    log.topics.first() == Some(&topic) && log.topics.len() >= min_topics
}

fn decode_warp_message(log: &LogEntry) -> Option<KnownLog<'_>> {
    if log.address != WARP_PRECOMPILE_ADDRESS
        || !has_topic(log, abi::SendWarpMessage::SIGNATURE_HASH, 3)
        || log.data.is_empty()
    {
        return None;
    }
    Some(KnownLog::WarpMessage {
        log,
        message_id: log.topics[2],
    })
}

fn decode_registration(log: &LogEntry) -> Option<KnownLog<'_>> {
    if !has_topic(log, abi::InitiatedValidatorRegistration::SIGNATURE_HASH, 3) {
        return None;
    }
    Some(KnownLog::RegistrationInitiated {
        validation_id: log.topics[1],
        weight: word_u64(&log.data, 2)?,
    })
}

fn decode_removal(log: &LogEntry) -> Option<KnownLog<'_>> {
    if !has_topic(log, abi::InitiatedValidatorRemoval::SIGNATURE_HASH, 2) {
        return None;
    }
    Some(KnownLog::RemovalInitiated {
        validation_id: log.topics[1],
        message_id: word_b256(&log.data, 0)?,
        weight: word_u64(&log.data, 1)?,
        end_time: word_u64(&log.data, 2)?,
    })
}

fn decode_weight_update(log: &LogEntry) -> Option<KnownLog<'_>> {
    if !has_topic(log, abi::InitiatedValidatorWeightUpdate::SIGNATURE_HASH, 2) {
        return None;
    }
    Some(KnownLog::WeightUpdateInitiated {
        validation_id: log.topics[1],
        nonce: word_u64(&log.data, 0)?,
        message_id: word_b256(&log.data, 1)?,
        weight: word_u64(&log.data, 2)?,
    })
}

fn classify(log: &LogEntry) -> Option<KnownLog<'_>> {
    DECODERS.iter().find_map(|decode| decode(log))
}

fn decode_error(receipt: &TransactionReceipt, reason: impl Into<String>) -> OrchestratorError {
    OrchestratorError::Decode {
        tx_hash: receipt.transaction_hash,
        reason: reason.into(),
    }
}

/// Pull the unsigned warp message out of `receipt`.
///
/// The precompile log is preferred wherever it sits. Without it, the second
/// log is used (multisig execution), then the first (direct execution).
/// Fails if no log in the receipt has a known topic.
pub fn extract_unsigned_message(receipt: &TransactionReceipt) -> Result<ExtractedMessage> {
    let known: Vec<KnownLog<'_>> = receipt.logs.iter().filter_map(classify).collect();
    if known.is_empty() {
        return Err(decode_error(
            receipt,
            format!(
                "none of the {} logs matched a warp or validator manager topic",
                receipt.logs.len()
            ),
        ));
    }

    let precompile = known.iter().find_map(|k| match k {
        KnownLog::WarpMessage { log, .. } => Some(*log),
        _ => None,
    });
    let (log, source) = match (precompile, receipt.logs.get(1), receipt.logs.first()) {
        (Some(log), _, _) => (log, MessageSource::Precompile),
        (None, Some(second), _) => (second, MessageSource::SecondLog),
        (None, None, Some(first)) => (first, MessageSource::FirstLog),
        (None, None, None) => return Err(decode_error(receipt, "receipt has no logs")),
    };
    if log.data.is_empty() {
        return Err(decode_error(receipt, "selected log carries no message data"));
    }

    let mut extracted = ExtractedMessage {
        tx_hash: receipt.transaction_hash,
        unsigned_message: UnsignedMessage(log.data.clone()),
        source,
        validation_id: None,
        weight: None,
        end_time: None,
    };

    for entry in &known {
        match *entry {
            KnownLog::RegistrationInitiated {
                validation_id,
                weight,
            } => {
                extracted.validation_id = Some(validation_id);
                extracted.weight = Some(weight);
            }
            KnownLog::RemovalInitiated {
                validation_id,
                weight,
                end_time,
                ..
            } => {
                extracted.validation_id = Some(validation_id);
                extracted.weight = Some(weight);
                extracted.end_time = Some(end_time);
            }
            KnownLog::WeightUpdateInitiated {
                validation_id,
                weight,
                ..
            } => {
                extracted.validation_id = Some(validation_id);
                extracted.weight = Some(weight);
            }
            KnownLog::WarpMessage { .. } => continue,
        }
        break;
    }

    Ok(extracted)
}

/// Pull the removal or weight-update event out of `receipt`, falling back to
/// a record built from the precompile log alone.
pub fn extract_change_event(receipt: &TransactionReceipt) -> Result<ValidatorChangeEvent> {
    let known: Vec<KnownLog<'_>> = receipt.logs.iter().filter_map(classify).collect();

    let removal = known.iter().find_map(|k| match *k {
        KnownLog::RemovalInitiated {
            validation_id,
            message_id,
            weight,
            end_time,
        } => Some(ValidatorChangeEvent {
            kind: ChangeEventKind::Removal,
            validation_id: Some(validation_id),
            message_id,
            nonce: None,
            weight: Some(weight),
            end_time: Some(end_time),
        }),
        _ => None,
    });
    let weight_update = || {
        known.iter().find_map(|k| match *k {
            KnownLog::WeightUpdateInitiated {
                validation_id,
                nonce,
                message_id,
                weight,
            } => Some(ValidatorChangeEvent {
                kind: ChangeEventKind::WeightUpdate,
                validation_id: Some(validation_id),
                message_id,
                nonce: Some(nonce),
                weight: Some(weight),
                end_time: None,
            }),
            _ => None,
        })
    };
    let precompile_only = || {
        known.iter().find_map(|k| match *k {
            KnownLog::WarpMessage { message_id, .. } => Some(ValidatorChangeEvent {
                kind: ChangeEventKind::PrecompileOnly,
                validation_id: None,
                message_id,
                nonce: None,
                weight: None,
                end_time: None,
            }),
            _ => None,
        })
    };

    removal
        .or_else(weight_update)
        .or_else(precompile_only)
        .ok_or_else(|| decode_error(receipt, "no removal, weight update or warp message log found"))
}

/// Both halves of a removal receipt; either failing fails the whole decode.
pub fn extract_removal(receipt: &TransactionReceipt) -> Result<(ExtractedMessage, ValidatorChangeEvent)> {
    let message = extract_unsigned_message(receipt)?;
    let event = extract_change_event(receipt)?;
    Ok((message, event))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    fn u64_word(v: u64) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[24..].copy_from_slice(&v.to_be_bytes());
        w
    }

    pub(crate) fn warp_log(message: &[u8]) -> LogEntry {
        LogEntry {
            address: WARP_PRECOMPILE_ADDRESS,
            topics: vec![
                abi::SendWarpMessage::SIGNATURE_HASH,
                B256::left_padding_from(&[0x99]),
                B256::repeat_byte(0x42),
            ],
            data: Bytes::copy_from_slice(message),
        }
    }

    pub(crate) fn removal_log(validation_id: B256, weight: u64, end_time: u64) -> LogEntry {
        let mut data = Vec::new();
        data.extend_from_slice(B256::repeat_byte(0x07).as_slice());
        data.extend_from_slice(&u64_word(weight));
        data.extend_from_slice(&u64_word(end_time));
        LogEntry {
            address: Address::repeat_byte(0x01),
            topics: vec![abi::InitiatedValidatorRemoval::SIGNATURE_HASH, validation_id],
            data: data.into(),
        }
    }

    fn weight_update_log(validation_id: B256, nonce: u64, weight: u64) -> LogEntry {
        let mut data = Vec::new();
        data.extend_from_slice(&u64_word(nonce));
        data.extend_from_slice(B256::repeat_byte(0x08).as_slice());
        data.extend_from_slice(&u64_word(weight));
        LogEntry {
            address: Address::repeat_byte(0x01),
            topics: vec![abi::InitiatedValidatorWeightUpdate::SIGNATURE_HASH, validation_id],
            data: data.into(),
        }
    }

    fn unknown_log(byte: u8) -> LogEntry {
        LogEntry {
            address: Address::repeat_byte(byte),
            topics: vec![B256::repeat_byte(byte)],
            data: Bytes::from(vec![byte; 8]),
        }
    }

    fn receipt(logs: Vec<LogEntry>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: B256::repeat_byte(0xaa),
            success: true,
            block_number: Some(1),
            logs,
        }
    }

    #[test]
    fn precompile_log_wins_wherever_it_sits() {
        let id = B256::repeat_byte(0x33);
        for position in 0..3 {
            let mut logs = vec![removal_log(id, 10, 20), unknown_log(0x05)];
            logs.insert(position, warp_log(b"payload"));
            let extracted = extract_unsigned_message(&receipt(logs)).unwrap();
            assert_eq!(extracted.source, MessageSource::Precompile);
            assert_eq!(extracted.unsigned_message.as_bytes().as_ref(), b"payload");
            assert_eq!(extracted.validation_id, Some(id));
        }
    }

    #[test]
    fn falls_back_to_second_then_first_log() {
        let id = B256::repeat_byte(0x33);
        let two = receipt(vec![removal_log(id, 1, 2), unknown_log(0x05)]);
        let extracted = extract_unsigned_message(&two).unwrap();
        assert_eq!(extracted.source, MessageSource::SecondLog);
        assert_eq!(extracted.unsigned_message.as_bytes(), &two.logs[1].data);

        let one = receipt(vec![removal_log(id, 1, 2)]);
        let extracted = extract_unsigned_message(&one).unwrap();
        assert_eq!(extracted.source, MessageSource::FirstLog);
    }

    #[test]
    fn unknown_topics_are_a_decode_error() {
        let r = receipt(vec![unknown_log(0x01), unknown_log(0x02)]);
        match extract_unsigned_message(&r).unwrap_err() {
            OrchestratorError::Decode { tx_hash, .. } => assert_eq!(tx_hash, r.transaction_hash),
            other => panic!("unexpected {:?}", other),
        }
        assert!(extract_change_event(&r).is_err());
        assert!(extract_removal(&receipt(Vec::new())).is_err());
    }

    #[test]
    fn warp_topic_from_wrong_address_is_ignored() {
        let mut spoofed = warp_log(b"payload");
        spoofed.address = Address::repeat_byte(0x77);
        assert!(extract_unsigned_message(&receipt(vec![spoofed])).is_err());
    }

    #[test]
    fn removal_event_beats_weight_update() {
        let id = B256::repeat_byte(0x33);
        let r = receipt(vec![weight_update_log(id, 4, 50), removal_log(id, 0, 1_700_000_000)]);
        let event = extract_change_event(&r).unwrap();
        assert_eq!(event.kind, ChangeEventKind::Removal);
        assert_eq!(event.weight, Some(0));
        assert_eq!(event.end_time, Some(1_700_000_000));
        assert_eq!(event.message_id, B256::repeat_byte(0x07));
    }

    #[test]
    fn weight_update_lacks_end_time() {
        let id = B256::repeat_byte(0x34);
        let event = extract_change_event(&receipt(vec![warp_log(b"m"), weight_update_log(id, 9, 75)])).unwrap();
        assert_eq!(event.kind, ChangeEventKind::WeightUpdate);
        assert_eq!(event.nonce, Some(9));
        assert_eq!(event.weight, Some(75));
        assert_eq!(event.end_time, None);
    }

    #[test]
    fn precompile_only_receipt_synthesizes_unknown_fields() {
        let event = extract_change_event(&receipt(vec![warp_log(b"m")])).unwrap();
        assert_eq!(event.kind, ChangeEventKind::PrecompileOnly);
        assert_eq!(event.message_id, B256::repeat_byte(0x42));
        assert_eq!(event.validation_id, None);
        assert_eq!(event.weight, None);
        assert_eq!(event.end_time, None);
    }

    #[test]
    fn truncated_removal_event_is_not_a_match() {
        let mut short = removal_log(B256::repeat_byte(0x01), 1, 2);
        short.data = Bytes::from(vec![0u8; 40]);
        assert!(extract_change_event(&receipt(vec![short])).is_err());
    }
}
