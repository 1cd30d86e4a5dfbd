//! Conversion between [`Message`] and store bins.
//!
//! Decoding is lossy: older records may be missing bins or carry
//! them with the wrong type. Such bins are logged and read as zero values so a
//! scan still returns every other message.

use tracing::warn;
use visitboard_core::Message;

use super::{BinValue, Bins, Record, BIN_AUTHOR, BIN_ID, BIN_MESSAGE, BIN_TIMESTAMP};

pub fn message_to_bins(message: &Message) -> Bins {
    Bins::from([
        (BIN_ID.to_string(), BinValue::Int(message.id)),
        (BIN_AUTHOR.to_string(), BinValue::Str(message.author.clone())),
        (BIN_MESSAGE.to_string(), BinValue::Str(message.message.clone())),
        (BIN_TIMESTAMP.to_string(), BinValue::Int(message.timestamp)),
    ])
}

pub fn message_from_record(record: &Record) -> Message {
    Message {
        id: int_bin(&record.bins, BIN_ID),
        author: str_bin(&record.bins, BIN_AUTHOR),
        message: str_bin(&record.bins, BIN_MESSAGE),
        timestamp: int_bin(&record.bins, BIN_TIMESTAMP),
    }
}

pub fn messages_from_records(records: &[Record]) -> Vec<Message> {
    records.iter().map(message_from_record).collect()
}

fn int_bin(bins: &Bins, name: &str) -> i64 {
    match bins.get(name) {
        Some(BinValue::Int(v)) => *v,
        Some(other) => {
            warn!(bin = name, found = other.kind(), "expected int bin, using 0");
            0
        }
        None => {
            warn!(bin = name, "missing bin, using 0");
            0
        }
    }
}

fn str_bin(bins: &Bins, name: &str) -> String {
    match bins.get(name) {
        Some(BinValue::Str(v)) => v.clone(),
        Some(other) => {
            warn!(bin = name, found = other.kind(), "expected string bin, using empty");
            String::new()
        }
        None => {
            warn!(bin = name, "missing bin, using empty");
            String::new()
        }
    }
}
