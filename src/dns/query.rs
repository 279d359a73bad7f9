//! Query decoding.
//!
//! Turns raw datagrams into a [`Query`], classifying the first question as a
//! forward lookup, a reverse lookup or something we do not answer.

use std::net::Ipv4Addr;

use hickory_proto::op::{self, Message, MessageType, OpCode};
use hickory_proto::rr::{DNSClass, RecordType};
use hickory_proto::serialize::binary::BinDecodable;

use super::REVERSE_DOMAIN;

/// Error raised when a datagram is not an answerable query.
///
/// Never fatal: the responder drops the packet and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message carries no question")]
    NoQuestion,

    #[error("message is not a query")]
    NotAQuery,

    #[error("invalid reverse lookup name {name:?}: {reason}")]
    InvalidReverseName { name: String, reason: &'static str },
}

/// What a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Hostname to address.
    Forward,
    /// Address to hostname; carries the address decoded from the name.
    Reverse(Ipv4Addr),
    /// Anything else; never answered.
    Other,
}

/// A decoded query: transaction id plus its first question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    id: u16,
    question: op::Query,
    name: String,
    kind: QueryKind,
}

impl Query {
    /// Transaction id from the message header.
    #[inline]
    pub const fn id(&self) -> u16 {
        self.id
    }

    /// The question as it appeared on the wire.
    #[inline]
    pub const fn question(&self) -> &op::Query {
        &self.question
    }

    /// Question name in presentation form, case preserved.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn record_type(&self) -> RecordType {
        self.question.query_type()
    }

    #[inline]
    pub fn class(&self) -> DNSClass {
        self.question.query_class()
    }

    #[inline]
    pub const fn kind(&self) -> QueryKind {
        self.kind
    }
}

/// Decode a datagram into a [`Query`].
///
/// # Errors
///
/// Returns [`DecodeError`] for truncated or structurally invalid messages,
/// responses, messages without a question, and reverse lookup names that do
/// not spell out a valid IPv4 address.
pub fn decode_query(bytes: &[u8]) -> Result<Query, DecodeError> {
    let message = Message::from_bytes(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if message.message_type() != MessageType::Query || message.op_code() != OpCode::Query {
        return Err(DecodeError::NotAQuery);
    }

    let question = message
        .queries()
        .first()
        .cloned()
        .ok_or(DecodeError::NoQuestion)?;
    let name = question.name().to_ascii();

    let kind = match parse_reverse_name(&name)? {
        Some(address) => QueryKind::Reverse(address),
        None if is_address_query(question.query_type()) => QueryKind::Forward,
        None => QueryKind::Other,
    };

    Ok(Query {
        id: message.id(),
        question,
        name,
        kind,
    })
}

const fn is_address_query(record_type: RecordType) -> bool {
    matches!(record_type, RecordType::A | RecordType::ANY)
}

/// Parse `d.c.b.a.in-addr.arpa.` back into `a.b.c.d`.
///
/// Returns `Ok(None)` when the name is not under the reverse domain at all.
fn parse_reverse_name(name: &str) -> Result<Option<Ipv4Addr>, DecodeError> {
    let invalid = |reason| DecodeError::InvalidReverseName {
        name: name.to_string(),
        reason,
    };

    let trimmed = name.trim_end_matches('.');
    let suffix = REVERSE_DOMAIN.trim_end_matches('.');
    if trimmed.len() < suffix.len()
        || !trimmed[trimmed.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    {
        return Ok(None);
    }

    let prefix = &trimmed[..trimmed.len() - suffix.len()];
    if prefix.is_empty() {
        return Err(invalid("missing address labels"));
    }
    let Some(prefix) = prefix.strip_suffix('.') else {
        // Something like "foo-in-addr.arpa", not the reverse domain.
        return Ok(None);
    };

    let labels: Vec<&str> = prefix.split('.').collect();
    if labels.len() != 4 {
        return Err(invalid("expected exactly four octet labels"));
    }

    let mut octets = [0u8; 4];
    for (slot, label) in octets.iter_mut().rev().zip(&labels) {
        if label.is_empty() || label.len() > 3 || !label.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("octet label is not a decimal number"));
        }
        *slot = label.parse().map_err(|_| invalid("octet out of range"))?;
    }

    Ok(Some(Ipv4Addr::from(octets)))
}

/// Build the reverse lookup name for `address`.
pub fn reverse_name(address: Ipv4Addr) -> String {
    let [a, b, c, d] = address.octets();
    format!("{d}.{c}.{b}.{a}.{REVERSE_DOMAIN}")
}
