//! Response encoding.

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, PTR};
use hickory_proto::rr::{RData, Record};
use hickory_proto::serialize::binary::BinEncodable;

use super::matcher::Answer;
use super::query::{Query, QueryKind};

/// Error raised while building a reply.
///
/// The responder logs it and skips the reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("query kind {0:?} cannot be answered")]
    Unanswerable(QueryKind),

    #[error("answer id {answer} does not match query id {query}")]
    IdMismatch { query: u16, answer: u16 },

    #[error("failed to serialize response: {0}")]
    Serialize(String),
}

/// Build the response datagram for `query` answered by `answer`.
///
/// The question is echoed verbatim and a single record is appended: an `A`
/// record for forward lookups, a `PTR` record for reverse lookups. Both are
/// owned by the question name exactly as it was asked.
///
/// # Errors
///
/// Returns [`EncodeError`] when the answer does not belong to the query, the
/// query kind has no answer form, or serialization fails.
pub fn encode_response(query: &Query, answer: &Answer) -> Result<Vec<u8>, EncodeError> {
    if query.id() != answer.transaction_id {
        return Err(EncodeError::IdMismatch {
            query: query.id(),
            answer: answer.transaction_id,
        });
    }

    let owner = query.question().name().clone();
    let rdata = match query.kind() {
        QueryKind::Forward => RData::A(A(answer.address)),
        QueryKind::Reverse(_) => RData::PTR(PTR(answer.target.clone())),
        kind @ QueryKind::Other => return Err(EncodeError::Unanswerable(kind)),
    };

    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_response_code(ResponseCode::NoError);
    response.add_query(query.question().clone());
    response.add_answer(Record::from_rdata(owner, answer.ttl, rdata));

    response
        .to_bytes()
        .map_err(|e| EncodeError::Serialize(e.to_string()))
}
