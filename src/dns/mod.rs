//! Multicast DNS wire handling: decoding queries, matching them against the
//! registry and encoding answers.

use std::net::Ipv4Addr;

pub mod matcher;
pub mod query;
pub mod response;

pub use matcher::{Answer, match_query};
pub use query::{DecodeError, Query, QueryKind, decode_query, reverse_name};
pub use response::{EncodeError, encode_response};

/// Well-known multicast DNS group.
pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// Well-known multicast DNS port.
pub const MDNS_PORT: u16 = 5353;

/// TTL advertised on every answer, in seconds.
pub const ANSWER_TTL: u32 = 120;

/// Domain under which IPv4 reverse lookups live.
pub const REVERSE_DOMAIN: &str = "in-addr.arpa.";

/// Largest multicast DNS message we accept.
pub const MAX_MDNS_PACKET_SIZE: usize = 9000;
