//! Hostcast - A multicast DNS responder for a live host registry.
//!
//! Hostcast listens on the mDNS group, answers forward (`A`) and reverse
//! (`in-addr.arpa` PTR) queries for hostnames it knows about, and stays silent
//! for everything else. The set of known hostnames is an immutable snapshot
//! that is rebuilt from the configured inventory and swapped in atomically.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`]: Configuration loading and validation
//! - [`registry`]: Service records, snapshots and the snapshot store
//! - [`inventory`]: Inventory sources and periodic registry refresh
//! - [`dns`]: Query decoding, matching and response encoding
//! - [`network`]: The multicast socket
//! - [`server`]: The responder loop
//! - [`error`]: Error types
//!
//! # Testing
//!
//! The codec and matcher are pure functions, so they can be tested without
//! any network access:
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use hickory_proto::op::{Message, Query};
//! use hickory_proto::rr::{Name, RecordType};
//! use hickory_proto::serialize::binary::BinEncodable;
//! use hostcast::dns::{decode_query, encode_response, match_query};
//! use hostcast::registry::{RegistrySnapshot, ServiceRecord};
//!
//! let snapshot = RegistrySnapshot::new([
//!     ServiceRecord::new("node1.local.", Ipv4Addr::new(10, 0, 0, 5)).unwrap(),
//! ]);
//!
//! let mut message = Message::new();
//! message.set_id(7);
//! message.add_query(Query::query(Name::from_ascii("node1.local.").unwrap(), RecordType::A));
//!
//! let query = decode_query(&message.to_bytes().unwrap()).unwrap();
//! let answer = match_query(&query, &snapshot).unwrap();
//! assert_eq!(answer.address, Ipv4Addr::new(10, 0, 0, 5));
//! assert!(encode_response(&query, &answer).is_ok());
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod network;
pub mod registry;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
