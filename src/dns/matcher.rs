//! Matching decoded queries against a registry snapshot.

use std::net::Ipv4Addr;

use hickory_proto::rr::Name;

use super::ANSWER_TTL;
use super::query::{Query, QueryKind};
use crate::registry::RegistrySnapshot;

/// The record chosen to answer a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub transaction_id: u16,
    pub hostname: String,
    /// The hostname as wire labels, used as the reverse answer target.
    pub target: Name,
    pub address: Ipv4Addr,
    pub ttl: u32,
}

/// Decide whether `query` is owed an answer from `snapshot`.
///
/// Forward lookups compare hostname labels ignoring case and trailing dot; reverse
/// lookups compare address values. The first record in snapshot order wins.
/// Returns `None` when nothing matches or the query is not one we answer.
pub fn match_query(query: &Query, snapshot: &RegistrySnapshot) -> Option<Answer> {
    let record = match query.kind() {
        QueryKind::Forward => snapshot
            .records()
            .iter()
            .find(|record| record.matches(query.question().name()))?,
        QueryKind::Reverse(address) => snapshot
            .records()
            .iter()
            .find(|record| record.address() == address)?,
        QueryKind::Other => return None,
    };

    Some(Answer {
        transaction_id: query.id(),
        hostname: record.hostname().to_string(),
        target: record.name().clone(),
        address: record.address(),
        ttl: ANSWER_TTL,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::query::decode_query;
    use crate::dns::query::tests::{name_query_bytes, query_bytes};
    use crate::registry::ServiceRecord;
    use hickory_proto::rr::RecordType;

    fn snapshot(records: &[(&str, [u8; 4])]) -> RegistrySnapshot {
        RegistrySnapshot::new(
            records
                .iter()
                .map(|(name, addr)| ServiceRecord::new(name, Ipv4Addr::from(*addr)).unwrap()),
        )
    }

    fn query(name: &str, record_type: RecordType) -> Query {
        decode_query(&query_bytes(name, record_type, 77)).unwrap()
    }

    #[test]
    fn should_answer_forward_query_for_known_hostname() {
        let snapshot = snapshot(&[("node1.local.", [10, 0, 0, 5])]);

        let answer = match_query(&query("node1.local.", RecordType::A), &snapshot).unwrap();

        assert_eq!(
            answer,
            Answer {
                transaction_id: 77,
                hostname: "node1.local.".into(),
                target: Name::from_ascii("node1.local.").unwrap(),
                address: Ipv4Addr::new(10, 0, 0, 5),
                ttl: 120,
            }
        );
    }

    #[test]
    fn should_match_hostnames_case_insensitively() {
        let snapshot = snapshot(&[("node1.local.", [10, 0, 0, 5])]);

        let answer = match_query(&query("NODE1.Local.", RecordType::A), &snapshot).unwrap();
        assert_eq!(answer.address, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn should_match_hostnames_with_raw_utf8_and_space_labels() {
        let snapshot = snapshot(&[
            ("café.local.", [10, 0, 0, 5]),
            ("my printer.local.", [10, 0, 0, 6]),
        ]);

        let cafe = decode_query(&name_query_bytes(
            Name::from_labels(["CAFé".as_bytes(), "local".as_bytes()]).unwrap(),
            RecordType::A,
            1,
        ))
        .unwrap();
        let printer = decode_query(&name_query_bytes(
            Name::from_labels(["My Printer".as_bytes(), "local".as_bytes()]).unwrap(),
            RecordType::A,
            2,
        ))
        .unwrap();

        assert_eq!(
            match_query(&cafe, &snapshot).map(|a| a.address),
            Some(Ipv4Addr::new(10, 0, 0, 5))
        );
        assert_eq!(
            match_query(&printer, &snapshot).map(|a| a.address),
            Some(Ipv4Addr::new(10, 0, 0, 6))
        );
    }

    #[test]
    fn should_answer_reverse_query_for_known_address() {
        let snapshot = snapshot(&[
            ("node1.local.", [10, 0, 0, 5]),
            ("node2.local.", [10, 0, 0, 6]),
        ]);

        let answer =
            match_query(&query("6.0.0.10.in-addr.arpa.", RecordType::PTR), &snapshot).unwrap();

        assert_eq!(answer.hostname, "node2.local.");
        assert_eq!(answer.address, Ipv4Addr::new(10, 0, 0, 6));
    }

    #[test]
    fn should_pick_first_record_sharing_an_address() {
        let snapshot = snapshot(&[
            ("api.service.local.", [10, 0, 0, 9]),
            ("web.service.local.", [10, 0, 0, 9]),
        ]);

        let answer =
            match_query(&query("9.0.0.10.in-addr.arpa.", RecordType::PTR), &snapshot).unwrap();
        assert_eq!(answer.hostname, "api.service.local.");
    }

    #[test]
    fn should_not_answer_unknown_hostname_or_address() {
        let snapshot = snapshot(&[("node1.local.", [10, 0, 0, 5])]);

        assert_eq!(match_query(&query("node2.local.", RecordType::A), &snapshot), None);
        assert_eq!(
            match_query(&query("7.0.0.10.in-addr.arpa.", RecordType::PTR), &snapshot),
            None
        );
    }

    #[test]
    fn should_never_answer_other_queries() {
        let snapshot = snapshot(&[("node1.local.", [10, 0, 0, 5])]);

        assert_eq!(match_query(&query("node1.local.", RecordType::AAAA), &snapshot), None);
        assert_eq!(match_query(&query("node1.local.", RecordType::TXT), &snapshot), None);
    }

    #[test]
    fn should_not_answer_from_empty_snapshot() {
        let snapshot = RegistrySnapshot::default();
        assert_eq!(match_query(&query("node1.local.", RecordType::A), &snapshot), None);
    }

    #[test]
    fn should_return_identical_answers_for_repeated_calls() {
        let snapshot = snapshot(&[
            ("node1.local.", [10, 0, 0, 5]),
            ("node2.local.", [10, 0, 0, 6]),
        ]);

        for q in [
            query("node2.local.", RecordType::A),
            query("5.0.0.10.in-addr.arpa.", RecordType::PTR),
            query("missing.local.", RecordType::A),
        ] {
            assert_eq!(match_query(&q, &snapshot), match_query(&q, &snapshot));
        }
    }
}
