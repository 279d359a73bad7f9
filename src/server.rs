//! Responder orchestration.
//!
//! Reads datagrams from the multicast socket, decodes them, matches them
//! against the current registry snapshot and sends answers back to the
//! querier. Designed with a trait-based socket for testability.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::dns::{MAX_MDNS_PACKET_SIZE, Query, decode_query, encode_response, match_query};
use crate::error::{Result, SetupError};
use crate::metrics::{
    DECODE_ERRORS, ENCODE_ERRORS, QUERIES_ANSWERED, QUERIES_RECEIVED, QUERIES_UNANSWERED,
    RECEIVE_ERRORS, SEND_ERRORS,
};
use crate::network::{DatagramSocket, MulticastSocket, is_closed};
use crate::registry::SnapshotStore;

/// Lifecycle of a [`Responder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Why the responder left the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SocketClosed,
    TooManyReceiveErrors,
}

/// Counters for responder operations.
#[derive(Debug, Default)]
pub struct ResponderStats {
    received: AtomicU64,
    decode_errors: AtomicU64,
    answered: AtomicU64,
    unanswered: AtomicU64,
    encode_errors: AtomicU64,
    send_errors: AtomicU64,
    receive_errors: AtomicU64,
}

impl ResponderStats {
    fn bump(counter: &AtomicU64, metric: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(metric).increment(1);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn answered(&self) -> u64 {
        self.answered.load(Ordering::Relaxed)
    }

    pub fn unanswered(&self) -> u64 {
        self.unanswered.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Relaxed)
    }
}

/// Multicast DNS responder serving the registry in a [`SnapshotStore`].
pub struct Responder<S: DatagramSocket> {
    socket: S,
    store: SnapshotStore,
    cancel: CancellationToken,
    state: watch::Sender<ResponderState>,
    stats: Arc<ResponderStats>,
    max_consecutive_errors: u32,
}

impl Responder<MulticastSocket> {
    /// Open the multicast socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if the interface cannot be resolved or the
    /// socket cannot be bound or joined. The responder never runs in that case.
    pub fn bind(
        config: &Config,
        store: SnapshotStore,
        cancel: CancellationToken,
    ) -> std::result::Result<Self, SetupError> {
        let socket = MulticastSocket::open(&config.interface, config.group, config.port)?;
        info!(
            interface = %config.interface,
            address = %socket.interface(),
            group = %socket.group(),
            local = ?socket.local_addr().ok(),
            "multicast socket ready"
        );
        Ok(Self::new(
            socket,
            store,
            cancel,
            config.max_consecutive_receive_errors,
        ))
    }
}

impl<S: DatagramSocket> Responder<S> {
    /// Create a responder over an already opened socket.
    pub fn new(
        socket: S,
        store: SnapshotStore,
        cancel: CancellationToken,
        max_consecutive_errors: u32,
    ) -> Self {
        let (state, _) = watch::channel(ResponderState::Starting);
        Self {
            socket,
            store,
            cancel,
            state,
            stats: Arc::new(ResponderStats::default()),
            max_consecutive_errors: max_consecutive_errors.max(1),
        }
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ResponderState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Arc<ResponderStats> {
        Arc::clone(&self.stats)
    }

    fn transition(&self, next: ResponderState) {
        debug!(state = ?next, "responder state");
        self.state.send_replace(next);
    }

    /// Serve queries until cancelled or the socket is gone, then close it.
    ///
    /// # Errors
    ///
    /// Returns an error only if closing the socket fails; the serving loop
    /// itself never fails.
    pub async fn run(self) -> Result<StopReason> {
        self.transition(ResponderState::Running);
        info!("responder running");

        let reason = self.serve().await;

        self.transition(ResponderState::Stopping);
        info!(reason = ?reason, "responder stopping");

        let Self { socket, state, .. } = self;
        let closed = socket.close();
        state.send_replace(ResponderState::Stopped);
        closed?;

        info!("responder stopped");
        Ok(reason)
    }

    async fn serve(&self) -> StopReason {
        let mut buf = vec![0u8; MAX_MDNS_PACKET_SIZE];
        let mut consecutive_errors = 0u32;

        loop {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return StopReason::Cancelled,
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, source)) => {
                    consecutive_errors = 0;
                    self.handle_packet(&buf[..len], source).await;
                }
                Err(err) if is_closed(&err) => {
                    info!(error = %err, "socket closed");
                    return StopReason::SocketClosed;
                }
                Err(err) => {
                    ResponderStats::bump(&self.stats.receive_errors, RECEIVE_ERRORS);
                    consecutive_errors += 1;
                    if consecutive_errors >= self.max_consecutive_errors {
                        error!(
                            error = %err,
                            consecutive_errors,
                            "giving up after repeated receive failures"
                        );
                        return StopReason::TooManyReceiveErrors;
                    }
                    warn!(error = %err, consecutive_errors, "receive failed");
                }
            }
        }
    }

    /// Decode, match and answer one datagram.
    #[instrument(skip(self, packet), fields(len = packet.len()))]
    pub async fn handle_packet(&self, packet: &[u8], source: SocketAddr) {
        ResponderStats::bump(&self.stats.received, QUERIES_RECEIVED);
        debug!(%source, "received packet");

        let query = match decode_query(packet) {
            Ok(query) => query,
            Err(err) => {
                ResponderStats::bump(&self.stats.decode_errors, DECODE_ERRORS);
                debug!(%source, error = %err, "dropping undecodable packet");
                return;
            }
        };
        debug!(
            id = query.id(),
            name = %query.name(),
            kind = ?query.kind(),
            "decoded query"
        );

        let Some(response) = self.respond(&query) else {
            return;
        };

        match self.socket.send_to(&response, source).await {
            Ok(_) => debug!(%source, id = query.id(), bytes = response.len(), "sent answer"),
            Err(err) => {
                ResponderStats::bump(&self.stats.send_errors, SEND_ERRORS);
                warn!(%source, error = %err, "failed to send answer");
            }
        }
    }

    /// Build the reply for `query` against the snapshot current right now.
    fn respond(&self, query: &Query) -> Option<Vec<u8>> {
        let snapshot = self.store.current();

        let Some(answer) = match_query(query, &snapshot) else {
            ResponderStats::bump(&self.stats.unanswered, QUERIES_UNANSWERED);
            debug!(name = %query.name(), generation = snapshot.generation(), "no match");
            return None;
        };
        debug!(
            name = %query.name(),
            hostname = %answer.hostname,
            address = %answer.address,
            generation = snapshot.generation(),
            "matched query"
        );

        match encode_response(query, &answer) {
            Ok(bytes) => {
                ResponderStats::bump(&self.stats.answered, QUERIES_ANSWERED);
                Some(bytes)
            }
            Err(err) => {
                ResponderStats::bump(&self.stats.encode_errors, ENCODE_ERRORS);
                warn!(name = %query.name(), error = %err, "failed to encode answer");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::query::tests::query_bytes;
    use crate::network::socket::tests::{MockSocket, MockSocketHandle};
    use crate::registry::{RegistrySnapshot, ServiceRecord};
    use hickory_proto::op::Message;
    use hickory_proto::rr::RecordType;
    use hickory_proto::serialize::binary::BinDecodable;
    use std::io;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn querier() -> SocketAddr {
        "192.168.1.20:5353".parse().unwrap()
    }

    fn store() -> SnapshotStore {
        SnapshotStore::with_snapshot(RegistrySnapshot::new([ServiceRecord::new(
            "node1.local.",
            Ipv4Addr::new(10, 0, 0, 5),
        )
        .unwrap()]))
    }

    fn responder(max_errors: u32) -> (Responder<MockSocket>, MockSocketHandle, CancellationToken) {
        let (socket, handle) = MockSocket::new();
        let cancel = CancellationToken::new();
        let responder = Responder::new(socket, store(), cancel.clone(), max_errors);
        (responder, handle, cancel)
    }

    #[tokio::test]
    async fn should_fail_to_bind_on_unknown_interface() {
        let config = Config::new("hostcast-no-such-interface0");

        let result = Responder::bind(&config, store(), CancellationToken::new());

        assert!(matches!(result, Err(SetupError::NoInterface(_))));
    }

    #[tokio::test]
    async fn should_answer_known_hostname_to_source_address() {
        let (responder, handle, _cancel) = responder(8);

        responder
            .handle_packet(&query_bytes("node1.local.", RecordType::A, 11), querier())
            .await;

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, querier());
        let message = Message::from_bytes(&sent[0].0).unwrap();
        assert_eq!(message.id(), 11);
        assert_eq!(message.answers().len(), 1);
        assert_eq!(responder.stats().answered(), 1);
    }

    #[tokio::test]
    async fn should_stay_silent_for_unknown_hostname() {
        let (responder, handle, _cancel) = responder(8);

        responder
            .handle_packet(&query_bytes("node2.local.", RecordType::A, 11), querier())
            .await;

        assert_eq!(handle.sent_count(), 0);
        assert_eq!(responder.stats().unanswered(), 1);
    }

    #[tokio::test]
    async fn should_drop_garbage_without_replying() {
        let (responder, handle, _cancel) = responder(8);

        responder.handle_packet(&[0xde, 0xad, 0xbe], querier()).await;

        assert_eq!(handle.sent_count(), 0);
        assert_eq!(responder.stats().decode_errors(), 1);
    }

    #[tokio::test]
    async fn should_stop_and_close_when_cancelled() {
        let (responder, handle, cancel) = responder(8);
        let mut state = responder.subscribe_state();
        assert_eq!(*state.borrow(), ResponderState::Starting);

        let task = tokio::spawn(responder.run());
        state
            .wait_for(|s| *s == ResponderState::Running)
            .await
            .unwrap();

        cancel.cancel();
        let reason = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(*state.borrow(), ResponderState::Stopped);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn should_stop_when_socket_closes() {
        let (responder, handle, _cancel) = responder(8);
        handle.deliver(query_bytes("node1.local.", RecordType::A, 1), querier());
        handle.hang_up();

        let reason = responder.run().await.unwrap();

        assert_eq!(reason, StopReason::SocketClosed);
        assert_eq!(handle.sent_count(), 1);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn should_survive_transient_receive_errors() {
        let (responder, handle, _cancel) = responder(3);
        let stats = responder.stats();
        handle.fail(io::ErrorKind::ConnectionReset);
        handle.fail(io::ErrorKind::Interrupted);
        handle.deliver(query_bytes("node1.local.", RecordType::A, 1), querier());
        handle.fail(io::ErrorKind::ConnectionReset);
        handle.hang_up();

        let reason = responder.run().await.unwrap();

        assert_eq!(reason, StopReason::SocketClosed);
        assert_eq!(handle.sent_count(), 1);
        assert_eq!(stats.receive_errors(), 3);
    }

    #[tokio::test]
    async fn should_escalate_repeated_receive_errors() {
        let (responder, handle, _cancel) = responder(3);
        for _ in 0..3 {
            handle.fail(io::ErrorKind::Other);
        }

        let reason = responder.run().await.unwrap();

        assert_eq!(reason, StopReason::TooManyReceiveErrors);
        assert!(handle.is_closed());
    }
}
