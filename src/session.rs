//! One ordered channel to one remote node.
//!
//! A session owns two tasks. The writer drains the outbound queue, stamps
//! message counters and sends frames in queue order, so writes leave in the
//! order they were submitted. The reader decodes whatever the node sends,
//! acknowledges it and routes responses to the pending writes by exchange id.
//!
//! ```text
//! Connecting -> Ready -> Closing -> Closed
//! ```
//!
//! Only a `Ready` session accepts writes. Teardown, whatever its cause, fails
//! every pending write with the cause.

use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, watch},
    time::{sleep, Instant},
};

use crate::{
    builder::EncodedWrite,
    callback::WriteCallback,
    config::SessionConfig,
    dispatcher::{CompletionDispatcher, WriteOutcome},
    error::{SessionError, WriteError},
    exchange::{Exchange, ExchangeTable, MessageCounter, Stage},
    interaction_model::{
        InteractionModelProtocolOpCode, StatusIB, StatusResponseMessage, TimedRequestMessage,
        WriteResponseMessage,
    },
    message::{
        status_report::StatusReport, ExchangeFlags, Message, MessageHeader, ProtocolHeader,
        ProtocolOpCode, SecureChannelProtocolOpCode,
    },
    pending::{CorrelationId, PendingTable},
    transport::{is_transient, FrameSink, FrameSource, Link},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ready,
    Closing,
    Closed,
}

impl SessionState {
    fn is_closing(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }
}

struct SubmitState {
    next_sequence: u64,
    exchanges: ExchangeTable,
}

/// What to do with a status answer once the exchange lock is released.
enum StatusAction {
    SendWrite(Message),
    Complete(CorrelationId, WriteOutcome),
    WindowLapsed(CorrelationId),
    Stale,
}

struct Shared {
    node_id: u64,
    session_id: u16,
    config: SessionConfig,
    pending: PendingTable,
    dispatcher: CompletionDispatcher,
    // Held while submitting and while tearing down, so no write can slip
    // into the table after it was drained
    submit: Mutex<SubmitState>,
    state: watch::Sender<SessionState>,
}

/// Handle to a session. Clones share the session, and it closes once the
/// last handle is dropped.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Session {
    /// Start a session with `node_id` over `link`. The link is expected to
    /// already be authenticated. Spawns the session's tasks, so it must be
    /// called from within a tokio runtime.
    pub fn connect<L: Link>(node_id: u64, link: L, config: SessionConfig) -> Session {
        let pending = PendingTable::new();
        let (state, _) = watch::channel(SessionState::Connecting);
        let shared = Arc::new(Shared {
            node_id,
            // Nonzero, zero is the unsecured session
            session_id: rand::random::<u16>().max(1),
            config,
            dispatcher: CompletionDispatcher::new(pending.clone()),
            pending,
            submit: Mutex::new(SubmitState {
                next_sequence: 0,
                exchanges: ExchangeTable::new(),
            }),
            state,
        });
        info!("Connecting to node {node_id:#018x}");

        let (sink, source) = link.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(shared.clone(), sink, outbound_rx));
        tokio::spawn(run_reader(shared.clone(), source, outbound.downgrade()));

        shared.state.send_replace(SessionState::Ready);
        info!(
            "Session {:#06x} with node {node_id:#018x} is ready",
            shared.session_id
        );
        Session { shared, outbound }
    }

    pub fn node_id(&self) -> u64 {
        self.shared.node_id
    }

    /// Id carried in the header of every message of this session.
    pub fn session_id(&self) -> u16 {
        self.shared.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Writes submitted and not yet completed.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Queue `write` for transmission and return without waiting. `callback`
    /// receives the outcome once the node answers, `deadline` passes (the
    /// configured response timeout if `None`) or the session goes down.
    ///
    /// On error the write was not queued and `callback` is dropped unused.
    pub fn submit(
        &self,
        write: EncodedWrite,
        callback: Box<dyn WriteCallback>,
        deadline: Option<Duration>,
    ) -> Result<CorrelationId, SessionError> {
        let shared = &self.shared;
        let mut submit = shared.lock_submit();
        let state = *shared.state.borrow();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady(state));
        }

        // Exchanges of writes that expired or were never answered
        submit
            .exchanges
            .retain(|correlation| shared.pending.contains(correlation));
        let exchange_id = submit
            .exchanges
            .allocate()
            .ok_or(SessionError::ExchangesExhausted)?;
        let sequence = submit.next_sequence;
        submit.next_sequence += 1;

        let deadline = deadline.unwrap_or_else(|| shared.config.response_timeout());
        let correlation = shared.pending.register(callback, deadline);

        let request = shared.message(
            InteractionModelProtocolOpCode::WriteRequest,
            exchange_id,
            write.payload().clone(),
        );
        let first = match write.timed_expiry() {
            Some(expiry) => {
                let timed = TimedRequestMessage {
                    timeout_ms: u16::try_from(expiry.as_millis()).unwrap_or(u16::MAX),
                };
                submit.exchanges.insert(
                    exchange_id,
                    Exchange::timed(correlation, sequence, request, Instant::now() + expiry),
                );
                shared.message(
                    InteractionModelProtocolOpCode::TimedRequest,
                    exchange_id,
                    timed.encode(),
                )
            }
            None => {
                submit
                    .exchanges
                    .insert(exchange_id, Exchange::write(correlation, sequence));
                request
            }
        };
        debug!(
            "Write {correlation} (seq {sequence}) to {:?} on exchange {exchange_id:#06x}",
            write.paths()
        );

        if self.outbound.send(first).is_err() {
            // The writer is gone, a teardown is underway
            drop(submit);
            shared
                .pending
                .resolve(correlation, Err(WriteError::ConnectionLost));
        }
        Ok(correlation)
    }

    /// Stop caring about a write. Its callback won't be invoked, but the
    /// write still occupies the table until it completes or expires.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        self.shared.pending.cancel(id)
    }

    /// Tear the session down, failing pending writes with
    /// [`WriteError::SessionClosed`].
    pub fn close(&self) {
        self.shared.teardown(WriteError::SessionClosed);
    }

    /// Wait until the session has reached [`SessionState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.subscribe_state();
        loop {
            let closed = *state.borrow_and_update() == SessionState::Closed;
            if closed || state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("node_id", &self.shared.node_id)
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state())
            .field("pending", &self.shared.pending)
            .finish()
    }
}

impl Shared {
    fn lock_submit(&self) -> MutexGuard<'_, SubmitState> {
        self.submit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn message(
        &self,
        opcode: InteractionModelProtocolOpCode,
        exchange_id: u16,
        payload: Bytes,
    ) -> Message {
        Message::new(
            MessageHeader::new(self.session_id),
            ProtocolHeader::interaction_model(opcode, exchange_id),
            payload,
        )
    }

    fn teardown(&self, reason: WriteError) {
        {
            let mut submit = self.lock_submit();
            if self.state.borrow().is_closing() {
                return;
            }
            self.state.send_replace(SessionState::Closing);
            submit.exchanges.clear();
        }
        match reason {
            WriteError::SessionClosed => info!("Closing session with node {:#018x}", self.node_id),
            _ => error!("Closing session with node {:#018x}: {reason}", self.node_id),
        }

        let failed = self.pending.drain(reason);
        if failed > 0 {
            warn!("Failed {failed} pending writes to node {:#018x}", self.node_id);
        }
        self.state.send_replace(SessionState::Closed);
        info!("Session with node {:#018x} closed", self.node_id);
    }

    /// Whether retrying a frame on `exchange_id` is pointless or unsafe:
    /// the node acknowledged it, or nobody is waiting on the outcome.
    fn is_settled(&self, exchange_id: u16) -> bool {
        if self.state.borrow().is_closing() {
            return true;
        }
        match self.lock_submit().exchanges.get(exchange_id) {
            Some(exchange) => exchange.acked || !self.pending.contains(exchange.correlation),
            None => true,
        }
    }

    fn on_frame(&self, frame: &[u8], outbound: &mpsc::WeakUnboundedSender<Message>) {
        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping undecodable frame from node {:#018x}: {e}", self.node_id);
                return;
            }
        };
        if message.message_header.session_id != self.session_id {
            warn!(
                "Dropping message for session {:#06x} on session {:#06x}",
                message.message_header.session_id, self.session_id
            );
            return;
        }
        let exchange_id = message.payload_header.exchange_id;
        // Exchanges the node opened share the id space with ours
        let responds = !message
            .payload_header
            .exchange_flags
            .contains(ExchangeFlags::INITIATOR);
        if responds && message.payload_header.ack_message_counter.is_some() {
            if let Some(exchange) = self.lock_submit().exchanges.get_mut(exchange_id) {
                exchange.acked = true;
            }
        }

        let reply = match message.payload_header.opcode() {
            Ok(ProtocolOpCode::InteractionModel(InteractionModelProtocolOpCode::WriteResponse))
                if responds =>
            {
                self.on_write_response(&message);
                None
            }
            Ok(ProtocolOpCode::InteractionModel(InteractionModelProtocolOpCode::StatusResponse))
                if responds =>
            {
                self.on_status_response(&message)
            }
            Ok(ProtocolOpCode::SecureChannel(SecureChannelProtocolOpCode::StatusReport)) => {
                self.on_status_report(&message);
                None
            }
            Ok(ProtocolOpCode::SecureChannel(SecureChannelProtocolOpCode::MRPStandaloneAck)) => {
                None
            }
            Ok(opcode) => {
                debug!("Ignoring {opcode:?} on exchange {exchange_id:#06x}");
                None
            }
            Err(e) => {
                warn!("Dropping message from node {:#018x}: {e}", self.node_id);
                None
            }
        };

        // A follow-up on the same exchange carries the ack, otherwise it
        // goes on its own
        let ack = message.next_ack();
        let reply = match reply {
            Some(mut reply) => {
                reply.with_ack(ack);
                Some(reply)
            }
            None => ack.map(|_| message.standalone_ack()),
        };
        if let Some(reply) = reply {
            match outbound.upgrade() {
                Some(outbound) => {
                    let _ = outbound.send(reply);
                }
                None => debug!("Session handles are gone, not answering"),
            }
        }
    }

    fn on_write_response(&self, message: &Message) {
        let response = match WriteResponseMessage::from_tlv(&message.payload) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping malformed write response: {e}");
                return;
            }
        };
        let exchange_id = message.payload_header.exchange_id;
        let exchange = self.lock_submit().exchanges.remove(exchange_id);
        match exchange {
            Some(exchange) => {
                debug!(
                    "Write {} (seq {}) answered on exchange {exchange_id:#06x}",
                    exchange.correlation, exchange.sequence
                );
                self.dispatcher.on_response(
                    exchange.correlation,
                    WriteOutcome::from_write_response(&response),
                );
            }
            None => debug!("No write waiting on exchange {exchange_id:#06x}, dropping response"),
        }
    }

    /// A status answers either the `TimedRequest` of a timed write or the
    /// write itself. Returns the deferred write when the timed window opened.
    fn on_status_response(&self, message: &Message) -> Option<Message> {
        let response = match StatusResponseMessage::from_tlv(&message.payload) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping malformed status response: {e}");
                return None;
            }
        };
        let outcome = WriteOutcome::from_status(StatusIB {
            status: response.status,
            cluster_status: None,
        });
        let exchange_id = message.payload_header.exchange_id;

        let action = {
            let mut submit = self.lock_submit();
            match submit.exchanges.remove(exchange_id) {
                None => StatusAction::Stale,
                Some(exchange) if !self.pending.contains(exchange.correlation) => {
                    StatusAction::Stale
                }
                Some(mut exchange) => match (exchange.stage, outcome) {
                    (
                        Stage::AwaitingTimedAck {
                            write,
                            window_closes,
                        },
                        WriteOutcome::Success,
                    ) => {
                        if Instant::now() >= window_closes {
                            StatusAction::WindowLapsed(exchange.correlation)
                        } else {
                            exchange.stage = Stage::AwaitingWriteResponse;
                            exchange.acked = false;
                            submit.exchanges.insert(exchange_id, exchange);
                            StatusAction::SendWrite(write)
                        }
                    }
                    (_, outcome) => StatusAction::Complete(exchange.correlation, outcome),
                },
            }
        };

        match action {
            StatusAction::SendWrite(write) => {
                debug!("Timed window open on exchange {exchange_id:#06x}, sending write");
                return Some(write);
            }
            StatusAction::Complete(correlation, outcome) => {
                self.dispatcher.on_response(correlation, outcome);
            }
            StatusAction::WindowLapsed(correlation) => {
                warn!("Timed window of write {correlation} lapsed before the node accepted it");
                self.pending.resolve(correlation, Err(WriteError::Timeout));
            }
            StatusAction::Stale => {
                debug!("No write waiting on exchange {exchange_id:#06x}, dropping status")
            }
        }
        None
    }

    fn on_status_report(&self, message: &Message) {
        match StatusReport::from_payload(&message.payload) {
            Ok(report) if report.is_close_session() => {
                info!("Node {:#018x} closed the session", self.node_id);
                self.teardown(WriteError::SessionClosed);
            }
            Ok(report) => debug!("Ignoring status report {report:?}"),
            Err(e) => warn!("Dropping malformed status report: {e}"),
        }
    }
}

/// Resolves once the session starts closing.
async fn closing(state: &mut watch::Receiver<SessionState>) {
    loop {
        let closing = state.borrow_and_update().is_closing();
        if closing || state.changed().await.is_err() {
            return;
        }
    }
}

async fn run_writer<S: FrameSink>(
    shared: Arc<Shared>,
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let mut counter = MessageCounter::new();
    let mut state = shared.state.subscribe();
    loop {
        let message = tokio::select! {
            biased;
            () = closing(&mut state) => return,
            message = outbound.recv() => message,
        };
        let Some(mut message) = message else {
            debug!("Every handle to the session with node {:#018x} is gone", shared.node_id);
            shared.teardown(WriteError::SessionClosed);
            return;
        };

        message.message_header.message_counter = counter.next();
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                // The write will run into its deadline
                error!(
                    "Cannot frame message on exchange {:#06x}: {e}",
                    message.payload_header.exchange_id
                );
                continue;
            }
        };
        if let Err(e) = send_with_retry(&shared, &mut sink, &message, frame).await {
            error!("Lost link to node {:#018x}: {e}", shared.node_id);
            shared.teardown(WriteError::ConnectionLost);
            return;
        }
    }
}

/// Send `frame`, retrying transient failures with backoff (4.12.2.1) for as
/// long as the node hasn't acknowledged anything on its exchange.
async fn send_with_retry<S: FrameSink>(
    shared: &Shared,
    sink: &mut S,
    message: &Message,
    frame: Bytes,
) -> io::Result<()> {
    let exchange_id = message.payload_header.exchange_id;
    let counter = message.message_header.message_counter;
    let mut attempt = 1;
    loop {
        match sink.send_frame(frame.clone()).await {
            Ok(()) => {
                debug!("Sent message {counter} on exchange {exchange_id:#06x}");
                return Ok(());
            }
            Err(e) if is_transient(&e) && attempt < shared.config.max_transmissions => {
                let delay = shared.config.backoff(attempt);
                warn!("Sending message {counter} failed ({e}), retry {attempt} in {delay:?}");
                sleep(delay).await;
                if shared.is_settled(exchange_id) {
                    debug!("Exchange {exchange_id:#06x} settled, not retrying message {counter}");
                    return Ok(());
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn run_reader<S: FrameSource>(
    shared: Arc<Shared>,
    mut source: S,
    outbound: mpsc::WeakUnboundedSender<Message>,
) {
    let mut state = shared.state.subscribe();
    loop {
        let frame = tokio::select! {
            biased;
            () = closing(&mut state) => return,
            frame = source.recv_frame() => frame,
        };
        match frame {
            Ok(Some(frame)) => shared.on_frame(&frame, &outbound),
            Ok(None) => {
                error!("Node {:#018x} closed the link", shared.node_id);
                shared.teardown(WriteError::ConnectionLost);
                return;
            }
            Err(e) if is_transient(&e) => warn!("Receiving from node {:#018x}: {e}", shared.node_id),
            Err(e) => {
                error!("Lost link to node {:#018x}: {e}", shared.node_id);
                shared.teardown(WriteError::ConnectionLost);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        builder::build,
        callback::completion,
        data_model::{AttributePath, AttributeType, IntWidth, ValueType},
        transport::MemoryLink,
    };

    fn on_off_write() -> EncodedWrite {
        build(
            AttributePath::new(1, 0x0006, 0x4001),
            &json!(30),
            AttributeType::new(ValueType::UInt(IntWidth::W16)),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_requires_ready() {
        let (link, _node) = MemoryLink::pair();
        let session = Session::connect(0x2A, link, SessionConfig::default());
        assert_eq!(session.state(), SessionState::Ready);

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        let (callback, _completion) = completion();
        assert_eq!(
            session.submit(on_off_write(), callback, None),
            Err(SessionError::NotReady(SessionState::Closed))
        );
    }

    #[tokio::test]
    async fn test_close_fails_pending() {
        let (link, node) = MemoryLink::pair();
        let (_node_sink, mut node_source) = node.split();
        let session = Session::connect(0x2A, link, SessionConfig::default());

        let (callback, completion) = completion();
        session.submit(on_off_write(), callback, None).unwrap();
        let frame = node_source.recv_frame().await.unwrap().unwrap();
        let message = Message::decode(&frame).unwrap();
        assert_eq!(
            message.payload_header.opcode().unwrap(),
            ProtocolOpCode::InteractionModel(InteractionModelProtocolOpCode::WriteRequest)
        );

        session.close();
        assert_eq!(completion.wait().await, Err(WriteError::SessionClosed));
        assert_eq!(session.pending_count(), 0);
        session.closed().await;
    }

    #[tokio::test]
    async fn test_dropping_handles_closes() {
        let (link, _node) = MemoryLink::pair();
        let session = Session::connect(0x2A, link, SessionConfig::default());
        let mut state = session.subscribe_state();
        drop(session);
        closing(&mut state).await;
    }
}
