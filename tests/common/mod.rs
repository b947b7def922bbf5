#![allow(dead_code)]

use bytes::Bytes;
use matter_attr_write::{
    interaction_model::{
        AttributeStatusIB, InteractionModelProtocolOpCode, StatusIB, StatusResponseMessage,
        WriteRequestMessage, WriteResponseMessage,
    },
    message::{
        status_report::StatusReport, ExchangeFlags, Message, MessageHeader, ProtocolHeader,
        ProtocolID, ProtocolOpCode, SecureChannelProtocolOpCode,
    },
    transport::{
        memory::{MemorySink, MemorySource},
        FrameSink, FrameSource, Link, MemoryLink,
    },
};

pub fn init_env_logger() {
    let _ = env_logger::try_init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
}

pub const IM_WRITE_REQUEST: ProtocolOpCode =
    ProtocolOpCode::InteractionModel(InteractionModelProtocolOpCode::WriteRequest);
pub const IM_TIMED_REQUEST: ProtocolOpCode =
    ProtocolOpCode::InteractionModel(InteractionModelProtocolOpCode::TimedRequest);
pub const STANDALONE_ACK: ProtocolOpCode =
    ProtocolOpCode::SecureChannel(SecureChannelProtocolOpCode::MRPStandaloneAck);

/// The remote end of a session, scripted by the test.
pub struct FakeNode {
    sink: MemorySink,
    source: MemorySource,
    counter: u32,
}

impl FakeNode {
    pub fn new(link: MemoryLink) -> Self {
        let (sink, source) = link.split();
        Self {
            sink,
            source,
            counter: 100,
        }
    }

    /// Next message sent by the session, acks included.
    pub async fn recv(&mut self) -> Message {
        let frame = self
            .source
            .recv_frame()
            .await
            .unwrap()
            .expect("session closed the link");
        Message::decode(&frame).unwrap()
    }

    /// Next message that isn't a standalone ack.
    pub async fn recv_request(&mut self) -> Message {
        loop {
            let message = self.recv().await;
            if message.payload_header.opcode().unwrap() != STANDALONE_ACK {
                return message;
            }
        }
    }

    pub async fn send_frame(&mut self, frame: Bytes) {
        self.sink.send_frame(frame).await.unwrap();
    }

    pub async fn send(&mut self, mut message: Message) -> u32 {
        self.counter += 1;
        message.message_header.message_counter = self.counter;
        self.send_frame(message.encode().unwrap()).await;
        self.counter
    }

    /// Answer `request` on its exchange, acknowledging it. Returns the
    /// counter of the answer.
    pub async fn respond(
        &mut self,
        request: &Message,
        opcode: InteractionModelProtocolOpCode,
        payload: Bytes,
    ) -> u32 {
        self.send(answer(request, opcode, payload)).await
    }

    /// Acknowledge `request` without answering it.
    pub async fn ack(&mut self, request: &Message) -> u32 {
        self.send(request.standalone_ack()).await
    }

    /// Answer a write request with one status per path, in path order.
    pub async fn write_response(&mut self, request: &Message, statuses: &[u8]) -> u32 {
        self.send(write_response(request, statuses)).await
    }

    pub async fn status_response(&mut self, request: &Message, status: u8) -> u32 {
        self.respond(
            request,
            InteractionModelProtocolOpCode::StatusResponse,
            StatusResponseMessage { status }.encode(),
        )
        .await
    }

    /// Tell the session the node is closing it.
    pub async fn close_session(&mut self, session_id: u16) {
        let header = ProtocolHeader {
            exchange_flags: ExchangeFlags::INITIATOR | ExchangeFlags::RELIABILITY,
            protocol_opcode: SecureChannelProtocolOpCode::StatusReport as u8,
            exchange_id: 0x7777,
            protocol_id: ProtocolID::SecureChannel as u16,
            protocol_vendor_id: None,
            ack_message_counter: None,
        };
        let message = Message::new(
            MessageHeader::new(session_id),
            header,
            StatusReport::close_session().to_payload(),
        );
        self.send(message).await;
    }
}

/// A reliable answer to `request` on its exchange, carrying its ack.
pub fn answer(request: &Message, opcode: InteractionModelProtocolOpCode, payload: Bytes) -> Message {
    let header = ProtocolHeader {
        exchange_flags: ExchangeFlags::RELIABILITY | ExchangeFlags::ACKNOWLEDGE,
        protocol_opcode: opcode as u8,
        exchange_id: request.payload_header.exchange_id,
        protocol_id: ProtocolID::InteractionModel as u16,
        protocol_vendor_id: None,
        ack_message_counter: Some(request.message_header.message_counter),
    };
    Message::new(
        MessageHeader::new(request.message_header.session_id),
        header,
        payload,
    )
}

/// A `WriteResponse` to `request` with one status per path, in path order.
pub fn write_response(request: &Message, statuses: &[u8]) -> Message {
    let write = WriteRequestMessage::from_tlv(&request.payload).unwrap();
    assert_eq!(write.write_requests.len(), statuses.len());
    let response = WriteResponseMessage {
        write_responses: write
            .write_requests
            .iter()
            .zip(statuses)
            .map(|(data, status)| AttributeStatusIB {
                path: data.path,
                status: StatusIB {
                    status: *status,
                    cluster_status: None,
                },
            })
            .collect(),
    };
    answer(
        request,
        InteractionModelProtocolOpCode::WriteResponse,
        response.encode(),
    )
}
