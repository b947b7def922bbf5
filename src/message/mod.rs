use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;

use crate::{
    constants::UDP_MESSAGE_LIMIT, error::FrameError,
    interaction_model::InteractionModelProtocolOpCode,
};

pub mod status_report;

/// Message format (4.4)
///
/// Message Header
/// - 01 Flag
/// - 02 Session ID
/// - 01 Security Flags
/// - 04 Message Counter
/// - 00/08 Source Node ID [opt]
/// - 00/02/08 - Destination Node ID [opt]
///
/// Proto Header
/// - 01 Exchange Flags
/// - 01 Protocol OpCode
/// - 02 Exchange ID
/// - 02 Protocol ID
/// - 02 Protocol Vendor ID [opt]
/// - 04 Ack Message Counter [opt]
/// - vr Secured Extensions [opt]
///
/// Application Payload
///
/// Sessions are assumed to be secured below the link, so payloads travel in
/// the clear and no integrity check is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_header: MessageHeader,
    pub payload_header: ProtocolHeader,
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        message_header: MessageHeader,
        payload_header: ProtocolHeader,
        payload: Bytes,
    ) -> Self {
        Self {
            message_header,
            payload_header,
            payload,
        }
    }

    /// Create a message for a standalone acknowledgement of this one (4.12.7.1)
    pub fn standalone_ack(&self) -> Self {
        let header = &self.message_header;
        let received = &self.payload_header;
        let mut exchange_flags = ExchangeFlags::ACKNOWLEDGE;
        // The ack travels the other way on the same exchange
        exchange_flags.set(
            ExchangeFlags::INITIATOR,
            !received.exchange_flags.contains(ExchangeFlags::INITIATOR),
        );
        Self {
            message_header: MessageHeader {
                session_id: header.session_id,
                security_flags: header.security_flags,
                message_counter: 0,
                source_node_id: match header.dest_node_id {
                    Some(NodeID::Unique(node_id)) => Some(node_id),
                    _ => None,
                },
                dest_node_id: header.source_node_id.map(NodeID::Unique),
            },
            payload_header: ProtocolHeader {
                exchange_flags,
                protocol_opcode: SecureChannelProtocolOpCode::MRPStandaloneAck as u8,
                exchange_id: received.exchange_id,
                protocol_id: ProtocolID::SecureChannel as u16,
                protocol_vendor_id: None,
                ack_message_counter: Some(header.message_counter),
            },
            payload: Bytes::new(),
        }
    }

    /// Add an acknowledgement to the message. Useful to add after construction.
    pub fn with_ack(&mut self, ack: Option<u32>) {
        self.payload_header
            .exchange_flags
            .set(ExchangeFlags::ACKNOWLEDGE, ack.is_some());
        self.payload_header.ack_message_counter = ack;
    }

    /// Get the counter to acknowledge if the sender asked for one
    pub fn next_ack(&self) -> Option<u32> {
        self.payload_header
            .exchange_flags
            .contains(ExchangeFlags::RELIABILITY)
            .then_some(self.message_header.message_counter)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, FrameError> {
        let message_header = MessageHeader::decode(&mut buf)?;
        let payload_header = ProtocolHeader::decode(&mut buf)?;
        Ok(Self {
            message_header,
            payload_header,
            payload: Bytes::copy_from_slice(buf),
        })
    }

    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut out = BytesMut::with_capacity(64 + self.payload.len());
        self.message_header.encode(&mut out);
        self.payload_header.encode(&mut out);
        out.put_slice(&self.payload);
        if out.len() > UDP_MESSAGE_LIMIT {
            return Err(FrameError::TooLarge(out.len()));
        }
        Ok(out.freeze())
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub session_id: u16,
    pub security_flags: SecurityFlags,
    pub message_counter: u32,
    pub source_node_id: Option<u64>,
    pub dest_node_id: Option<NodeID>,
}

impl MessageHeader {
    pub fn new(session_id: u16) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    /// Flags are derived from which node ids are present
    pub fn message_flags(&self) -> MessageFlags {
        let mut flags = MessageFlags::FORMAT_V1;
        flags.set(
            MessageFlags::SOURCE_NODE_ID_PRESENT,
            self.source_node_id.is_some(),
        );
        match self.dest_node_id {
            Some(NodeID::Unique(_)) => flags |= MessageFlags::DSIZ_64_BIT_NODE_ID,
            Some(NodeID::Group(_)) => flags |= MessageFlags::DSIZ_16_BIT_GROUP_ID,
            None => {}
        }
        flags
    }

    pub fn encode(&self, target: &mut BytesMut) {
        target.put_u8(self.message_flags().bits());
        target.put_u16_le(self.session_id);
        target.put_u8(self.security_flags.bits());
        target.put_u32_le(self.message_counter);
        if let Some(val) = self.source_node_id {
            target.put_u64_le(val);
        }
        match self.dest_node_id {
            Some(NodeID::Group(val)) => target.put_u16_le(val),
            Some(NodeID::Unique(val)) => target.put_u64_le(val),
            None => {}
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, FrameError> {
        need(*buf, 8)?;
        let flags = buf.get_u8();
        let message_flags = MessageFlags::from_bits_retain(flags);
        if message_flags.intersects(MessageFlags::FORMAT_INVALID) {
            return Err(FrameError::InvalidVersion(flags));
        }

        let session_id = buf.get_u16_le();
        let security_flags = SecurityFlags::from_bits_retain(buf.get_u8());
        // Message extensions (4.4.1.8)
        if security_flags.contains(SecurityFlags::MESSAGE_EXT) {
            return Err(FrameError::ExtensionsUnsupported);
        }
        let message_counter = buf.get_u32_le();

        let source_node_id = if message_flags.contains(MessageFlags::SOURCE_NODE_ID_PRESENT) {
            need(*buf, 8)?;
            Some(buf.get_u64_le())
        } else {
            None
        };

        // Reserved DSIZ messages are dropped without an ack (4.4.1.2)
        let dsiz = message_flags & MessageFlags::DSIZ_RESERVED;
        let dest_node_id = if dsiz == MessageFlags::DSIZ_RESERVED {
            return Err(FrameError::InvalidDestination(flags));
        } else if dsiz == MessageFlags::DSIZ_64_BIT_NODE_ID {
            need(*buf, 8)?;
            Some(NodeID::Unique(buf.get_u64_le()))
        } else if dsiz == MessageFlags::DSIZ_16_BIT_GROUP_ID {
            need(*buf, 2)?;
            Some(NodeID::Group(buf.get_u16_le()))
        } else {
            None
        };

        Ok(Self {
            session_id,
            security_flags,
            message_counter,
            source_node_id,
            dest_node_id,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub exchange_flags: ExchangeFlags,
    pub protocol_opcode: u8,
    pub exchange_id: u16,
    pub protocol_id: u16,
    pub protocol_vendor_id: Option<u16>,
    pub ack_message_counter: Option<u32>,
}

impl ProtocolHeader {
    /// Header for a reliable interaction model message sent as the initiator
    /// of `exchange_id`.
    pub fn interaction_model(opcode: InteractionModelProtocolOpCode, exchange_id: u16) -> Self {
        Self {
            exchange_flags: ExchangeFlags::INITIATOR | ExchangeFlags::RELIABILITY,
            protocol_opcode: opcode as u8,
            exchange_id,
            protocol_id: ProtocolID::InteractionModel as u16,
            protocol_vendor_id: None,
            ack_message_counter: None,
        }
    }

    pub fn opcode(&self) -> Result<ProtocolOpCode, FrameError> {
        let unknown = FrameError::UnknownOpcode {
            protocol: self.protocol_id,
            opcode: self.protocol_opcode,
        };
        match ProtocolID::from_u16(self.protocol_id) {
            Some(ProtocolID::SecureChannel) => {
                SecureChannelProtocolOpCode::from_u8(self.protocol_opcode)
                    .map(ProtocolOpCode::SecureChannel)
                    .ok_or(unknown)
            }
            Some(ProtocolID::InteractionModel) => {
                InteractionModelProtocolOpCode::from_u8(self.protocol_opcode)
                    .map(ProtocolOpCode::InteractionModel)
                    .ok_or(unknown)
            }
            _ => Err(unknown),
        }
    }

    pub fn encode(&self, out: &mut BytesMut) {
        let mut flags = self.exchange_flags;
        flags.set(ExchangeFlags::VENDOR, self.protocol_vendor_id.is_some());
        flags.set(ExchangeFlags::ACKNOWLEDGE, self.ack_message_counter.is_some());
        out.put_u8(flags.bits());
        out.put_u8(self.protocol_opcode);
        out.put_u16_le(self.exchange_id);
        out.put_u16_le(self.protocol_id);
        if let Some(vendor_id) = self.protocol_vendor_id {
            out.put_u16_le(vendor_id);
        }
        if let Some(ack) = self.ack_message_counter {
            out.put_u32_le(ack);
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self, FrameError> {
        if buf.is_empty() {
            return Err(FrameError::MissingProtocolHeader);
        }
        need(*buf, 6)?;
        let exchange_flags = ExchangeFlags::from_bits_truncate(buf.get_u8());
        let protocol_opcode = buf.get_u8();
        let exchange_id = buf.get_u16_le();
        let protocol_id = buf.get_u16_le();
        let protocol_vendor_id = if exchange_flags.contains(ExchangeFlags::VENDOR) {
            need(*buf, 2)?;
            Some(buf.get_u16_le())
        } else {
            None
        };
        let ack_message_counter = if exchange_flags.contains(ExchangeFlags::ACKNOWLEDGE) {
            need(*buf, 4)?;
            Some(buf.get_u32_le())
        } else {
            None
        };
        if exchange_flags.contains(ExchangeFlags::SECURED_EXT) {
            need(*buf, 2)?;
            let len = buf.get_u16_le() as usize;
            need(*buf, len)?;
            buf.advance(len);
        }

        Ok(Self {
            exchange_flags: exchange_flags - ExchangeFlags::SECURED_EXT,
            protocol_opcode,
            exchange_id,
            protocol_id,
            protocol_vendor_id,
            ack_message_counter,
        })
    }
}

fn need(buf: &[u8], len: usize) -> Result<(), FrameError> {
    if buf.remaining() < len {
        Err(FrameError::Truncated)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeID {
    Unique(u64),
    Group(u16),
}

bitflags! {
    #[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
    pub struct MessageFlags: u8 {
        const FORMAT_V1 = 0b00000000;
        const SOURCE_NODE_ID_PRESENT = 0b00000100;
        const DSIZ_64_BIT_NODE_ID = 0b00000001;
        const DSIZ_16_BIT_GROUP_ID = 0b00000010;
        /// Messages with this flag shall be dropped without an ack
        const DSIZ_RESERVED = 0b00000011;

        // Validation
        const FORMAT_INVALID = 0b11110000;
    }
}

bitflags! {
    #[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
    pub struct SecurityFlags: u8 {
        const PRIVACY = 0b10000000;
        const CONTROL = 0b01000000;
        const MESSAGE_EXT = 0b00100000;
        const SESSION_GROUP = 0b00000001;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ExchangeFlags: u8 {
        const INITIATOR = 0b00000001;
        const ACKNOWLEDGE = 0b00000010;
        const RELIABILITY = 0b00000100;
        const SECURED_EXT = 0b00001000;
        const VENDOR = 0b00010000;
    }
}

#[repr(u16)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolID {
    SecureChannel = 0x0000,
    InteractionModel = 0x0001,
    BDX = 0x0002,
    UserDirectedComm = 0x0003,
    ForTesting = 0x0004,
}

/// Secure channel opcodes this crate sends or reacts to (4.11.1)
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureChannelProtocolOpCode {
    MsgCounterSyncReq = 0x00,
    MsgCounterSyncRsp = 0x01,
    MRPStandaloneAck = 0x10,
    StatusReport = 0x40,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolOpCode {
    SecureChannel(SecureChannelProtocolOpCode),
    InteractionModel(InteractionModelProtocolOpCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_request(counter: u32) -> Message {
        let mut header = MessageHeader::new(0x1234);
        header.message_counter = counter;
        header.source_node_id = Some(0x01);
        header.dest_node_id = Some(NodeID::Unique(0x2A));
        Message::new(
            header,
            ProtocolHeader::interaction_model(InteractionModelProtocolOpCode::WriteRequest, 0x0B0A),
            Bytes::from_static(&[0x15, 0x18]),
        )
    }

    #[test]
    fn test_encode() {
        let bytes = write_request(7).encode().unwrap();
        assert_eq!(
            &bytes[..],
            &hex_literal::hex!(
                "05 3412 00 07000000 0100000000000000 2a00000000000000 05 06 0a0b 0100 1518"
            )[..]
        );
    }

    #[test]
    fn test_decode() {
        let message = write_request(7);
        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(
            decoded.payload_header.opcode(),
            Ok(ProtocolOpCode::InteractionModel(
                InteractionModelProtocolOpCode::WriteRequest
            ))
        );
        assert_eq!(decoded.next_ack(), Some(7));
    }

    #[test]
    fn test_standalone_ack() {
        // Response from the node on an exchange we initiated
        let mut header = MessageHeader::new(0x1234);
        header.message_counter = 99;
        header.source_node_id = Some(0x2A);
        header.dest_node_id = Some(NodeID::Unique(0x01));
        let mut payload_header =
            ProtocolHeader::interaction_model(InteractionModelProtocolOpCode::WriteResponse, 5);
        payload_header.exchange_flags = ExchangeFlags::RELIABILITY;
        let response = Message::new(header, payload_header, Bytes::new());

        let ack = response.standalone_ack();
        assert_eq!(ack.payload_header.ack_message_counter, Some(99));
        assert_eq!(ack.payload_header.exchange_id, 5);
        assert!(ack.payload_header.exchange_flags.contains(ExchangeFlags::INITIATOR));
        assert!(!ack.payload_header.exchange_flags.contains(ExchangeFlags::RELIABILITY));
        assert_eq!(ack.message_header.source_node_id, Some(0x01));
        assert_eq!(ack.message_header.dest_node_id, Some(NodeID::Unique(0x2A)));
        assert_eq!(
            ack.payload_header.opcode(),
            Ok(ProtocolOpCode::SecureChannel(
                SecureChannelProtocolOpCode::MRPStandaloneAck
            ))
        );

        let decoded = Message::decode(&ack.encode().unwrap()).unwrap();
        assert_eq!(decoded.payload_header.ack_message_counter, Some(99));
        assert_eq!(decoded.next_ack(), None);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Message::decode(&[0x00, 0x00]), Err(FrameError::Truncated));
        assert_eq!(
            Message::decode(&hex_literal::hex!("10 0000 00 00000000")),
            Err(FrameError::InvalidVersion(0x10))
        );
        assert_eq!(
            Message::decode(&hex_literal::hex!("03 0000 00 00000000")),
            Err(FrameError::InvalidDestination(0x03))
        );
        assert_eq!(
            Message::decode(&hex_literal::hex!("00 0000 20 00000000")),
            Err(FrameError::ExtensionsUnsupported)
        );
        assert_eq!(
            Message::decode(&hex_literal::hex!("00 0000 00 00000000")),
            Err(FrameError::MissingProtocolHeader)
        );
        // Ack flag without the ack counter
        assert_eq!(
            Message::decode(&hex_literal::hex!("00 0000 00 00000000 02 10 0100 0000")),
            Err(FrameError::Truncated)
        );
    }

    #[test]
    fn test_unknown_opcode() {
        let mut header = ProtocolHeader::default();
        header.protocol_id = ProtocolID::InteractionModel as u16;
        header.protocol_opcode = 0x7F;
        assert_eq!(
            header.opcode(),
            Err(FrameError::UnknownOpcode {
                protocol: 1,
                opcode: 0x7F
            })
        );
    }

    #[test]
    fn test_too_large() {
        let mut message = write_request(1);
        message.payload = Bytes::from(vec![0u8; UDP_MESSAGE_LIMIT]);
        assert!(matches!(message.encode(), Err(FrameError::TooLarge(_))));
    }
}
