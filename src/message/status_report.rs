use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;

use super::ProtocolID;
use crate::error::FrameError;

/// Status Report Message (Appendix D)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub general_code: GeneralCode,
    pub protocol_id: u32,
    pub protocol_code: u16,
    pub protocol_data: Bytes,
}

impl StatusReport {
    /// The report a peer sends when it tears down the secure session (4.11.1.4)
    pub fn close_session() -> Self {
        Self {
            general_code: GeneralCode::Success,
            protocol_id: ProtocolID::SecureChannel as u32,
            protocol_code: SecureChannelStatusCode::CloseSession as u16,
            protocol_data: Bytes::new(),
        }
    }

    pub fn is_close_session(&self) -> bool {
        self.protocol_id == ProtocolID::SecureChannel as u32
            && self.protocol_code == SecureChannelStatusCode::CloseSession as u16
    }

    pub fn from_payload(mut payload: &[u8]) -> Result<Self, FrameError> {
        if payload.remaining() < 6 {
            return Err(FrameError::Truncated);
        }

        let general_code = payload.get_u16_le();
        // Codes beyond the known set are treated as a generic failure
        let general_code = GeneralCode::from_u16(general_code).unwrap_or(GeneralCode::Failure);
        let protocol_id = payload.get_u32_le();
        let protocol_code = if payload.remaining() >= 2 {
            payload.get_u16_le()
        } else {
            0
        };

        Ok(Self {
            general_code,
            protocol_id,
            protocol_code,
            protocol_data: Bytes::copy_from_slice(payload),
        })
    }

    pub fn to_payload(&self) -> Bytes {
        let mut payload = BytesMut::with_capacity(8 + self.protocol_data.len());
        payload.put_u16_le(self.general_code as u16);
        payload.put_u32_le(self.protocol_id);
        payload.put_u16_le(self.protocol_code);
        payload.put_slice(&self.protocol_data);
        payload.freeze()
    }
}

#[repr(u16)]
#[derive(FromPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum GeneralCode {
    Success = 0,
    Failure,
    BadPrecondition,
    OutOfRange,
    BadRequest,
    Unsupported,
    Unexpected,
    ResourceExhausted,
    Busy,
    Timeout,
    Continue,
    Aborted,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    DataLoss,
}

/// Protocol codes of secure channel status reports (4.11.1.3)
#[repr(u16)]
#[derive(FromPrimitive, PartialEq, Eq, Debug, Clone, Copy)]
pub enum SecureChannelStatusCode {
    SessionEstablishmentSuccess = 0x0000,
    NoSharedTrustRoots = 0x0001,
    InvalidParameter = 0x0002,
    CloseSession = 0x0003,
    Busy = 0x0004,
}
