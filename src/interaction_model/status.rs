/// Interaction model status codes (8.10)
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success = 0x00,
    Failure = 0x01,
    InvalidSubscription = 0x7D,
    UnsupportedAccess = 0x7E,
    UnsupportedEndpoint = 0x7F,
    InvalidAction = 0x80,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    ConstraintError = 0x87,
    UnsupportedWrite = 0x88,
    ResourceExhausted = 0x89,
    NotFound = 0x8B,
    UnreportableAttribute = 0x8C,
    InvalidDataType = 0x8D,
    UnsupportedRead = 0x8F,
    DataVersionMismatch = 0x92,
    Timeout = 0x94,
    Busy = 0x9C,
    UnsupportedCluster = 0xC3,
    NoUpstreamSubscription = 0xC5,
    NeedsTimedInteraction = 0xC6,
    UnsupportedEvent = 0xC7,
    PathsExhausted = 0xC8,
    TimedRequestMismatch = 0xC9,
    FailsafeRequired = 0xCA,
    InvalidInState = 0xCB,
    NoCommandResponse = 0xCC,
}

impl StatusCode {
    pub fn from_code(code: u8) -> Option<Self> {
        <Self as num_traits::FromPrimitive>::from_u8(code)
    }

    pub const fn is_success(self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

#[cfg(test)]
mod tests {
    use num_traits::FromPrimitive;

    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(StatusCode::from_u8(0xC6), Some(StatusCode::NeedsTimedInteraction));
        assert_eq!(StatusCode::from_u8(0x87), Some(StatusCode::ConstraintError));
        assert_eq!(StatusCode::from_u8(0x02), None);
        assert!(StatusCode::Success.is_success());
    }
}
