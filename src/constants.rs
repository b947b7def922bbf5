//! Protocol constants used by the write path.
//! Most of these are defaults that a [`crate::config::SessionConfig`] can override.

/// Largest Matter message carried over UDP (4.4.4)
pub const UDP_MESSAGE_LIMIT: usize = 1280;
/// Default operational port of a Matter node
pub const MATTER_PORT: u16 = 5540;
/// Largest message and protocol header this crate emits
pub const MAX_HEADER_LEN: usize = 36;

/// Interaction model revision sent in every IM message
pub const INTERACTION_MODEL_REVISION: u8 = 11;

/// How long a write waits for its response before failing with a timeout.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;
/// Expiry window requested for timed writes when the caller doesn't give one.
pub const DEFAULT_TIMED_WRITE_EXPIRY_MS: u16 = 10000;

// Message Reliability Protocol (4.12.8)
pub const MRP_BASE_RETRY_INTERVAL_MS: u64 = 200;
pub const MRP_MAX_TRANSMISSIONS: u32 = 5;
pub const MRP_BACKOFF_THRESHOLD: u32 = 1;
/// Backoff multiplier expressed as a fraction (1.6)
pub const MRP_BACKOFF_BASE: (u64, u64) = (16, 10);

/// Default maximum length for short character and octet strings
pub const SHORT_STRING_MAX_LEN: usize = 254;
/// Default maximum length for long character and octet strings
pub const LONG_STRING_MAX_LEN: usize = 65534;
