//! Validation and encoding of write requests.
//!
//! Nothing here touches a session: a write is fully checked and encoded
//! before it is handed over, so a rejected value never reaches the wire.

use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;

use crate::{
    constants::{MAX_HEADER_LEN, UDP_MESSAGE_LIMIT},
    data_model::{AttributePath, AttributeType, Constraint, TypedValue},
    error::ValidationError,
    interaction_model::{AttributeDataIB, WriteRequestMessage},
    schema,
};

/// A validated, encoded `WriteRequestMessage` ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedWrite {
    paths: Vec<AttributePath>,
    payload: Bytes,
    timed_expiry: Option<Duration>,
}

impl EncodedWrite {
    pub fn paths(&self) -> &[AttributePath] {
        &self.paths
    }

    /// TLV encoded `WriteRequestMessage`
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// When set, the write must be preceded by a `TimedRequest` opening a
    /// window of this length.
    pub fn timed_expiry(&self) -> Option<Duration> {
        self.timed_expiry
    }

    pub fn is_timed(&self) -> bool {
        self.timed_expiry.is_some()
    }
}

/// Validate and encode a write of one attribute.
///
/// `expected` must agree with the schema of the attribute at `path`.
/// `constraint` replaces the schema's own constraint when given.
pub fn build(
    path: AttributePath,
    raw: &Value,
    expected: AttributeType,
    constraint: Option<Constraint>,
    timed_expiry: Option<Duration>,
) -> Result<EncodedWrite, ValidationError> {
    let mut builder = WriteRequestBuilder::new();
    if let Some(expiry) = timed_expiry {
        builder = builder.timed(expiry);
    }
    builder.push(path, raw, expected, constraint)?;
    builder.build()
}

/// Collects several attribute writes into one request. Each entry is
/// validated as it is pushed; encoding happens once in [`Self::build`].
#[derive(Debug, Default)]
pub struct WriteRequestBuilder {
    entries: Vec<(AttributePath, TypedValue)>,
    timed_expiry: Option<Duration>,
}

impl WriteRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timed(mut self, expiry: Duration) -> Self {
        self.timed_expiry = Some(expiry);
        self
    }

    pub fn push(
        &mut self,
        path: AttributePath,
        raw: &Value,
        expected: AttributeType,
        constraint: Option<Constraint>,
    ) -> Result<&mut Self, ValidationError> {
        let declared = schema::attribute(path.cluster_id(), path.attribute_id())
            .ok_or_else(|| unknown_attribute(&path))?;

        if expected.value_type != declared.ty.value_type {
            return Err(ValidationError::TypeMismatch {
                expected: declared.ty.value_type,
                found: expected.value_type.name(),
            });
        }
        if expected.nullable != declared.ty.nullable {
            return Err(ValidationError::TypeMismatch {
                expected: declared.ty.value_type,
                found: if expected.nullable {
                    "nullable type"
                } else {
                    "non-nullable type"
                },
            });
        }

        let constraint = constraint.unwrap_or(declared.constraint);
        let value = TypedValue::from_json(raw, declared.ty, &constraint)?;
        self.entries.push((path, value));
        Ok(self)
    }

    /// Push a value using the type and constraint the schema declares.
    pub fn push_value(
        &mut self,
        path: AttributePath,
        raw: &Value,
    ) -> Result<&mut Self, ValidationError> {
        let declared = schema::attribute(path.cluster_id(), path.attribute_id())
            .ok_or_else(|| unknown_attribute(&path))?;
        self.push(path, raw, declared.ty, None)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Result<EncodedWrite, ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }
        if let Some(expiry) = self.timed_expiry {
            let millis = expiry.as_millis();
            if millis == 0 || millis > u16::MAX as u128 {
                return Err(ValidationError::OutOfRange {
                    value: millis as i128,
                    min: 1,
                    max: u16::MAX as i128,
                });
            }
        }

        let message = WriteRequestMessage {
            suppress_response: false,
            timed_request: self.timed_expiry.is_some(),
            write_requests: self
                .entries
                .iter()
                .map(|(path, value)| AttributeDataIB {
                    data_version: None,
                    path: (*path).into(),
                    data: value.to_tlv(),
                })
                .collect(),
            more_chunked_messages: false,
        };
        let payload = message.encode();
        if payload.len() + MAX_HEADER_LEN > UDP_MESSAGE_LIMIT {
            return Err(ValidationError::TooLarge(payload.len()));
        }

        Ok(EncodedWrite {
            paths: self.entries.into_iter().map(|(path, _)| path).collect(),
            payload,
            timed_expiry: self.timed_expiry,
        })
    }
}

fn unknown_attribute(path: &AttributePath) -> ValidationError {
    let cluster = schema::cluster(path.cluster_id());
    ValidationError::UnknownAttribute {
        cluster: cluster
            .map(|cluster| cluster.name.to_string())
            .unwrap_or_else(|| format!("{:#06x}", path.cluster_id())),
        attribute: format!("{:#06x}", path.attribute_id()),
    }
}
