//! Interaction model messages used by writes (8.7, 10.6)

use bytes::Bytes;

use crate::{
    constants::INTERACTION_MODEL_REVISION,
    data_model::AttributePath,
    error::TlvError,
    tlv::{Decoder, Element, Encoder, TagControl, TagLengthValue},
};

pub mod status;

const REVISION_TAG: u8 = 0xFF;

#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionModelProtocolOpCode {
    StatusResponse = 0x01,
    ReadRequest,
    SubscribeRequest,
    SubscribeResponse,
    ReportData,
    WriteRequest,
    WriteResponse,
    InvokeRequest,
    InvokeResponse,
    TimedRequest,
}

/// 10.6.2
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePathIB {
    pub enable_tag_compression: Option<bool>,
    pub node: Option<u64>,
    pub endpoint: Option<u16>,
    pub cluster: Option<u32>,
    pub attribute: Option<u32>,
    pub list_index: Option<u16>,
}

impl From<AttributePath> for AttributePathIB {
    fn from(path: AttributePath) -> Self {
        Self {
            endpoint: Some(path.endpoint_id()),
            cluster: Some(path.cluster_id()),
            attribute: Some(path.attribute_id()),
            list_index: path.list_index(),
            ..Default::default()
        }
    }
}

impl AttributePathIB {
    /// The concrete path named by this IB, if it names one.
    pub fn to_path(&self) -> Option<AttributePath> {
        let path = AttributePath::new(self.endpoint?, self.cluster?, self.attribute?);
        Some(match self.list_index {
            Some(index) => path.with_list_index(index),
            None => path,
        })
    }

    pub fn to_tlv(&self, encoder: &mut Encoder, tag: TagControl) {
        encoder.start_list(tag);
        if let Some(value) = self.enable_tag_compression {
            encoder.boolean(TagControl::ContextSpecific(0), value);
        }
        if let Some(value) = self.node {
            encoder.unsigned(TagControl::ContextSpecific(1), value);
        }
        if let Some(value) = self.endpoint {
            encoder.unsigned(TagControl::ContextSpecific(2), value as u64);
        }
        if let Some(value) = self.cluster {
            encoder.unsigned(TagControl::ContextSpecific(3), value as u64);
        }
        if let Some(value) = self.attribute {
            encoder.unsigned(TagControl::ContextSpecific(4), value as u64);
        }
        if let Some(value) = self.list_index {
            encoder.unsigned(TagControl::ContextSpecific(5), value as u64);
        }
        encoder.end_container();
    }

    fn decode_inner(decoder: &mut Decoder) -> Result<Self, TlvError> {
        let mut ib = Self::default();
        for_each_member(decoder, |decoder, element| {
            match element.context_tag() {
                Some(0) => ib.enable_tag_compression = Some(boolean(&element, 0)?),
                Some(1) => ib.node = Some(unsigned(&element, 1)?),
                Some(2) => ib.endpoint = Some(unsigned(&element, 2)?),
                Some(3) => ib.cluster = Some(unsigned(&element, 3)?),
                Some(4) => ib.attribute = Some(unsigned(&element, 4)?),
                // A null list index means "append"
                Some(5) if element.value == TagLengthValue::Null => {}
                Some(5) => ib.list_index = Some(unsigned(&element, 5)?),
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(ib)
    }
}

/// 10.6.4
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDataIB {
    pub data_version: Option<u32>,
    pub path: AttributePathIB,
    pub data: TagLengthValue,
}

impl AttributeDataIB {
    pub fn to_tlv(&self, encoder: &mut Encoder) {
        encoder.start_structure(TagControl::Anonymous);
        if let Some(version) = self.data_version {
            encoder.unsigned(TagControl::ContextSpecific(0), version as u64);
        }
        self.path.to_tlv(encoder, TagControl::ContextSpecific(1));
        encoder.write(TagControl::ContextSpecific(2), &self.data);
        encoder.end_container();
    }

    fn decode_inner(decoder: &mut Decoder) -> Result<Self, TlvError> {
        let mut data_version = None;
        let mut path = None;
        let mut data = None;
        for_each_member(decoder, |decoder, element| {
            match element.context_tag() {
                Some(0) => data_version = Some(unsigned(&element, 0)?),
                Some(1) if element.value == TagLengthValue::List => {
                    path = Some(AttributePathIB::decode_inner(decoder)?)
                }
                // Only scalar attribute values are written
                Some(2) if element.value.is_container() => {
                    return Err(TlvError::UnexpectedElement(2))
                }
                Some(2) => data = Some(element.value),
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(Self {
            data_version,
            path: path.ok_or(TlvError::MissingField(1))?,
            data: data.ok_or(TlvError::MissingField(2))?,
        })
    }
}

/// 10.6.11
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusIB {
    pub status: u8,
    pub cluster_status: Option<u16>,
}

impl StatusIB {
    pub fn to_tlv(&self, encoder: &mut Encoder, tag: TagControl) {
        encoder.start_structure(tag);
        encoder.unsigned(TagControl::ContextSpecific(0), self.status as u64);
        if let Some(cluster_status) = self.cluster_status {
            encoder.unsigned(TagControl::ContextSpecific(1), cluster_status as u64);
        }
        encoder.end_container();
    }

    fn decode_inner(decoder: &mut Decoder) -> Result<Self, TlvError> {
        let mut ib = Self::default();
        for_each_member(decoder, |decoder, element| {
            match element.context_tag() {
                Some(0) => ib.status = unsigned(&element, 0)?,
                Some(1) => ib.cluster_status = Some(unsigned(&element, 1)?),
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(ib)
    }
}

/// 10.6.16
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttributeStatusIB {
    pub path: AttributePathIB,
    pub status: StatusIB,
}

impl AttributeStatusIB {
    pub fn to_tlv(&self, encoder: &mut Encoder) {
        encoder.start_structure(TagControl::Anonymous);
        self.path.to_tlv(encoder, TagControl::ContextSpecific(0));
        self.status.to_tlv(encoder, TagControl::ContextSpecific(1));
        encoder.end_container();
    }

    fn decode_inner(decoder: &mut Decoder) -> Result<Self, TlvError> {
        let mut ib = Self::default();
        for_each_member(decoder, |decoder, element| {
            match (element.context_tag(), &element.value) {
                (Some(0), TagLengthValue::List) => ib.path = AttributePathIB::decode_inner(decoder)?,
                (Some(1), TagLengthValue::Structure) => ib.status = StatusIB::decode_inner(decoder)?,
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(ib)
    }
}

/// 10.7.6
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequestMessage {
    pub suppress_response: bool,
    pub timed_request: bool,
    pub write_requests: Vec<AttributeDataIB>,
    pub more_chunked_messages: bool,
}

impl WriteRequestMessage {
    pub fn to_tlv(&self, encoder: &mut Encoder) {
        encoder.start_structure(TagControl::Anonymous);
        encoder.boolean(TagControl::ContextSpecific(0), self.suppress_response);
        encoder.boolean(TagControl::ContextSpecific(1), self.timed_request);
        encoder.start_array(TagControl::ContextSpecific(2));
        for request in &self.write_requests {
            request.to_tlv(encoder);
        }
        encoder.end_container();
        encoder.boolean(TagControl::ContextSpecific(3), self.more_chunked_messages);
        encoder.unsigned(
            TagControl::ContextSpecific(REVISION_TAG),
            INTERACTION_MODEL_REVISION as u64,
        );
        encoder.end_container();
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Encoder::new();
        self.to_tlv(&mut encoder);
        encoder.freeze()
    }

    pub fn from_tlv(data: &[u8]) -> Result<Self, TlvError> {
        let mut message = Self {
            suppress_response: false,
            timed_request: false,
            write_requests: vec![],
            more_chunked_messages: false,
        };
        decode_message(data, |decoder, element| {
            match (element.context_tag(), &element.value) {
                (Some(0), _) => message.suppress_response = boolean(&element, 0)?,
                (Some(1), _) => message.timed_request = boolean(&element, 1)?,
                (Some(2), TagLengthValue::Array) => for_each_member(decoder, |decoder, element| {
                    if element.value != TagLengthValue::Structure {
                        return Err(TlvError::UnexpectedElement(2));
                    }
                    message
                        .write_requests
                        .push(AttributeDataIB::decode_inner(decoder)?);
                    Ok(())
                })?,
                (Some(3), _) => message.more_chunked_messages = boolean(&element, 3)?,
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(message)
    }
}

/// 10.7.7
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteResponseMessage {
    pub write_responses: Vec<AttributeStatusIB>,
}

impl WriteResponseMessage {
    pub fn to_tlv(&self, encoder: &mut Encoder) {
        encoder.start_structure(TagControl::Anonymous);
        encoder.start_array(TagControl::ContextSpecific(0));
        for response in &self.write_responses {
            response.to_tlv(encoder);
        }
        encoder.end_container();
        encoder.unsigned(
            TagControl::ContextSpecific(REVISION_TAG),
            INTERACTION_MODEL_REVISION as u64,
        );
        encoder.end_container();
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Encoder::new();
        self.to_tlv(&mut encoder);
        encoder.freeze()
    }

    pub fn from_tlv(data: &[u8]) -> Result<Self, TlvError> {
        let mut message = Self::default();
        decode_message(data, |decoder, element| {
            match (element.context_tag(), &element.value) {
                (Some(0), TagLengthValue::Array) => for_each_member(decoder, |decoder, element| {
                    if element.value != TagLengthValue::Structure {
                        return Err(TlvError::UnexpectedElement(0));
                    }
                    message
                        .write_responses
                        .push(AttributeStatusIB::decode_inner(decoder)?);
                    Ok(())
                })?,
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(message)
    }
}

/// 10.7.8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedRequestMessage {
    pub timeout_ms: u16,
}

impl TimedRequestMessage {
    pub fn encode(&self) -> Bytes {
        let mut encoder = Encoder::new();
        encoder.start_structure(TagControl::Anonymous);
        encoder.unsigned(TagControl::ContextSpecific(0), self.timeout_ms as u64);
        encoder.unsigned(
            TagControl::ContextSpecific(REVISION_TAG),
            INTERACTION_MODEL_REVISION as u64,
        );
        encoder.end_container();
        encoder.freeze()
    }

    pub fn from_tlv(data: &[u8]) -> Result<Self, TlvError> {
        let mut timeout_ms = None;
        decode_message(data, |decoder, element| {
            match element.context_tag() {
                Some(0) => timeout_ms = Some(unsigned(&element, 0)?),
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(Self {
            timeout_ms: timeout_ms.ok_or(TlvError::MissingField(0))?,
        })
    }
}

/// 10.7.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponseMessage {
    pub status: u8,
}

impl StatusResponseMessage {
    pub fn encode(&self) -> Bytes {
        let mut encoder = Encoder::new();
        encoder.start_structure(TagControl::Anonymous);
        encoder.unsigned(TagControl::ContextSpecific(0), self.status as u64);
        encoder.unsigned(
            TagControl::ContextSpecific(REVISION_TAG),
            INTERACTION_MODEL_REVISION as u64,
        );
        encoder.end_container();
        encoder.freeze()
    }

    pub fn from_tlv(data: &[u8]) -> Result<Self, TlvError> {
        let mut status = None;
        decode_message(data, |decoder, element| {
            match element.context_tag() {
                Some(0) => status = Some(unsigned(&element, 0)?),
                _ => skip(decoder, &element)?,
            }
            Ok(())
        })?;
        Ok(Self {
            status: status.ok_or(TlvError::MissingField(0))?,
        })
    }
}

/// Decode a message body: an anonymous structure whose members go to `field`.
fn decode_message<'a>(
    data: &'a [u8],
    field: impl FnMut(&mut Decoder<'a>, Element) -> Result<(), TlvError>,
) -> Result<(), TlvError> {
    let mut decoder = Decoder::new(data);
    let start = decoder.next_element()?;
    if start.value != TagLengthValue::Structure {
        return Err(TlvError::ExpectedStructure);
    }
    for_each_member(&mut decoder, field)
}

/// Hand each member of the container just opened to `field`, up to its end.
/// `field` must consume any container it is given.
fn for_each_member<'a>(
    decoder: &mut Decoder<'a>,
    mut field: impl FnMut(&mut Decoder<'a>, Element) -> Result<(), TlvError>,
) -> Result<(), TlvError> {
    loop {
        let element = decoder.next_element()?;
        if element.value == TagLengthValue::EndOfContainer {
            return Ok(());
        }
        field(decoder, element)?;
    }
}

fn skip(decoder: &mut Decoder, element: &Element) -> Result<(), TlvError> {
    if element.value.is_container() {
        decoder.skip_container()?;
    }
    Ok(())
}

fn unsigned<T: TryFrom<u64>>(element: &Element, tag: u8) -> Result<T, TlvError> {
    element
        .value
        .as_u64()
        .and_then(|value| T::try_from(value).ok())
        .ok_or(TlvError::UnexpectedElement(tag))
}

fn boolean(element: &Element, tag: u8) -> Result<bool, TlvError> {
    element.value.as_bool().ok_or(TlvError::UnexpectedElement(tag))
}
