//! Matter TLV (Appendix A), limited to anonymous and context-specific tags,
//! which is all the interaction model messages carried here need.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;

use crate::error::TlvError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagControl {
    Anonymous,
    ContextSpecific(u8),
}

impl TagControl {
    const fn control_bits(&self) -> u8 {
        match self {
            TagControl::Anonymous => 0x00,
            TagControl::ContextSpecific(_) => 0x20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Byte1,
    Byte2,
    Byte4,
    Byte8,
}

impl ElementSize {
    const fn bits(self) -> u8 {
        match self {
            ElementSize::Byte1 => 0,
            ElementSize::Byte2 => 1,
            ElementSize::Byte4 => 2,
            ElementSize::Byte8 => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ElementSize::Byte1,
            1 => ElementSize::Byte2,
            2 => ElementSize::Byte4,
            _ => ElementSize::Byte8,
        }
    }

    pub const fn len(self) -> usize {
        match self {
            ElementSize::Byte1 => 1,
            ElementSize::Byte2 => 2,
            ElementSize::Byte4 => 4,
            ElementSize::Byte8 => 8,
        }
    }

    fn for_unsigned(value: u64) -> Self {
        if value <= u8::MAX as u64 {
            ElementSize::Byte1
        } else if value <= u16::MAX as u64 {
            ElementSize::Byte2
        } else if value <= u32::MAX as u64 {
            ElementSize::Byte4
        } else {
            ElementSize::Byte8
        }
    }

    fn for_signed(value: i64) -> Self {
        if i8::try_from(value).is_ok() {
            ElementSize::Byte1
        } else if i16::try_from(value).is_ok() {
            ElementSize::Byte2
        } else if i32::try_from(value).is_ok() {
            ElementSize::Byte4
        } else {
            ElementSize::Byte8
        }
    }
}

/// Element types (A.7.1). The integer and string families carry their
/// [`ElementSize`] in the two low bits.
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    SignedInt = 0x00,
    UnsignedInt = 0x04,
    BooleanFalse = 0x08,
    BooleanTrue = 0x09,
    Float32 = 0x0A,
    Float64 = 0x0B,
    Utf8String = 0x0C,
    ByteString = 0x10,
    Null = 0x14,
    Structure = 0x15,
    Array = 0x16,
    List = 0x17,
    EndOfContainer = 0x18,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagLengthValue {
    Signed(i64),
    Unsigned(u64),
    Boolean(bool),
    Float32(f32),
    Float64(f64),
    Utf8String(String),
    ByteString(Vec<u8>),
    Null,
    Structure,
    Array,
    List,
    EndOfContainer,
}

impl TagLengthValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TagLengthValue::Unsigned(value) => Some(*value),
            TagLengthValue::Signed(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagLengthValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            TagLengthValue::Structure | TagLengthValue::Array | TagLengthValue::List
        )
    }
}

#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, tag: TagControl, value: &TagLengthValue) {
        match value {
            TagLengthValue::Signed(value) => {
                let size = ElementSize::for_signed(*value);
                self.put_control(tag, TlvType::SignedInt as u8 | size.bits());
                match size {
                    ElementSize::Byte1 => self.buf.put_i8(*value as i8),
                    ElementSize::Byte2 => self.buf.put_i16_le(*value as i16),
                    ElementSize::Byte4 => self.buf.put_i32_le(*value as i32),
                    ElementSize::Byte8 => self.buf.put_i64_le(*value),
                }
            }
            TagLengthValue::Unsigned(value) => {
                let size = ElementSize::for_unsigned(*value);
                self.put_control(tag, TlvType::UnsignedInt as u8 | size.bits());
                self.put_sized(size, *value);
            }
            TagLengthValue::Boolean(true) => self.put_control(tag, TlvType::BooleanTrue as u8),
            TagLengthValue::Boolean(false) => self.put_control(tag, TlvType::BooleanFalse as u8),
            TagLengthValue::Float32(value) => {
                self.put_control(tag, TlvType::Float32 as u8);
                self.buf.put_f32_le(*value);
            }
            TagLengthValue::Float64(value) => {
                self.put_control(tag, TlvType::Float64 as u8);
                self.buf.put_f64_le(*value);
            }
            TagLengthValue::Utf8String(value) => {
                self.put_string(tag, TlvType::Utf8String, value.as_bytes())
            }
            TagLengthValue::ByteString(value) => self.put_string(tag, TlvType::ByteString, value),
            TagLengthValue::Null => self.put_control(tag, TlvType::Null as u8),
            TagLengthValue::Structure => self.put_control(tag, TlvType::Structure as u8),
            TagLengthValue::Array => self.put_control(tag, TlvType::Array as u8),
            TagLengthValue::List => self.put_control(tag, TlvType::List as u8),
            // Ends are always anonymous
            TagLengthValue::EndOfContainer => self.buf.put_u8(TlvType::EndOfContainer as u8),
        }
    }

    pub fn unsigned(&mut self, tag: TagControl, value: u64) {
        self.write(tag, &TagLengthValue::Unsigned(value));
    }

    pub fn boolean(&mut self, tag: TagControl, value: bool) {
        self.write(tag, &TagLengthValue::Boolean(value));
    }

    pub fn start_structure(&mut self, tag: TagControl) {
        self.write(tag, &TagLengthValue::Structure);
    }

    pub fn start_array(&mut self, tag: TagControl) {
        self.write(tag, &TagLengthValue::Array);
    }

    pub fn start_list(&mut self, tag: TagControl) {
        self.write(tag, &TagLengthValue::List);
    }

    pub fn end_container(&mut self) {
        self.write(TagControl::Anonymous, &TagLengthValue::EndOfContainer);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn inner(self) -> BytesMut {
        self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_control(&mut self, tag: TagControl, element: u8) {
        self.buf.put_u8(tag.control_bits() | element);
        if let TagControl::ContextSpecific(tag) = tag {
            self.buf.put_u8(tag);
        }
    }

    fn put_string(&mut self, tag: TagControl, ty: TlvType, bytes: &[u8]) {
        let size = ElementSize::for_unsigned(bytes.len() as u64);
        self.put_control(tag, ty as u8 | size.bits());
        self.put_sized(size, bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    fn put_sized(&mut self, size: ElementSize, value: u64) {
        match size {
            ElementSize::Byte1 => self.buf.put_u8(value as u8),
            ElementSize::Byte2 => self.buf.put_u16_le(value as u16),
            ElementSize::Byte4 => self.buf.put_u32_le(value as u32),
            ElementSize::Byte8 => self.buf.put_u64_le(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: TagControl,
    pub value: TagLengthValue,
}

impl Element {
    /// The context tag of this element, or `None` when anonymous.
    pub fn context_tag(&self) -> Option<u8> {
        match self.tag {
            TagControl::ContextSpecific(tag) => Some(tag),
            TagControl::Anonymous => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn next_element(&mut self) -> Result<Element, TlvError> {
        self.need(1)?;
        let control = self.buf.get_u8();
        let tag = match control & 0xE0 {
            0x00 => TagControl::Anonymous,
            0x20 => {
                self.need(1)?;
                TagControl::ContextSpecific(self.buf.get_u8())
            }
            other => return Err(TlvError::UnsupportedTag(other)),
        };

        let element = control & 0x1F;
        let size = ElementSize::from_bits(element);
        let base = match element {
            0x00..=0x07 | 0x0C..=0x13 => element & !0x03,
            other => other,
        };
        let ty = TlvType::from_u8(base).ok_or(TlvError::UnsupportedType(element))?;

        let value = match ty {
            TlvType::SignedInt => {
                self.need(size.len())?;
                TagLengthValue::Signed(match size {
                    ElementSize::Byte1 => self.buf.get_i8() as i64,
                    ElementSize::Byte2 => self.buf.get_i16_le() as i64,
                    ElementSize::Byte4 => self.buf.get_i32_le() as i64,
                    ElementSize::Byte8 => self.buf.get_i64_le(),
                })
            }
            TlvType::UnsignedInt => TagLengthValue::Unsigned(self.read_sized(size)?),
            TlvType::BooleanFalse => TagLengthValue::Boolean(false),
            TlvType::BooleanTrue => TagLengthValue::Boolean(true),
            TlvType::Float32 => {
                self.need(4)?;
                TagLengthValue::Float32(self.buf.get_f32_le())
            }
            TlvType::Float64 => {
                self.need(8)?;
                TagLengthValue::Float64(self.buf.get_f64_le())
            }
            TlvType::Utf8String => {
                let bytes = self.read_string(size)?;
                let value = String::from_utf8(bytes).map_err(|_| TlvError::InvalidUtf8)?;
                TagLengthValue::Utf8String(value)
            }
            TlvType::ByteString => TagLengthValue::ByteString(self.read_string(size)?),
            TlvType::Null => TagLengthValue::Null,
            TlvType::Structure => TagLengthValue::Structure,
            TlvType::Array => TagLengthValue::Array,
            TlvType::List => TagLengthValue::List,
            TlvType::EndOfContainer => TagLengthValue::EndOfContainer,
        };

        Ok(Element { tag, value })
    }

    /// Skip the rest of a container whose start element was just read.
    pub fn skip_container(&mut self) -> Result<(), TlvError> {
        let mut depth = 0usize;
        loop {
            let element = self.next_element()?;
            if element.value.is_container() {
                depth += 1;
            } else if element.value == TagLengthValue::EndOfContainer {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
        }
    }

    fn need(&self, len: usize) -> Result<(), TlvError> {
        if self.buf.remaining() < len {
            Err(TlvError::UnexpectedEnd)
        } else {
            Ok(())
        }
    }

    fn read_sized(&mut self, size: ElementSize) -> Result<u64, TlvError> {
        self.need(size.len())?;
        Ok(match size {
            ElementSize::Byte1 => self.buf.get_u8() as u64,
            ElementSize::Byte2 => self.buf.get_u16_le() as u64,
            ElementSize::Byte4 => self.buf.get_u32_le() as u64,
            ElementSize::Byte8 => self.buf.get_u64_le(),
        })
    }

    fn read_string(&mut self, size: ElementSize) -> Result<Vec<u8>, TlvError> {
        let len = usize::try_from(self.read_sized(size)?).map_err(|_| TlvError::UnexpectedEnd)?;
        self.need(len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_structure() {
        let mut encoder = Encoder::new();
        encoder.start_structure(TagControl::Anonymous);
        encoder.unsigned(TagControl::ContextSpecific(0), 5);
        encoder.boolean(TagControl::ContextSpecific(1), true);
        encoder.write(
            TagControl::ContextSpecific(2),
            &TagLengthValue::Utf8String("hi".to_string()),
        );
        encoder.unsigned(TagControl::ContextSpecific(3), 300);
        encoder.write(TagControl::Anonymous, &TagLengthValue::Signed(-1));
        encoder.end_container();

        assert_eq!(
            &encoder.inner()[..],
            &hex_literal::hex!("15 2400 05 2901 2c02 02 6869 2503 2c01 00ff 18")[..]
        );
    }

    #[test]
    fn test_decode_structure() {
        let buf = hex_literal::hex!("15 2400 05 2901 3002 03 010203 2403 14 18");
        let mut decoder = Decoder::new(&buf);

        let start = decoder.next_element().unwrap();
        assert_eq!(start.tag, TagControl::Anonymous);
        assert_eq!(start.value, TagLengthValue::Structure);

        let first = decoder.next_element().unwrap();
        assert_eq!(first.context_tag(), Some(0));
        assert_eq!(first.value.as_u64(), Some(5));

        let second = decoder.next_element().unwrap();
        assert_eq!(second.value.as_bool(), Some(true));

        let third = decoder.next_element().unwrap();
        assert_eq!(third.value, TagLengthValue::ByteString(vec![1, 2, 3]));

        // Unsigned 1 byte element with tag 3, holding 0x14
        let fourth = decoder.next_element().unwrap();
        assert_eq!(fourth.context_tag(), Some(3));
        assert_eq!(fourth.value, TagLengthValue::Unsigned(0x14));

        let end = decoder.next_element().unwrap();
        assert_eq!(end.value, TagLengthValue::EndOfContainer);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_skip_nested_container() {
        let buf = hex_literal::hex!("15 3600 15 2400 01 18 18 2401 02 18");
        let mut decoder = Decoder::new(&buf);
        decoder.next_element().unwrap();
        let array = decoder.next_element().unwrap();
        assert_eq!(array.value, TagLengthValue::Array);
        decoder.skip_container().unwrap();
        let after = decoder.next_element().unwrap();
        assert_eq!(after.context_tag(), Some(1));
        assert_eq!(after.value.as_u64(), Some(2));
    }

    #[test]
    fn test_truncated() {
        // 2-byte unsigned with only 1 byte of value
        let buf = hex_literal::hex!("2500 01");
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.next_element(), Err(TlvError::UnexpectedEnd));

        let buf = hex_literal::hex!("0c05 6869");
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.next_element(), Err(TlvError::UnexpectedEnd));
    }

    #[test]
    fn test_unsupported_tag() {
        // Fully qualified 6-byte tag
        let buf = hex_literal::hex!("c4 0000 0000 0000 01");
        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.next_element(), Err(TlvError::UnsupportedTag(0xC0)));
    }

    #[test]
    fn test_floats_and_null() {
        let mut encoder = Encoder::new();
        encoder.write(TagControl::ContextSpecific(0), &TagLengthValue::Float32(1.5));
        encoder.write(TagControl::ContextSpecific(1), &TagLengthValue::Float64(-0.25));
        encoder.write(TagControl::ContextSpecific(2), &TagLengthValue::Null);
        let buf = encoder.freeze();

        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.next_element().unwrap().value, TagLengthValue::Float32(1.5));
        assert_eq!(decoder.next_element().unwrap().value, TagLengthValue::Float64(-0.25));
        let null = decoder.next_element().unwrap();
        assert_eq!(null.context_tag(), Some(2));
        assert_eq!(null.value, TagLengthValue::Null);
    }
}
