//! encoded_value / encoded_annotation / encoded_array codec
//! https://source.android.com/docs/core/runtime/dex-format#encoding

use std::cmp::Ordering;

use crate::dex::error::DexError;
use crate::dex::{read_u1, read_uleb128, write_u1, write_uleb128};

const VALUE_BYTE: u8 = 0x00;
const VALUE_SHORT: u8 = 0x02;
const VALUE_CHAR: u8 = 0x03;
const VALUE_INT: u8 = 0x04;
const VALUE_LONG: u8 = 0x06;
const VALUE_FLOAT: u8 = 0x10;
const VALUE_DOUBLE: u8 = 0x11;
const VALUE_METHOD_TYPE: u8 = 0x15;
const VALUE_METHOD_HANDLE: u8 = 0x16;
const VALUE_STRING: u8 = 0x17;
const VALUE_TYPE: u8 = 0x18;
const VALUE_FIELD: u8 = 0x19;
const VALUE_METHOD: u8 = 0x1a;
const VALUE_ENUM: u8 = 0x1b;
const VALUE_ARRAY: u8 = 0x1c;
const VALUE_ANNOTATION: u8 = 0x1d;
const VALUE_NULL: u8 = 0x1e;
const VALUE_BOOLEAN: u8 = 0x1f;

#[derive(Debug, Clone)]
pub struct EncodedAnnotation {
    pub type_idx: u32,
    pub elements: Vec<AnnotationElement>,
}

impl EncodedAnnotation {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<EncodedAnnotation, DexError> {
        let type_idx = read_uleb128(bytes, ix)?;
        let size = read_uleb128(bytes, ix)? as usize;
        let mut elements = Vec::with_capacity(size);
        for _ in 0..size {
            elements.push(AnnotationElement::read(bytes, ix)?);
        }
        Ok(EncodedAnnotation { type_idx, elements })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_uleb128(bytes, self.type_idx);
        c += write_uleb128(bytes, self.elements.len() as u32);
        for element in &self.elements {
            c += element.write(bytes);
        }
        c
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationElement {
    pub name_idx: u32,
    pub value: EncodedValue,
}

impl AnnotationElement {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<AnnotationElement, DexError> {
        let name_idx = read_uleb128(bytes, ix)?;
        let value = EncodedValue::read(bytes, ix)?;
        Ok(AnnotationElement { name_idx, value })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_uleb128(bytes, self.name_idx) + self.value.write(bytes)
    }
}

#[derive(Debug, Clone)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    MethodType(u32),
    MethodHandle(u32),
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
    Enum(u32),
    Array(Vec<EncodedValue>),
    Annotation(EncodedAnnotation),
    Null,
    Boolean(bool),
}

impl EncodedValue {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<EncodedValue, DexError> {
        let header = read_u1(bytes, ix)?;
        let value_arg = header >> 5;
        let value_type = header & 0x1f;
        let size = (value_arg + 1) as usize;

        let max_size = match value_type {
            VALUE_BYTE => 1,
            VALUE_SHORT | VALUE_CHAR => 2,
            VALUE_INT | VALUE_FLOAT => 4,
            VALUE_NULL | VALUE_BOOLEAN | VALUE_ARRAY | VALUE_ANNOTATION => 8, // arg is not a size
            _ => 8,
        };
        if size > max_size {
            fail!("encoded value type {:#04x} has oversized payload {}", value_type, size);
        }

        Ok(match value_type {
            VALUE_BYTE => EncodedValue::Byte(read_u1(bytes, ix)? as i8),
            VALUE_SHORT => EncodedValue::Short(read_signed(bytes, ix, size)? as i16),
            VALUE_CHAR => EncodedValue::Char(read_unsigned(bytes, ix, size)? as u16),
            VALUE_INT => EncodedValue::Int(read_signed(bytes, ix, size)? as i32),
            VALUE_LONG => EncodedValue::Long(read_signed(bytes, ix, size)?),
            VALUE_FLOAT => {
                let raw = read_unsigned(bytes, ix, size)? as u32;
                EncodedValue::Float(f32::from_bits(raw << (8 * (4 - size))))
            }
            VALUE_DOUBLE => {
                let raw = read_unsigned(bytes, ix, size)?;
                EncodedValue::Double(f64::from_bits(raw << (8 * (8 - size))))
            }
            VALUE_METHOD_TYPE => EncodedValue::MethodType(read_unsigned(bytes, ix, size)? as u32),
            VALUE_METHOD_HANDLE => {
                EncodedValue::MethodHandle(read_unsigned(bytes, ix, size)? as u32)
            }
            VALUE_STRING => EncodedValue::String(read_unsigned(bytes, ix, size)? as u32),
            VALUE_TYPE => EncodedValue::Type(read_unsigned(bytes, ix, size)? as u32),
            VALUE_FIELD => EncodedValue::Field(read_unsigned(bytes, ix, size)? as u32),
            VALUE_METHOD => EncodedValue::Method(read_unsigned(bytes, ix, size)? as u32),
            VALUE_ENUM => EncodedValue::Enum(read_unsigned(bytes, ix, size)? as u32),
            VALUE_ARRAY => EncodedValue::Array(read_encoded_array(bytes, ix)?),
            VALUE_ANNOTATION => EncodedValue::Annotation(EncodedAnnotation::read(bytes, ix)?),
            VALUE_NULL => EncodedValue::Null,
            VALUE_BOOLEAN => EncodedValue::Boolean(value_arg != 0),
            _ => fail!("unknown encoded value type {:#04x}", value_type),
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        match self {
            EncodedValue::Byte(v) => {
                write_u1(bytes, VALUE_BYTE) + write_u1(bytes, *v as u8)
            }
            EncodedValue::Short(v) => write_signed(bytes, VALUE_SHORT, *v as i64),
            EncodedValue::Char(v) => write_unsigned(bytes, VALUE_CHAR, *v as u64),
            EncodedValue::Int(v) => write_signed(bytes, VALUE_INT, *v as i64),
            EncodedValue::Long(v) => write_signed(bytes, VALUE_LONG, *v),
            EncodedValue::Float(v) => write_right_extended(bytes, VALUE_FLOAT, (v.to_bits() as u64) << 32),
            EncodedValue::Double(v) => write_right_extended(bytes, VALUE_DOUBLE, v.to_bits()),
            EncodedValue::MethodType(v) => write_unsigned(bytes, VALUE_METHOD_TYPE, *v as u64),
            EncodedValue::MethodHandle(v) => write_unsigned(bytes, VALUE_METHOD_HANDLE, *v as u64),
            EncodedValue::String(v) => write_unsigned(bytes, VALUE_STRING, *v as u64),
            EncodedValue::Type(v) => write_unsigned(bytes, VALUE_TYPE, *v as u64),
            EncodedValue::Field(v) => write_unsigned(bytes, VALUE_FIELD, *v as u64),
            EncodedValue::Method(v) => write_unsigned(bytes, VALUE_METHOD, *v as u64),
            EncodedValue::Enum(v) => write_unsigned(bytes, VALUE_ENUM, *v as u64),
            EncodedValue::Array(values) => {
                write_u1(bytes, VALUE_ARRAY) + write_encoded_array(values, bytes)
            }
            EncodedValue::Annotation(annotation) => {
                write_u1(bytes, VALUE_ANNOTATION) + annotation.write(bytes)
            }
            EncodedValue::Null => write_u1(bytes, VALUE_NULL),
            EncodedValue::Boolean(v) => write_u1(bytes, VALUE_BOOLEAN | ((*v as u8) << 5)),
        }
    }

    /// Rank used as the primary comparison key; ties are broken by payload.
    fn tag(&self) -> u8 {
        match self {
            EncodedValue::Byte(_) => VALUE_BYTE,
            EncodedValue::Short(_) => VALUE_SHORT,
            EncodedValue::Char(_) => VALUE_CHAR,
            EncodedValue::Int(_) => VALUE_INT,
            EncodedValue::Long(_) => VALUE_LONG,
            EncodedValue::Float(_) => VALUE_FLOAT,
            EncodedValue::Double(_) => VALUE_DOUBLE,
            EncodedValue::MethodType(_) => VALUE_METHOD_TYPE,
            EncodedValue::MethodHandle(_) => VALUE_METHOD_HANDLE,
            EncodedValue::String(_) => VALUE_STRING,
            EncodedValue::Type(_) => VALUE_TYPE,
            EncodedValue::Field(_) => VALUE_FIELD,
            EncodedValue::Method(_) => VALUE_METHOD,
            EncodedValue::Enum(_) => VALUE_ENUM,
            EncodedValue::Array(_) => VALUE_ARRAY,
            EncodedValue::Annotation(_) => VALUE_ANNOTATION,
            EncodedValue::Null => VALUE_NULL,
            EncodedValue::Boolean(_) => VALUE_BOOLEAN,
        }
    }
}

pub fn read_encoded_array(bytes: &[u8], ix: &mut usize) -> Result<Vec<EncodedValue>, DexError> {
    let size = read_uleb128(bytes, ix)? as usize;
    let mut values = Vec::with_capacity(size);
    for _ in 0..size {
        values.push(EncodedValue::read(bytes, ix)?);
    }
    Ok(values)
}

pub fn write_encoded_array(values: &[EncodedValue], bytes: &mut Vec<u8>) -> usize {
    let mut c = write_uleb128(bytes, values.len() as u32);
    for value in values {
        c += value.write(bytes);
    }
    c
}

/// Little-endian, zero-extended read of `size` payload bytes.
fn read_unsigned(bytes: &[u8], ix: &mut usize, size: usize) -> Result<u64, DexError> {
    let mut result = 0u64;
    for i in 0..size {
        result |= (read_u1(bytes, ix)? as u64) << (8 * i);
    }
    Ok(result)
}

/// Little-endian, sign-extended read of `size` payload bytes.
fn read_signed(bytes: &[u8], ix: &mut usize, size: usize) -> Result<i64, DexError> {
    let raw = read_unsigned(bytes, ix, size)?;
    let shift = 64 - 8 * size as u32;
    Ok(((raw << shift) as i64) >> shift)
}

/// Header byte plus the fewest little-endian bytes that zero-extend back to
/// `value`.
fn write_unsigned(bytes: &mut Vec<u8>, value_type: u8, value: u64) -> usize {
    let le = value.to_le_bytes();
    let mut size = 8;
    while size > 1 && le[size - 1] == 0 {
        size -= 1;
    }
    write_u1(bytes, ((size as u8 - 1) << 5) | value_type) + crate::dex::write_x(bytes, &le[..size])
}

/// Header byte plus the fewest little-endian bytes that sign-extend back to
/// `value`.
fn write_signed(bytes: &mut Vec<u8>, value_type: u8, value: i64) -> usize {
    let le = value.to_le_bytes();
    let mut size = 8;
    while size > 1 {
        let dropped = le[size - 1];
        let sign = if le[size - 2] & 0x80 != 0 { 0xff } else { 0x00 };
        if dropped != sign {
            break;
        }
        size -= 1;
    }
    write_u1(bytes, ((size as u8 - 1) << 5) | value_type) + crate::dex::write_x(bytes, &le[..size])
}

/// Floating-point payloads drop trailing zero bytes instead of leading ones:
/// the value occupies the most significant bytes. `value` carries the bit
/// pattern left-aligned in 64 bits.
fn write_right_extended(bytes: &mut Vec<u8>, value_type: u8, value: u64) -> usize {
    let total: usize = if value_type == VALUE_FLOAT { 4 } else { 8 };
    let mut size = total;
    while size > 1 && (value >> (8 * (8 - size))) & 0xff == 0 {
        size -= 1;
    }
    let mut c = write_u1(bytes, ((size as u8 - 1) << 5) | value_type);
    for i in 0..size {
        c += write_u1(bytes, (value >> (8 * (8 - size + i))) as u8);
    }
    c
}

fn cmp_f64_bits(a: u64, b: u64) -> Ordering {
    a.cmp(&b)
}

/// A total order so encoded arrays and annotations can flow through the
/// unsorted section merger: discriminant first, then payload; arrays and
/// element lists compare length before content.
impl Ord for EncodedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use EncodedValue::*;
        match (self, other) {
            (Byte(a), Byte(b)) => a.cmp(b),
            (Short(a), Short(b)) => a.cmp(b),
            (Char(a), Char(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Float(a), Float(b)) => cmp_f64_bits(a.to_bits() as u64, b.to_bits() as u64),
            (Double(a), Double(b)) => cmp_f64_bits(a.to_bits(), b.to_bits()),
            (MethodType(a), MethodType(b)) => a.cmp(b),
            (MethodHandle(a), MethodHandle(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Type(a), Type(b)) => a.cmp(b),
            (Field(a), Field(b)) => a.cmp(b),
            (Method(a), Method(b)) => a.cmp(b),
            (Enum(a), Enum(b)) => a.cmp(b),
            (Array(a), Array(b)) => cmp_value_slices(a, b),
            (Annotation(a), Annotation(b)) => a.cmp(b),
            (Null, Null) => Ordering::Equal,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

pub(crate) fn cmp_value_slices(a: &[EncodedValue], b: &[EncodedValue]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.iter().cmp(b.iter()))
}

impl PartialOrd for EncodedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EncodedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EncodedValue {}

impl Ord for AnnotationElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name_idx.cmp(&other.name_idx).then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for AnnotationElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for AnnotationElement {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AnnotationElement {}

impl Ord for EncodedAnnotation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_idx
            .cmp(&other.type_idx)
            .then_with(|| self.elements.len().cmp(&other.elements.len()))
            .then_with(|| self.elements.iter().cmp(other.elements.iter()))
    }
}

impl PartialOrd for EncodedAnnotation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EncodedAnnotation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EncodedAnnotation {}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &EncodedValue) -> EncodedValue {
        let mut bytes = vec![];
        value.write(&mut bytes);
        let mut ix = 0;
        let back = EncodedValue::read(&bytes, &mut ix).expect("read failed");
        assert_eq!(ix, bytes.len(), "trailing bytes after {:?}", value);
        back
    }

    #[test]
    fn scalar_roundtrips() {
        for value in [
            EncodedValue::Byte(-1),
            EncodedValue::Byte(127),
            EncodedValue::Short(0x1234),
            EncodedValue::Short(-2),
            EncodedValue::Char(0xffee),
            EncodedValue::Int(0x12345678),
            EncodedValue::Int(-1),
            EncodedValue::Long(i64::MIN),
            EncodedValue::Long(255),
            EncodedValue::String(0),
            EncodedValue::Type(0x1_0000),
            EncodedValue::Field(7),
            EncodedValue::Method(0xffff),
            EncodedValue::Enum(3),
            EncodedValue::Null,
            EncodedValue::Boolean(true),
            EncodedValue::Boolean(false),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn float_payload_drops_trailing_bytes() {
        // 1.0f is 0x3f800000: two significant bytes, so size 2.
        let mut bytes = vec![];
        EncodedValue::Float(1.0).write(&mut bytes);
        assert_eq!(bytes, vec![(1 << 5) | VALUE_FLOAT, 0x80, 0x3f]);
        assert_eq!(roundtrip(&EncodedValue::Float(1.0)), EncodedValue::Float(1.0));
        assert_eq!(roundtrip(&EncodedValue::Double(-2.5)), EncodedValue::Double(-2.5));
    }

    #[test]
    fn signed_encoding_is_minimal() {
        let mut bytes = vec![];
        EncodedValue::Int(-1).write(&mut bytes);
        assert_eq!(bytes, vec![VALUE_INT, 0xff]);

        let mut bytes = vec![];
        EncodedValue::Int(128).write(&mut bytes);
        assert_eq!(bytes, vec![(1 << 5) | VALUE_INT, 0x80, 0x00]);
    }

    #[test]
    fn nested_roundtrip() {
        let value = EncodedValue::Array(vec![
            EncodedValue::Int(1),
            EncodedValue::Annotation(EncodedAnnotation {
                type_idx: 4,
                elements: vec![AnnotationElement { name_idx: 2, value: EncodedValue::Boolean(true) }],
            }),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn array_order_is_length_first() {
        let short = EncodedValue::Array(vec![EncodedValue::Int(9)]);
        let long = EncodedValue::Array(vec![EncodedValue::Int(0), EncodedValue::Int(0)]);
        assert!(short < long);
    }

    #[test]
    fn distinct_tags_order_by_tag() {
        assert!(EncodedValue::Byte(5) < EncodedValue::Int(0));
        assert!(EncodedValue::Null < EncodedValue::Boolean(false));
    }
}
