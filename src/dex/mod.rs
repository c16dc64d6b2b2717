#[macro_use]
pub mod error;

pub mod encoded_values;
pub mod file;
pub mod items;
pub mod opcodes;

use crate::dex::error::DexError;

/* Constants */
pub const DEX_MAGIC_PREFIX: [u8; 4] = [0x64, 0x65, 0x78, 0x0a]; // "dex\n"
pub const ENDIAN_CONSTANT: u32 = 0x12345678;
pub const HEADER_SIZE: u32 = 0x70;
pub const NO_INDEX: u32 = 0xffff_ffff;

/* Map item type codes */
pub const TYPE_HEADER_ITEM: u16 = 0x0000;
pub const TYPE_STRING_ID_ITEM: u16 = 0x0001;
pub const TYPE_TYPE_ID_ITEM: u16 = 0x0002;
pub const TYPE_PROTO_ID_ITEM: u16 = 0x0003;
pub const TYPE_FIELD_ID_ITEM: u16 = 0x0004;
pub const TYPE_METHOD_ID_ITEM: u16 = 0x0005;
pub const TYPE_CLASS_DEF_ITEM: u16 = 0x0006;
pub const TYPE_MAP_LIST: u16 = 0x1000;
pub const TYPE_TYPE_LIST: u16 = 0x1001;
pub const TYPE_ANNOTATION_SET_REF_LIST: u16 = 0x1002;
pub const TYPE_ANNOTATION_SET_ITEM: u16 = 0x1003;
pub const TYPE_CLASS_DATA_ITEM: u16 = 0x2000;
pub const TYPE_CODE_ITEM: u16 = 0x2001;
pub const TYPE_STRING_DATA_ITEM: u16 = 0x2002;
pub const TYPE_DEBUG_INFO_ITEM: u16 = 0x2003;
pub const TYPE_ANNOTATION_ITEM: u16 = 0x2004;
pub const TYPE_ENCODED_ARRAY_ITEM: u16 = 0x2005;
pub const TYPE_ANNOTATIONS_DIRECTORY_ITEM: u16 = 0x2006;

/* Fixed record sizes in bytes */
pub const SIZE_UINT: u32 = 4;
pub const SIZE_STRING_ID_ITEM: u32 = 4;
pub const SIZE_TYPE_ID_ITEM: u32 = 4;
pub const SIZE_PROTO_ID_ITEM: u32 = 12;
pub const SIZE_MEMBER_ID_ITEM: u32 = 8;
pub const SIZE_CLASS_DEF_ITEM: u32 = 32;
pub const SIZE_MAP_ITEM: u32 = 12;
pub const SIZE_TRY_ITEM: u32 = 8;

/// Number of section kinds a table of contents tracks; the map list can
/// never hold more entries than this.
pub const SECTION_KIND_COUNT: u32 = 18;

pub const fn align4(value: u32) -> u32 {
    (value + 3) & !3
}

// Basic little-endian reads, cursor style

pub(crate) fn read_u1(bytes: &[u8], ix: &mut usize) -> Result<u8, DexError> {
    if bytes.len() < *ix + 1 {
        fail!("unexpected end of stream reading u1 at offset {}", *ix);
    }
    let result = bytes[*ix];
    *ix += 1;
    Ok(result)
}

pub(crate) fn read_u2(bytes: &[u8], ix: &mut usize) -> Result<u16, DexError> {
    if bytes.len() < *ix + 2 {
        fail!("unexpected end of stream reading u2 at offset {}", *ix);
    }
    let result = ((bytes[*ix + 1] as u16) << 8) | (bytes[*ix] as u16);
    *ix += 2;
    Ok(result)
}

pub(crate) fn read_u4(bytes: &[u8], ix: &mut usize) -> Result<u32, DexError> {
    if bytes.len() < *ix + 4 {
        fail!("unexpected end of stream reading u4 at offset {}", *ix);
    }
    let result = ((bytes[*ix + 3] as u32) << 24)
        | ((bytes[*ix + 2] as u32) << 16)
        | ((bytes[*ix + 1] as u32) << 8)
        | (bytes[*ix] as u32);
    *ix += 4;
    Ok(result)
}

pub(crate) fn read_x(bytes: &[u8], ix: &mut usize, length: usize) -> Result<Vec<u8>, DexError> {
    if bytes.len() < *ix + length {
        fail!("unexpected end of stream reading {} bytes at offset {}", length, *ix);
    }
    let v = bytes[*ix..*ix + length].to_vec();
    *ix += length;
    Ok(v)
}

pub(crate) fn read_uleb128(bytes: &[u8], ix: &mut usize) -> Result<u32, DexError> {
    let mut value: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = read_u1(bytes, ix)?;
        if shift >= 32 {
            fail!("uleb128 longer than five bytes at offset {}", *ix);
        }
        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(value)
}

pub(crate) fn read_sleb128(bytes: &[u8], ix: &mut usize) -> Result<i32, DexError> {
    let mut value: i32 = 0;
    let mut shift = 0;
    loop {
        let byte = read_u1(bytes, ix)?;
        if shift >= 32 {
            fail!("sleb128 longer than five bytes at offset {}", *ix);
        }
        value |= ((byte & 0x7f) as i32) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 32 && (byte & 0x40) != 0 {
                value |= -1 << shift;
            }
            break;
        }
    }
    Ok(value)
}

/// uleb128p1 stores `value + 1`, so the encoded 0 decodes to -1 (NO_INDEX).
pub(crate) fn read_uleb128p1(bytes: &[u8], ix: &mut usize) -> Result<i32, DexError> {
    Ok(read_uleb128(bytes, ix)? as i32 - 1)
}

// Little-endian writes; each returns the number of bytes appended

pub(crate) fn write_u1(buffer: &mut Vec<u8>, val: u8) -> usize {
    buffer.push(val);
    1
}

pub(crate) fn write_u2(buffer: &mut Vec<u8>, val: u16) -> usize {
    buffer.extend_from_slice(&val.to_le_bytes());
    2
}

pub(crate) fn write_u4(buffer: &mut Vec<u8>, val: u32) -> usize {
    buffer.extend_from_slice(&val.to_le_bytes());
    4
}

pub(crate) fn write_x(buffer: &mut Vec<u8>, val: &[u8]) -> usize {
    buffer.extend_from_slice(val);
    val.len()
}

pub(crate) fn write_uleb128(buffer: &mut Vec<u8>, val: u32) -> usize {
    let mut remaining = val;
    let mut count = 0;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        buffer.push(byte);
        count += 1;
        if remaining == 0 {
            return count;
        }
    }
}

pub(crate) fn write_sleb128(buffer: &mut Vec<u8>, val: i32) -> usize {
    let mut remaining = val;
    let mut count = 0;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        let more = !((remaining == 0 && byte & 0x40 == 0) || (remaining == -1 && byte & 0x40 != 0));
        if more {
            byte |= 0x80;
        }
        buffer.push(byte);
        count += 1;
        if !more {
            return count;
        }
    }
}

pub(crate) fn write_uleb128p1(buffer: &mut Vec<u8>, val: i32) -> usize {
    write_uleb128(buffer, (val + 1) as u32)
}
