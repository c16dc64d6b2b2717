/* DEX container structures: header, map list, table of contents, input buffer */

use std::cmp::Ordering;
use std::path::Path;

use adler::adler32_slice;
use cesu8::{from_java_cesu8, to_java_cesu8};
use sha1::{Digest, Sha1};

use crate::dex::error::DexError;
use crate::dex::items::ClassDef;
use crate::dex::{
    read_u1, read_u2, read_u4, read_uleb128, read_x, write_u1, write_u2, write_u4, write_uleb128,
    write_x,
    DEX_MAGIC_PREFIX, ENDIAN_CONSTANT, HEADER_SIZE, SIZE_CLASS_DEF_ITEM, SIZE_STRING_ID_ITEM,
    SIZE_TYPE_ID_ITEM, TYPE_ANNOTATIONS_DIRECTORY_ITEM, TYPE_ANNOTATION_ITEM,
    TYPE_ANNOTATION_SET_ITEM, TYPE_ANNOTATION_SET_REF_LIST, TYPE_CLASS_DATA_ITEM,
    TYPE_CLASS_DEF_ITEM, TYPE_CODE_ITEM, TYPE_DEBUG_INFO_ITEM, TYPE_ENCODED_ARRAY_ITEM,
    TYPE_FIELD_ID_ITEM, TYPE_HEADER_ITEM, TYPE_MAP_LIST, TYPE_METHOD_ID_ITEM, TYPE_PROTO_ID_ITEM,
    TYPE_STRING_DATA_ITEM, TYPE_STRING_ID_ITEM, TYPE_TYPE_ID_ITEM, TYPE_TYPE_LIST,
};

/// Magic written into merged output: `"dex\n035\0"`.
pub const DEX_FILE_MAGIC: [u8; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00];

#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 8],
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link_size: u32,
    pub link_off: u32,
    pub map_off: u32,
    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
    pub data_size: u32,
    pub data_off: u32,
}

impl Header {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<Header, DexError> {
        if bytes.len() < HEADER_SIZE as usize {
            fail!("not enough bytes for a dex header: {}", bytes.len());
        }

        let magic = <[u8; 8]>::try_from(read_x(bytes, ix, 8)?).unwrap();
        if magic[..4] != DEX_MAGIC_PREFIX || magic[7] != 0 {
            fail!("invalid dex magic {:02x?}", magic);
        }

        let header = Header {
            magic,
            checksum: read_u4(bytes, ix)?,
            signature: <[u8; 20]>::try_from(read_x(bytes, ix, 20)?).unwrap(),
            file_size: read_u4(bytes, ix)?,
            header_size: read_u4(bytes, ix)?,
            endian_tag: read_u4(bytes, ix)?,
            link_size: read_u4(bytes, ix)?,
            link_off: read_u4(bytes, ix)?,
            map_off: read_u4(bytes, ix)?,
            string_ids_size: read_u4(bytes, ix)?,
            string_ids_off: read_u4(bytes, ix)?,
            type_ids_size: read_u4(bytes, ix)?,
            type_ids_off: read_u4(bytes, ix)?,
            proto_ids_size: read_u4(bytes, ix)?,
            proto_ids_off: read_u4(bytes, ix)?,
            field_ids_size: read_u4(bytes, ix)?,
            field_ids_off: read_u4(bytes, ix)?,
            method_ids_size: read_u4(bytes, ix)?,
            method_ids_off: read_u4(bytes, ix)?,
            class_defs_size: read_u4(bytes, ix)?,
            class_defs_off: read_u4(bytes, ix)?,
            data_size: read_u4(bytes, ix)?,
            data_off: read_u4(bytes, ix)?,
        };

        if header.header_size != HEADER_SIZE {
            fail!("unexpected header size {:#x}", header.header_size);
        }
        if header.endian_tag != ENDIAN_CONSTANT {
            fail!("unexpected endian tag {:#010x}", header.endian_tag);
        }

        Ok(header)
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_x(bytes, &self.magic);
        c += write_u4(bytes, self.checksum);
        c += write_x(bytes, &self.signature);
        c += write_u4(bytes, self.file_size);
        c += write_u4(bytes, self.header_size);
        c += write_u4(bytes, self.endian_tag);
        c += write_u4(bytes, self.link_size);
        c += write_u4(bytes, self.link_off);
        c += write_u4(bytes, self.map_off);
        c += write_u4(bytes, self.string_ids_size);
        c += write_u4(bytes, self.string_ids_off);
        c += write_u4(bytes, self.type_ids_size);
        c += write_u4(bytes, self.type_ids_off);
        c += write_u4(bytes, self.proto_ids_size);
        c += write_u4(bytes, self.proto_ids_off);
        c += write_u4(bytes, self.field_ids_size);
        c += write_u4(bytes, self.field_ids_off);
        c += write_u4(bytes, self.method_ids_size);
        c += write_u4(bytes, self.method_ids_off);
        c += write_u4(bytes, self.class_defs_size);
        c += write_u4(bytes, self.class_defs_off);
        c += write_u4(bytes, self.data_size);
        c += write_u4(bytes, self.data_off);
        c
    }
}

/// One entry in the table of contents: a section's map type code, item
/// count, start offset and (derived) byte extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocSection {
    pub type_code: u16,
    pub size: u32,
    pub off: u32,
    pub byte_count: u32,
}

impl TocSection {
    pub fn new(type_code: u16) -> Self {
        TocSection { type_code, size: 0, off: 0, byte_count: 0 }
    }

    pub fn exists(&self) -> bool {
        self.size > 0
    }
}

/// Every section a DEX file can carry, in physical output order.
#[derive(Debug)]
pub struct TableOfContents {
    pub header: TocSection,
    pub string_ids: TocSection,
    pub type_ids: TocSection,
    pub proto_ids: TocSection,
    pub field_ids: TocSection,
    pub method_ids: TocSection,
    pub class_defs: TocSection,
    pub map_list: TocSection,
    pub type_lists: TocSection,
    pub annotation_set_ref_lists: TocSection,
    pub annotation_sets: TocSection,
    pub class_datas: TocSection,
    pub codes: TocSection,
    pub string_datas: TocSection,
    pub debug_infos: TocSection,
    pub annotations: TocSection,
    pub encoded_arrays: TocSection,
    pub annotations_directories: TocSection,

    pub file_size: u32,
    pub data_off: u32,
    pub data_size: u32,
}

impl Default for TableOfContents {
    fn default() -> Self {
        TableOfContents {
            header: TocSection::new(TYPE_HEADER_ITEM),
            string_ids: TocSection::new(TYPE_STRING_ID_ITEM),
            type_ids: TocSection::new(TYPE_TYPE_ID_ITEM),
            proto_ids: TocSection::new(TYPE_PROTO_ID_ITEM),
            field_ids: TocSection::new(TYPE_FIELD_ID_ITEM),
            method_ids: TocSection::new(TYPE_METHOD_ID_ITEM),
            class_defs: TocSection::new(TYPE_CLASS_DEF_ITEM),
            map_list: TocSection::new(TYPE_MAP_LIST),
            type_lists: TocSection::new(TYPE_TYPE_LIST),
            annotation_set_ref_lists: TocSection::new(TYPE_ANNOTATION_SET_REF_LIST),
            annotation_sets: TocSection::new(TYPE_ANNOTATION_SET_ITEM),
            class_datas: TocSection::new(TYPE_CLASS_DATA_ITEM),
            codes: TocSection::new(TYPE_CODE_ITEM),
            string_datas: TocSection::new(TYPE_STRING_DATA_ITEM),
            debug_infos: TocSection::new(TYPE_DEBUG_INFO_ITEM),
            annotations: TocSection::new(TYPE_ANNOTATION_ITEM),
            encoded_arrays: TocSection::new(TYPE_ENCODED_ARRAY_ITEM),
            annotations_directories: TocSection::new(TYPE_ANNOTATIONS_DIRECTORY_ITEM),
            file_size: 0,
            data_off: 0,
            data_size: 0,
        }
    }
}

impl TableOfContents {
    fn sections(&self) -> [&TocSection; 18] {
        [
            &self.header,
            &self.string_ids,
            &self.type_ids,
            &self.proto_ids,
            &self.field_ids,
            &self.method_ids,
            &self.class_defs,
            &self.map_list,
            &self.type_lists,
            &self.annotation_set_ref_lists,
            &self.annotation_sets,
            &self.class_datas,
            &self.codes,
            &self.string_datas,
            &self.debug_infos,
            &self.annotations,
            &self.encoded_arrays,
            &self.annotations_directories,
        ]
    }

    fn sections_mut(&mut self) -> [&mut TocSection; 18] {
        [
            &mut self.header,
            &mut self.string_ids,
            &mut self.type_ids,
            &mut self.proto_ids,
            &mut self.field_ids,
            &mut self.method_ids,
            &mut self.class_defs,
            &mut self.map_list,
            &mut self.type_lists,
            &mut self.annotation_set_ref_lists,
            &mut self.annotation_sets,
            &mut self.class_datas,
            &mut self.codes,
            &mut self.string_datas,
            &mut self.debug_infos,
            &mut self.annotations,
            &mut self.encoded_arrays,
            &mut self.annotations_directories,
        ]
    }

    /// Parses a table of contents out of a complete file image: the fixed
    /// header supplies the IDs sections, the map list supplies the rest.
    pub fn read(bytes: &[u8]) -> Result<TableOfContents, DexError> {
        let mut ix = 0;
        let header = Header::read(bytes, &mut ix)?;

        let mut toc = TableOfContents::default();
        toc.file_size = header.file_size;
        toc.data_off = header.data_off;
        toc.data_size = header.data_size;

        toc.header.size = 1;
        toc.string_ids.size = header.string_ids_size;
        toc.string_ids.off = header.string_ids_off;
        toc.type_ids.size = header.type_ids_size;
        toc.type_ids.off = header.type_ids_off;
        toc.proto_ids.size = header.proto_ids_size;
        toc.proto_ids.off = header.proto_ids_off;
        toc.field_ids.size = header.field_ids_size;
        toc.field_ids.off = header.field_ids_off;
        toc.method_ids.size = header.method_ids_size;
        toc.method_ids.off = header.method_ids_off;
        toc.class_defs.size = header.class_defs_size;
        toc.class_defs.off = header.class_defs_off;
        toc.map_list.size = 1;
        toc.map_list.off = header.map_off;

        toc.read_map(bytes, header.map_off)?;
        toc.compute_byte_counts()?;
        Ok(toc)
    }

    fn read_map(&mut self, bytes: &[u8], map_off: u32) -> Result<(), DexError> {
        let mut ix = map_off as usize;
        let count = read_u4(bytes, &mut ix)?;
        for _ in 0..count {
            let type_code = read_u2(bytes, &mut ix)?;
            let _unused = read_u2(bytes, &mut ix)?;
            let size = read_u4(bytes, &mut ix)?;
            let off = read_u4(bytes, &mut ix)?;

            let section = self
                .sections_mut()
                .into_iter()
                .find(|s| s.type_code == type_code)
                .ok_or_else(|| {
                    DexError::new(&format!("unknown map item type {:#06x}", type_code))
                })?;
            if section.exists() && (section.size != size || section.off != off) {
                fail!("map list disagrees with header for section {:#06x}", type_code);
            }
            section.size = size;
            section.off = off;
        }
        Ok(())
    }

    /// Derives each section's byte extent from the gaps between section
    /// offsets. Needed by the exact sizing pass; the format itself never
    /// records these.
    pub fn compute_byte_counts(&mut self) -> Result<(), DexError> {
        let file_size = self.file_size;
        let mut existing: Vec<&mut TocSection> = self
            .sections_mut()
            .into_iter()
            .filter(|s| s.exists())
            .collect();
        existing.sort_by_key(|s| s.off);

        for i in 0..existing.len() {
            let end = if i + 1 < existing.len() { existing[i + 1].off } else { file_size };
            if end < existing[i].off {
                fail!("section offsets overlap at {:#x}", existing[i].off);
            }
            existing[i].byte_count = end - existing[i].off;
        }
        Ok(())
    }

    /// Serializes the map list: every non-empty section exactly once, in
    /// ascending offset order.
    pub fn map_bytes(&self) -> Vec<u8> {
        let mut entries: Vec<&TocSection> =
            self.sections().into_iter().filter(|s| s.exists()).collect();
        entries.sort_by_key(|s| s.off);

        let mut bytes = Vec::with_capacity(4 + entries.len() * 12);
        write_u4(&mut bytes, entries.len() as u32);
        for section in entries {
            write_u2(&mut bytes, section.type_code);
            write_u2(&mut bytes, 0);
            write_u4(&mut bytes, section.size);
            write_u4(&mut bytes, section.off);
        }
        bytes
    }

    /// Serializes the 0x70-byte header with zeroed hashes; `write_hashes`
    /// stamps those once the file image is complete.
    pub fn header_bytes(&self) -> Vec<u8> {
        fn off_of(section: &TocSection) -> u32 {
            if section.exists() { section.off } else { 0 }
        }

        let header = Header {
            magic: DEX_FILE_MAGIC,
            checksum: 0,
            signature: [0; 20],
            file_size: self.file_size,
            header_size: HEADER_SIZE,
            endian_tag: ENDIAN_CONSTANT,
            link_size: 0,
            link_off: 0,
            map_off: self.map_list.off,
            string_ids_size: self.string_ids.size,
            string_ids_off: off_of(&self.string_ids),
            type_ids_size: self.type_ids.size,
            type_ids_off: off_of(&self.type_ids),
            proto_ids_size: self.proto_ids.size,
            proto_ids_off: off_of(&self.proto_ids),
            field_ids_size: self.field_ids.size,
            field_ids_off: off_of(&self.field_ids),
            method_ids_size: self.method_ids.size,
            method_ids_off: off_of(&self.method_ids),
            class_defs_size: self.class_defs.size,
            class_defs_off: off_of(&self.class_defs),
            data_size: self.data_size,
            data_off: self.data_off,
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE as usize);
        header.write(&mut bytes);
        bytes
    }
}

/// Computes and stores the two header hashes: SHA-1 over everything after
/// the signature field, then Adler-32 over everything after the checksum
/// field.
pub fn write_hashes(file: &mut [u8]) -> Result<(), DexError> {
    if file.len() < HEADER_SIZE as usize {
        fail!("file too short to hash: {} bytes", file.len());
    }

    let mut hasher = Sha1::new();
    hasher.update(&file[32..]);
    let signature = hasher.finalize();
    file[12..32].copy_from_slice(&signature);

    let checksum = adler32_slice(&file[12..]);
    file[8..12].copy_from_slice(&checksum.to_le_bytes());
    Ok(())
}

/// An input DEX held in memory, read-only for the duration of a merge.
#[derive(Debug)]
pub struct DexBuffer {
    bytes: Vec<u8>,
    toc: TableOfContents,
}

impl DexBuffer {
    /// An empty buffer with no sections; merging against it reproduces the
    /// other input. Used by the compaction pass.
    pub fn empty() -> Self {
        DexBuffer { bytes: Vec::new(), toc: TableOfContents::default() }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DexError> {
        let toc = TableOfContents::read(&bytes)?;
        Ok(DexBuffer { bytes, toc })
    }

    pub fn from_file(path: &Path) -> Result<Self, DexError> {
        let bytes = std::fs::read(path)
            .map_err(|e| DexError::from(e).context(path.display().to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    /// The string behind `string_ids[index]`.
    pub fn string(&self, index: u32) -> Result<DexString, DexError> {
        if index >= self.toc.string_ids.size {
            fail!("string index {} out of range", index);
        }
        let mut ix = (self.toc.string_ids.off + index * SIZE_STRING_ID_ITEM) as usize;
        let mut data_ix = read_u4(&self.bytes, &mut ix)? as usize;
        DexString::read(&self.bytes, &mut data_ix)
    }

    /// The descriptor behind `type_ids[index]`, for diagnostics.
    pub fn type_name(&self, index: u32) -> Result<String, DexError> {
        if index >= self.toc.type_ids.size {
            fail!("type index {} out of range", index);
        }
        let mut ix = (self.toc.type_ids.off + index * SIZE_TYPE_ID_ITEM) as usize;
        let string_index = read_u4(&self.bytes, &mut ix)?;
        self.string(string_index)?.to_string()
    }

    pub fn class_defs(&self) -> Result<Vec<ClassDef>, DexError> {
        let section = &self.toc.class_defs;
        let mut defs = Vec::with_capacity(section.size as usize);
        let mut ix = section.off as usize;
        for _ in 0..section.size {
            defs.push(ClassDef::read(&self.bytes, &mut ix)?);
        }
        debug_assert_eq!(
            ix as u32,
            section.off + section.size * SIZE_CLASS_DEF_ITEM,
            "class_def_item must be 32 bytes"
        );
        Ok(defs)
    }
}

/// A string from the string_data section. Strings that decode as valid
/// MUTF-8 are held as text; anything else keeps its raw payload so it can
/// round-trip untouched.
#[derive(Debug, Clone)]
pub enum DexString {
    Decoded(String),
    Raw(u32, Vec<u8>),
}

impl DexString {
    pub fn from_string(s: &str) -> DexString {
        DexString::Decoded(s.to_string())
    }

    pub fn to_string(&self) -> Result<String, DexError> {
        match self {
            DexString::Decoded(s) => Ok(s.clone()),
            DexString::Raw(_, _) => Err(DexError::new("string is not valid MUTF-8")),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DexString::Decoded(s) => Some(s),
            DexString::Raw(_, _) => None,
        }
    }

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<DexString, DexError> {
        let utf16_size = read_uleb128(bytes, ix)?;
        let mut v = vec![];
        loop {
            let u = read_u1(bytes, ix)?;
            if u == 0 {
                break;
            }
            v.push(u);
        }

        Ok(match from_java_cesu8(v.as_slice()) {
            Ok(converted) => DexString::Decoded(converted.to_string()),
            _ => DexString::Raw(utf16_size, v),
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        match self {
            DexString::Raw(utf16_size, v) => {
                c += write_uleb128(bytes, *utf16_size);
                c += write_x(bytes, v);
                c += write_u1(bytes, 0);
            }
            DexString::Decoded(s) => {
                c += write_uleb128(bytes, s.encode_utf16().count() as u32);
                c += write_x(bytes, &to_java_cesu8(s));
                c += write_u1(bytes, 0);
            }
        }
        c
    }

    /// The MUTF-8 payload, excluding the terminating NUL.
    fn mutf8_bytes(&self) -> Vec<u8> {
        match self {
            DexString::Decoded(s) => to_java_cesu8(s).into_owned(),
            DexString::Raw(_, v) => v.clone(),
        }
    }
}

/// String IDs sort by string content in modified-UTF-8 order, which is the
/// byte order of the encoded form (equivalently, UTF-16 code-unit order).
impl Ord for DexString {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DexString::Decoded(a), DexString::Decoded(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            _ => self.mutf8_bytes().cmp(&other.mutf8_bytes()),
        }
    }
}

impl PartialOrd for DexString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DexString {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DexString {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = Header {
            magic: DEX_FILE_MAGIC,
            checksum: 0x11223344,
            signature: [7; 20],
            file_size: 0x1000,
            header_size: HEADER_SIZE,
            endian_tag: ENDIAN_CONSTANT,
            link_size: 0,
            link_off: 0,
            map_off: 0x800,
            string_ids_size: 3,
            string_ids_off: 0x70,
            type_ids_size: 2,
            type_ids_off: 0x7c,
            proto_ids_size: 0,
            proto_ids_off: 0,
            field_ids_size: 0,
            field_ids_off: 0,
            method_ids_size: 0,
            method_ids_off: 0,
            class_defs_size: 1,
            class_defs_off: 0x84,
            data_size: 0x100,
            data_off: 0xa4,
        };

        let mut bytes = vec![];
        assert_eq!(header.write(&mut bytes), HEADER_SIZE as usize);
        let mut ix = 0;
        let decoded = Header::read(&bytes, &mut ix).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut bytes = vec![0u8; HEADER_SIZE as usize];
        bytes[..4].copy_from_slice(b"oops");
        let mut ix = 0;
        assert!(Header::read(&bytes, &mut ix).is_err());
    }

    #[test]
    fn dex_string_roundtrip() {
        for s in ["", "hello", "Ljava/lang/Object;", "\u{20ac}"] {
            let ds = DexString::from_string(s);
            let mut bytes = vec![];
            ds.write(&mut bytes);
            let mut ix = 0;
            let back = DexString::read(&bytes, &mut ix).unwrap();
            assert_eq!(back.to_string().unwrap(), s);
            assert_eq!(ix, bytes.len());
        }
    }

    #[test]
    fn dex_string_supplementary_roundtrip() {
        // One supplementary character: 2 UTF-16 code units, 6 CESU-8 bytes.
        let ds = DexString::from_string("\u{1f600}");
        let mut bytes = vec![];
        ds.write(&mut bytes);
        assert_eq!(bytes[0], 2); // utf16 length prefix
        let mut ix = 0;
        let back = DexString::read(&bytes, &mut ix).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn dex_string_order_is_utf16_order() {
        // U+FFFD (BMP, sorts after surrogates) vs U+10000 (supplementary).
        let a = DexString::from_string("\u{fffd}");
        let b = DexString::from_string("\u{10000}");
        assert_eq!(a.cmp(&b), Ordering::Greater);
        // Plain ASCII agrees with byte order.
        assert!(DexString::from_string("A") < DexString::from_string("B"));
    }

    #[test]
    fn write_hashes_is_self_consistent() {
        let mut file = vec![0u8; 0x80];
        file[..8].copy_from_slice(&DEX_FILE_MAGIC);
        write_hashes(&mut file).unwrap();

        let mut hasher = Sha1::new();
        hasher.update(&file[32..]);
        assert_eq!(file[12..32], hasher.finalize()[..]);
        assert_eq!(
            u32::from_le_bytes(file[8..12].try_into().unwrap()),
            adler32_slice(&file[12..])
        );
    }
}
