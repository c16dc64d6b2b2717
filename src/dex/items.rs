/* Parsed DEX records and the orderings their sections sort by */

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::dex::encoded_values::EncodedAnnotation;
use crate::dex::error::DexError;
use crate::dex::{
    read_u1, read_u2, read_u4, read_uleb128, write_u1, write_u2, write_u4, write_uleb128,
};

/// type_list: a count followed by packed 16-bit type indices.
/// Lists compare element-wise with a shorter prefix sorting first, which is
/// exactly the derived `Vec` ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeList(pub Vec<u16>);

impl TypeList {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<TypeList, DexError> {
        let size = read_u4(bytes, ix)?;
        let mut v = Vec::with_capacity(size as usize);
        for _ in 0..size {
            v.push(read_u2(bytes, ix)?);
        }
        Ok(TypeList(v))
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = write_u4(bytes, self.0.len() as u32);
        for i in &self.0 {
            c += write_u2(bytes, *i);
        }
        c
    }
}

/// proto_id_item. The section sorts by (return type, parameter list); the
/// parameter comparison goes through the merged type-list offset, which is
/// monotonic in list value because that section is emitted value-sorted.
/// Offset 0 (no parameters) correctly sorts first. The shorty is derived
/// from the signature, so it takes no part in comparison.
#[derive(Debug, Clone)]
pub struct ProtoId {
    pub shorty_idx: u32,
    pub return_type_idx: u32,
    pub parameters_off: u32,
}

impl ProtoId {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ProtoId, DexError> {
        Ok(ProtoId {
            shorty_idx: read_u4(bytes, ix)?,
            return_type_idx: read_u4(bytes, ix)?,
            parameters_off: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u4(bytes, self.shorty_idx)
            + write_u4(bytes, self.return_type_idx)
            + write_u4(bytes, self.parameters_off)
    }
}

impl Ord for ProtoId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.return_type_idx
            .cmp(&other.return_type_idx)
            .then_with(|| self.parameters_off.cmp(&other.parameters_off))
    }
}

impl PartialOrd for ProtoId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ProtoId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ProtoId {}

/// field_id_item, sorted by (defining type, name, type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldId {
    pub class_idx: u16,
    pub type_idx: u16,
    pub name_idx: u32,
}

impl FieldId {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<FieldId, DexError> {
        Ok(FieldId {
            class_idx: read_u2(bytes, ix)?,
            type_idx: read_u2(bytes, ix)?,
            name_idx: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u2(bytes, self.class_idx) + write_u2(bytes, self.type_idx) + write_u4(bytes, self.name_idx)
    }
}

impl Ord for FieldId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class_idx
            .cmp(&other.class_idx)
            .then_with(|| self.name_idx.cmp(&other.name_idx))
            .then_with(|| self.type_idx.cmp(&other.type_idx))
    }
}

impl PartialOrd for FieldId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// method_id_item, sorted by (defining type, name, prototype).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodId {
    pub class_idx: u16,
    pub proto_idx: u16,
    pub name_idx: u32,
}

impl MethodId {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<MethodId, DexError> {
        Ok(MethodId {
            class_idx: read_u2(bytes, ix)?,
            proto_idx: read_u2(bytes, ix)?,
            name_idx: read_u4(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u2(bytes, self.class_idx) + write_u2(bytes, self.proto_idx) + write_u4(bytes, self.name_idx)
    }
}

impl Ord for MethodId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class_idx
            .cmp(&other.class_idx)
            .then_with(|| self.name_idx.cmp(&other.name_idx))
            .then_with(|| self.proto_idx.cmp(&other.proto_idx))
    }
}

impl PartialOrd for MethodId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// class_def_item, 32 bytes. Offsets stay in the source file's space; the
/// merger remaps them as it rewrites.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub class_idx: u32,
    pub access_flags: u32,
    pub superclass_idx: u32,
    pub interfaces_off: u32,
    pub source_file_idx: u32,
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

impl ClassDef {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassDef, DexError> {
        Ok(ClassDef {
            class_idx: read_u4(bytes, ix)?,
            access_flags: read_u4(bytes, ix)?,
            superclass_idx: read_u4(bytes, ix)?,
            interfaces_off: read_u4(bytes, ix)?,
            source_file_idx: read_u4(bytes, ix)?,
            annotations_off: read_u4(bytes, ix)?,
            class_data_off: read_u4(bytes, ix)?,
            static_values_off: read_u4(bytes, ix)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFieldEntry {
    pub field_idx: u32,
    pub access_flags: u32,
}

#[derive(Debug, Clone)]
pub struct EncodedMethodEntry {
    pub method_idx: u32,
    pub access_flags: u32,
    pub code_off: u32,
}

/// class_data_item with the delta-encoded member indices already
/// accumulated into absolute ones; the merger re-deltas them in the new
/// index space when writing.
#[derive(Debug, Clone)]
pub struct ClassData {
    pub static_fields: Vec<EncodedFieldEntry>,
    pub instance_fields: Vec<EncodedFieldEntry>,
    pub direct_methods: Vec<EncodedMethodEntry>,
    pub virtual_methods: Vec<EncodedMethodEntry>,
}

impl ClassData {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassData, DexError> {
        let static_fields_size = read_uleb128(bytes, ix)?;
        let instance_fields_size = read_uleb128(bytes, ix)?;
        let direct_methods_size = read_uleb128(bytes, ix)?;
        let virtual_methods_size = read_uleb128(bytes, ix)?;

        Ok(ClassData {
            static_fields: Self::read_fields(bytes, ix, static_fields_size)?,
            instance_fields: Self::read_fields(bytes, ix, instance_fields_size)?,
            direct_methods: Self::read_methods(bytes, ix, direct_methods_size)?,
            virtual_methods: Self::read_methods(bytes, ix, virtual_methods_size)?,
        })
    }

    fn read_fields(
        bytes: &[u8],
        ix: &mut usize,
        count: u32,
    ) -> Result<Vec<EncodedFieldEntry>, DexError> {
        let mut fields = Vec::with_capacity(count as usize);
        let mut field_idx = 0u32;
        for _ in 0..count {
            field_idx += read_uleb128(bytes, ix)?;
            fields.push(EncodedFieldEntry { field_idx, access_flags: read_uleb128(bytes, ix)? });
        }
        Ok(fields)
    }

    fn read_methods(
        bytes: &[u8],
        ix: &mut usize,
        count: u32,
    ) -> Result<Vec<EncodedMethodEntry>, DexError> {
        let mut methods = Vec::with_capacity(count as usize);
        let mut method_idx = 0u32;
        for _ in 0..count {
            method_idx += read_uleb128(bytes, ix)?;
            let access_flags = read_uleb128(bytes, ix)?;
            let code_off = read_uleb128(bytes, ix)?;
            methods.push(EncodedMethodEntry { method_idx, access_flags, code_off });
        }
        Ok(methods)
    }
}

/// try_item with the handler offset already resolved to an index into the
/// code item's handler list.
#[derive(Debug, Clone)]
pub struct Try {
    pub start_addr: u32,
    pub insn_count: u16,
    pub handler_index: usize,
}

#[derive(Debug, Clone)]
pub struct CatchHandler {
    /// (type index, handler address) pairs.
    pub pairs: Vec<(u32, u32)>,
    pub catch_all_addr: Option<u32>,
}

/// code_item. The instruction stream is kept as raw 16-bit code units for
/// the instruction transformer.
#[derive(Debug, Clone)]
pub struct Code {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub debug_info_off: u32,
    pub insns: Vec<u16>,
    pub tries: Vec<Try>,
    pub handlers: Vec<CatchHandler>,
}

impl Code {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<Code, DexError> {
        let registers_size = read_u2(bytes, ix)?;
        let ins_size = read_u2(bytes, ix)?;
        let outs_size = read_u2(bytes, ix)?;
        let tries_size = read_u2(bytes, ix)?;
        let debug_info_off = read_u4(bytes, ix)?;
        let insns_size = read_u4(bytes, ix)?;

        let mut insns = Vec::with_capacity(insns_size as usize);
        for _ in 0..insns_size {
            insns.push(read_u2(bytes, ix)?);
        }

        let mut tries = Vec::new();
        let mut handlers = Vec::new();
        if tries_size > 0 {
            if insns_size % 2 == 1 {
                let _padding = read_u2(bytes, ix)?;
            }

            // try_items reference handlers by byte offset into the handler
            // list that follows them; read the raw offsets first, then the
            // list, then resolve offsets to indices.
            let mut raw_tries = Vec::with_capacity(tries_size as usize);
            for _ in 0..tries_size {
                let start_addr = read_u4(bytes, ix)?;
                let insn_count = read_u2(bytes, ix)?;
                let handler_off = read_u2(bytes, ix)?;
                raw_tries.push((start_addr, insn_count, handler_off));
            }

            let list_base = *ix;
            let handler_count = read_uleb128(bytes, ix)?;
            let mut offset_to_index = HashMap::new();
            for i in 0..handler_count {
                offset_to_index.insert((*ix - list_base) as u16, i as usize);
                handlers.push(Self::read_catch_handler(bytes, ix)?);
            }

            for (start_addr, insn_count, handler_off) in raw_tries {
                let handler_index = *offset_to_index.get(&handler_off).ok_or_else(|| {
                    DexError::new(&format!("try references no handler at offset {}", handler_off))
                })?;
                tries.push(Try { start_addr, insn_count, handler_index });
            }
        }

        Ok(Code { registers_size, ins_size, outs_size, debug_info_off, insns, tries, handlers })
    }

    fn read_catch_handler(bytes: &[u8], ix: &mut usize) -> Result<CatchHandler, DexError> {
        let size = crate::dex::read_sleb128(bytes, ix)?;
        let type_count = size.unsigned_abs() as usize;
        let mut pairs = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let type_idx = read_uleb128(bytes, ix)?;
            let addr = read_uleb128(bytes, ix)?;
            pairs.push((type_idx, addr));
        }
        let catch_all_addr = if size <= 0 { Some(read_uleb128(bytes, ix)?) } else { None };
        Ok(CatchHandler { pairs, catch_all_addr })
    }
}

/// annotation_item: a visibility byte wrapping an encoded annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub visibility: u8,
    pub annotation: EncodedAnnotation,
}

impl Annotation {
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<Annotation, DexError> {
        Ok(Annotation {
            visibility: read_u1(bytes, ix)?,
            annotation: EncodedAnnotation::read(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        write_u1(bytes, self.visibility) + self.annotation.write(bytes)
    }
}

impl Ord for Annotation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.visibility
            .cmp(&other.visibility)
            .then_with(|| self.annotation.cmp(&other.annotation))
    }
}

impl PartialOrd for Annotation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A list of 32-bit values (annotation sets and set-ref lists), ordered
/// with length as the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntArray(pub Vec<u32>);

impl Ord for IntArray {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.len().cmp(&other.0.len()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for IntArray {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// annotations_directory_item, held with its member references already
/// remapped. Each member list is a sequence of (id, annotation offset)
/// pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDirectory {
    pub class_annotations_off: u32,
    pub fields: Vec<[u32; 2]>,
    pub methods: Vec<[u32; 2]>,
    pub parameters: Vec<[u32; 2]>,
}

impl AnnotationDirectory {
    pub fn write(&self, bytes: &mut Vec<u8>) -> usize {
        let mut c = 0;
        c += write_u4(bytes, self.class_annotations_off);
        c += write_u4(bytes, self.fields.len() as u32);
        c += write_u4(bytes, self.methods.len() as u32);
        c += write_u4(bytes, self.parameters.len() as u32);
        for pair in self.fields.iter().chain(&self.methods).chain(&self.parameters) {
            c += write_u4(bytes, pair[0]);
            c += write_u4(bytes, pair[1]);
        }
        c
    }
}

fn cmp_pair_lists(a: &[[u32; 2]], b: &[[u32; 2]]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Ord for AnnotationDirectory {
    fn cmp(&self, other: &Self) -> Ordering {
        self.class_annotations_off
            .cmp(&other.class_annotations_off)
            .then_with(|| cmp_pair_lists(&self.fields, &other.fields))
            .then_with(|| cmp_pair_lists(&self.methods, &other.methods))
            .then_with(|| cmp_pair_lists(&self.parameters, &other.parameters))
    }
}

impl PartialOrd for AnnotationDirectory {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
