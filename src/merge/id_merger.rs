//! The generic section-pair merger and one strategy per section kind.
//!
//! Sorted sections stream with two one-item look-ahead windows: the smaller
//! value is written, equal values advance both sides and are written once.
//! Offset-referenced sections are read whole, stable-sorted by value, and
//! each run of equal values is emitted once with every (input, old offset)
//! in the run mapped to the shared new position.

use std::cmp::Ordering;

use crate::dex::encoded_values::{cmp_value_slices, read_encoded_array, write_encoded_array, EncodedValue};
use crate::dex::error::{DexError, DexErrorKind};
use crate::dex::file::{DexString, TableOfContents, TocSection};
use crate::dex::items::{
    Annotation, AnnotationDirectory, FieldId, IntArray, MethodId, ProtoId, TypeList,
};
use crate::dex::read_u4;
use crate::merge::{DexMerger, Input};

pub(crate) trait IdMerger {
    type Item: Ord;

    fn section(toc: &TableOfContents) -> &TocSection;
    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection;

    /// Absolute position the next item will be written at.
    fn out_pos(m: &DexMerger) -> u32;

    /// Reads one item at the cursor, remapping embedded references through
    /// the input's index map.
    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<Self::Item, DexError>;

    /// Records old→new for the item about to be written.
    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError>;

    fn write(m: &mut DexMerger, value: &Self::Item, new_index: u32) -> Result<(), DexError>;
}

/// Lock-step merge of two pre-sorted sections, reading only two values into
/// memory at a time.
pub(crate) fn merge_sorted<M: IdMerger>(m: &mut DexMerger) -> Result<(), DexError> {
    let a_section = *M::section(m.dex_a.toc());
    let b_section = *M::section(m.dex_b.toc());
    let out_pos = M::out_pos(m);
    M::section_mut(&mut m.contents_out).off = out_pos;

    let mut a_ix = a_section.off as usize;
    let mut b_ix = b_section.off as usize;
    let mut a_index = 0u32;
    let mut b_index = 0u32;
    let mut a_offset = 0u32;
    let mut b_offset = 0u32;
    let mut a: Option<M::Item> = None;
    let mut b: Option<M::Item> = None;
    let mut out_count = 0u32;

    loop {
        if a.is_none() && a_index < a_section.size {
            a_offset = a_ix as u32;
            a = Some(M::read(m, Input::A, &mut a_ix)?);
        }
        if b.is_none() && b_index < b_section.size {
            b_offset = b_ix as u32;
            b = Some(M::read(m, Input::B, &mut b_ix)?);
        }

        // Write the smaller of a and b; equal values are written only once.
        let (advance_a, advance_b) = match (&a, &b) {
            (Some(x), Some(y)) => match x.cmp(y) {
                Ordering::Less => (true, false),
                Ordering::Equal => (true, true),
                Ordering::Greater => (false, true),
            },
            (Some(_), None) => (true, false),
            (None, Some(_)) => (false, true),
            (None, None) => break,
        };

        let mut to_write: Option<M::Item> = None;
        if advance_a {
            M::update_index(m, Input::A, a_offset, a_index, out_count)?;
            a_index += 1;
            to_write = a.take();
        }
        if advance_b {
            M::update_index(m, Input::B, b_offset, b_index, out_count)?;
            b_index += 1;
            let from_b = b.take();
            if to_write.is_none() {
                to_write = from_b;
            }
        }

        let Some(value) = to_write else {
            break;
        };
        M::write(m, &value, out_count)?;
        out_count += 1;
    }

    M::section_mut(&mut m.contents_out).size = out_count;
    Ok(())
}

struct UnsortedValue<T> {
    which: Input,
    value: T,
    index: u32,
    offset: u32,
}

/// Merge for sections referenced by offset rather than sorted position:
/// buffer everything, sort, emit each distinct value once.
pub(crate) fn merge_unsorted<M: IdMerger>(m: &mut DexMerger) -> Result<(), DexError> {
    let out_pos = M::out_pos(m);
    M::section_mut(&mut m.contents_out).off = out_pos;

    let mut all: Vec<UnsortedValue<M::Item>> = Vec::new();
    read_unsorted_values::<M>(m, Input::A, &mut all)?;
    read_unsorted_values::<M>(m, Input::B, &mut all)?;
    all.sort_by(|x, y| x.value.cmp(&y.value));

    let mut out_count = 0u32;
    let mut i = 0;
    while i < all.len() {
        let run_start = i;
        while i < all.len() && all[i].value == all[run_start].value {
            let member = &all[i];
            let (which, offset, index) = (member.which, member.offset, member.index);
            M::update_index(m, which, offset, index, out_count)?;
            i += 1;
        }
        M::write(m, &all[run_start].value, out_count)?;
        out_count += 1;
    }

    M::section_mut(&mut m.contents_out).size = out_count;
    Ok(())
}

fn read_unsorted_values<M: IdMerger>(
    m: &DexMerger,
    which: Input,
    all: &mut Vec<UnsortedValue<M::Item>>,
) -> Result<(), DexError> {
    let section = *M::section(m.input(which).toc());
    if !section.exists() {
        return Ok(());
    }
    let mut ix = section.off as usize;
    for index in 0..section.size {
        let offset = ix as u32;
        let value = M::read(m, which, &mut ix)?;
        all.push(UnsortedValue { which, value, index, offset });
    }
    Ok(())
}

fn check_u16(new_index: u32, what: &str) -> Result<u16, DexError> {
    if new_index > 0xffff {
        return Err(DexError::with_kind(
            DexErrorKind::IndexOverflow,
            &format!("{} not in [0, 0xffff]: {}", what, new_index),
        ));
    }
    Ok(new_index as u16)
}

pub(crate) struct StringIdMerger;

impl IdMerger for StringIdMerger {
    type Item = DexString;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.string_ids
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.string_ids
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.ids_defs_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<DexString, DexError> {
        let bytes = m.input(which).bytes();
        let mut data_ix = read_u4(bytes, ix)? as usize;
        DexString::read(bytes, &mut data_ix)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        _offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError> {
        m.index_map_mut(which).string_ids[old_index as usize] = new_index;
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &DexString, new_index: u32) -> Result<(), DexError> {
        m.removal.capture_string(value, new_index);
        m.contents_out.string_datas.size += 1;
        let data_pos = m.string_data_out.pos();
        m.ids_defs_out.write_u4(data_pos);
        value.write(m.string_data_out.buf());
        Ok(())
    }
}

pub(crate) struct TypeIdMerger;

impl IdMerger for TypeIdMerger {
    /// The remapped string index; also the sort key.
    type Item = u32;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.type_ids
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.type_ids
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.ids_defs_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<u32, DexError> {
        let string_index = read_u4(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_string(string_index)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        _offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError> {
        let new_index = check_u16(new_index, "type ID")?;
        m.index_map_mut(which).type_ids[old_index as usize] = new_index;
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &u32, new_index: u32) -> Result<(), DexError> {
        m.removal.capture_type(*value, new_index);
        m.ids_defs_out.write_u4(*value);
        Ok(())
    }
}

pub(crate) struct TypeListMerger;

impl IdMerger for TypeListMerger {
    type Item = TypeList;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.type_lists
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.type_lists
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.type_list_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<TypeList, DexError> {
        let list = TypeList::read(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_type_list(list)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.type_list_out.pos();
        m.index_map_mut(which).put_type_list_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &TypeList, _new_index: u32) -> Result<(), DexError> {
        value.write(m.type_list_out.buf());
        // Entries are 16-bit; pad so the next list starts 4-byte aligned.
        m.type_list_out.align4();
        Ok(())
    }
}

pub(crate) struct ProtoIdMerger;

impl IdMerger for ProtoIdMerger {
    type Item = ProtoId;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.proto_ids
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.proto_ids
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.ids_defs_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<ProtoId, DexError> {
        let proto = ProtoId::read(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_proto_id(proto)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        _offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError> {
        let new_index = check_u16(new_index, "proto ID")?;
        m.index_map_mut(which).proto_ids[old_index as usize] = new_index;
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &ProtoId, _new_index: u32) -> Result<(), DexError> {
        value.write(m.ids_defs_out.buf());
        Ok(())
    }
}

pub(crate) struct FieldIdMerger;

impl IdMerger for FieldIdMerger {
    type Item = FieldId;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.field_ids
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.field_ids
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.ids_defs_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<FieldId, DexError> {
        let field = FieldId::read(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_field_id(field)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        _offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError> {
        let new_index = check_u16(new_index, "field ID")?;
        m.index_map_mut(which).field_ids[old_index as usize] = new_index;
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &FieldId, _new_index: u32) -> Result<(), DexError> {
        value.write(m.ids_defs_out.buf());
        Ok(())
    }
}

pub(crate) struct MethodIdMerger;

impl IdMerger for MethodIdMerger {
    type Item = MethodId;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.method_ids
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.method_ids
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.ids_defs_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<MethodId, DexError> {
        let method = MethodId::read(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_method_id(method)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        _offset: u32,
        old_index: u32,
        new_index: u32,
    ) -> Result<(), DexError> {
        let new_index = check_u16(new_index, "method ID")?;
        m.index_map_mut(which).method_ids[old_index as usize] = new_index;
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &MethodId, _new_index: u32) -> Result<(), DexError> {
        value.write(m.ids_defs_out.buf());
        Ok(())
    }
}

pub(crate) struct AnnotationMerger;

impl IdMerger for AnnotationMerger {
    type Item = Annotation;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.annotations
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.annotations
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.annotation_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<Annotation, DexError> {
        let annotation = Annotation::read(m.input(which).bytes(), ix)?;
        m.index_map(which).adjust_annotation(annotation)
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.annotation_out.pos();
        m.index_map_mut(which).put_annotation_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &Annotation, _new_index: u32) -> Result<(), DexError> {
        value.write(m.annotation_out.buf());
        Ok(())
    }
}

pub(crate) struct AnnotationSetMerger;

impl IdMerger for AnnotationSetMerger {
    /// Remapped annotation offsets.
    type Item = IntArray;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.annotation_sets
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.annotation_sets
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.annotation_set_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<IntArray, DexError> {
        let bytes = m.input(which).bytes();
        let size = read_u4(bytes, ix)?;
        let mut entries = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let off = read_u4(bytes, ix)?;
            entries.push(m.index_map(which).adjust_annotation_offset(off)?);
        }
        Ok(IntArray(entries))
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.annotation_set_out.pos();
        m.index_map_mut(which).put_annotation_set_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &IntArray, _new_index: u32) -> Result<(), DexError> {
        m.annotation_set_out.assert_four_byte_aligned()?;
        m.annotation_set_out.write_u4(value.0.len() as u32);
        for entry in &value.0 {
            m.annotation_set_out.write_u4(*entry);
        }
        Ok(())
    }
}

pub(crate) struct AnnotationSetRefMerger;

impl IdMerger for AnnotationSetRefMerger {
    /// Remapped annotation-set offsets.
    type Item = IntArray;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.annotation_set_ref_lists
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.annotation_set_ref_lists
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.annotation_set_ref_list_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<IntArray, DexError> {
        let bytes = m.input(which).bytes();
        let size = read_u4(bytes, ix)?;
        let mut entries = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let off = read_u4(bytes, ix)?;
            entries.push(m.index_map(which).adjust_annotation_set_offset(off)?);
        }
        Ok(IntArray(entries))
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.annotation_set_ref_list_out.pos();
        m.index_map_mut(which).put_annotation_set_ref_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &IntArray, _new_index: u32) -> Result<(), DexError> {
        m.annotation_set_ref_list_out.assert_four_byte_aligned()?;
        m.annotation_set_ref_list_out.write_u4(value.0.len() as u32);
        for entry in &value.0 {
            m.annotation_set_ref_list_out.write_u4(*entry);
        }
        Ok(())
    }
}

pub(crate) struct AnnotationDirectoryMerger;

impl IdMerger for AnnotationDirectoryMerger {
    type Item = AnnotationDirectory;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.annotations_directories
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.annotations_directories
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.annotations_directory_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<AnnotationDirectory, DexError> {
        let bytes = m.input(which).bytes();
        let map = m.index_map(which);

        let class_annotations_off = map.adjust_annotation_set_offset(read_u4(bytes, ix)?)?;
        let fields_size = read_u4(bytes, ix)?;
        let methods_size = read_u4(bytes, ix)?;
        let parameters_size = read_u4(bytes, ix)?;

        let mut fields = Vec::with_capacity(fields_size as usize);
        for _ in 0..fields_size {
            fields.push([
                map.adjust_field(read_u4(bytes, ix)?)?,
                map.adjust_annotation_set_offset(read_u4(bytes, ix)?)?,
            ]);
        }
        let mut methods = Vec::with_capacity(methods_size as usize);
        for _ in 0..methods_size {
            methods.push([
                map.adjust_method(read_u4(bytes, ix)?)?,
                map.adjust_annotation_set_offset(read_u4(bytes, ix)?)?,
            ]);
        }
        let mut parameters = Vec::with_capacity(parameters_size as usize);
        for _ in 0..parameters_size {
            parameters.push([
                map.adjust_method(read_u4(bytes, ix)?)?,
                map.adjust_annotation_set_ref_offset(read_u4(bytes, ix)?)?,
            ]);
        }

        Ok(AnnotationDirectory { class_annotations_off, fields, methods, parameters })
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.annotations_directory_out.pos();
        m.index_map_mut(which).put_annotation_directory_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &AnnotationDirectory, _new_index: u32) -> Result<(), DexError> {
        m.annotations_directory_out.assert_four_byte_aligned()?;
        value.write(m.annotations_directory_out.buf());
        Ok(())
    }
}

/// Static-value arrays, ordered with length as the primary key like the
/// other set-shaped sections.
pub(crate) struct EncodedArrayItem(Vec<EncodedValue>);

impl Ord for EncodedArrayItem {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_value_slices(&self.0, &other.0)
    }
}

impl PartialOrd for EncodedArrayItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EncodedArrayItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EncodedArrayItem {}

pub(crate) struct StaticValuesMerger;

impl IdMerger for StaticValuesMerger {
    type Item = EncodedArrayItem;

    fn section(toc: &TableOfContents) -> &TocSection {
        &toc.encoded_arrays
    }

    fn section_mut(toc: &mut TableOfContents) -> &mut TocSection {
        &mut toc.encoded_arrays
    }

    fn out_pos(m: &DexMerger) -> u32 {
        m.encoded_array_out.pos()
    }

    fn read(m: &DexMerger, which: Input, ix: &mut usize) -> Result<EncodedArrayItem, DexError> {
        let values = read_encoded_array(m.input(which).bytes(), ix)?;
        Ok(EncodedArrayItem(m.index_map(which).adjust_encoded_array(values)?))
    }

    fn update_index(
        m: &mut DexMerger,
        which: Input,
        offset: u32,
        _old_index: u32,
        _new_index: u32,
    ) -> Result<(), DexError> {
        let pos = m.encoded_array_out.pos();
        m.index_map_mut(which).put_static_values_offset(offset, pos);
        Ok(())
    }

    fn write(m: &mut DexMerger, value: &EncodedArrayItem, _new_index: u32) -> Result<(), DexError> {
        write_encoded_array(&value.0, m.encoded_array_out.buf());
        Ok(())
    }
}
