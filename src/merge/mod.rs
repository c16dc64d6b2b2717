//! Combines two DEX files into one. The output is planned up front from
//! pessimistic section budgets, the ID and data sections are merged in
//! dependency order while the per-input index maps fill in, and finally
//! every class definition is rewritten through those maps. If the
//! pessimistic plan wasted enough space, the result is merged once more
//! against an empty file at exact sizes to compact it.

pub mod id_merger;
pub mod index_map;
pub mod instruction_transformer;
pub mod output;
pub mod sortable_type;
pub mod writer_sizes;

use std::collections::HashSet;

use log::{debug, info};

use crate::dex::error::{DexError, DexErrorKind};
use crate::dex::file::{write_hashes, DexBuffer, DexString, TableOfContents};
use crate::dex::items::{ClassData, Code, EncodedFieldEntry, EncodedMethodEntry, Try};
use crate::dex::{
    align4, read_u1, read_sleb128, read_uleb128, read_uleb128p1, write_u2, write_u4, SIZE_TRY_ITEM,
};
use crate::merge::id_merger::{
    merge_sorted, merge_unsorted, AnnotationDirectoryMerger, AnnotationMerger,
    AnnotationSetMerger, AnnotationSetRefMerger, FieldIdMerger, MethodIdMerger, ProtoIdMerger,
    StaticValuesMerger, StringIdMerger, TypeIdMerger, TypeListMerger,
};
use crate::merge::index_map::IndexMap;
use crate::merge::output::OutSection;
use crate::merge::sortable_type::{assign_depths, into_emission_order, SortableType};
use crate::merge::writer_sizes::WriterSizes;

const DBG_END_SEQUENCE: u8 = 0x00;
const DBG_ADVANCE_PC: u8 = 0x01;
const DBG_ADVANCE_LINE: u8 = 0x02;
const DBG_START_LOCAL: u8 = 0x03;
const DBG_START_LOCAL_EXTENDED: u8 = 0x04;
const DBG_END_LOCAL: u8 = 0x05;
const DBG_RESTART_LOCAL: u8 = 0x06;
const DBG_SET_PROLOGUE_END: u8 = 0x07;
const DBG_SET_EPILOGUE_BEGIN: u8 = 0x08;
const DBG_SET_FILE: u8 = 0x09;

/// Which input a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    A,
    B,
}

/// What to do when both inputs define the same class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep A's definition and silently drop B's.
    KeepFirst,
    /// Abort, naming the duplicated type.
    Fail,
}

/// Tracks classes configured for removal across the merge phases: the
/// descriptor set is fixed up front, the matching new string indices are
/// captured while string IDs merge, the type indices referring to those
/// strings while type IDs merge, and class defs are finally filtered by
/// their new type index.
#[derive(Debug, Default)]
pub struct RemovalContext {
    descriptors: HashSet<String>,
    string_ids: HashSet<u32>,
    type_ids: HashSet<u32>,
}

impl RemovalContext {
    fn add(&mut self, descriptor: &str) {
        self.descriptors.insert(descriptor.to_string());
    }

    pub(crate) fn capture_string(&mut self, value: &DexString, new_index: u32) {
        if self.descriptors.is_empty() {
            return;
        }
        if let Some(s) = value.as_str() {
            if self.descriptors.contains(s) {
                self.string_ids.insert(new_index);
            }
        }
    }

    pub(crate) fn capture_type(&mut self, new_string_index: u32, new_type_index: u32) {
        if self.string_ids.contains(&new_string_index) {
            self.type_ids.insert(new_type_index);
        }
    }

    fn removes_type(&self, new_type_index: u32) -> bool {
        self.type_ids.contains(&new_type_index)
    }
}

pub struct DexMerger {
    pub(crate) dex_a: DexBuffer,
    pub(crate) dex_b: DexBuffer,
    collision_policy: CollisionPolicy,
    writer_sizes: WriterSizes,
    /// Minimum number of wasted bytes before compaction is worthwhile.
    compact_waste_threshold: u32,

    pub(crate) a_index_map: IndexMap,
    pub(crate) b_index_map: IndexMap,
    pub(crate) removal: RemovalContext,
    pub(crate) contents_out: TableOfContents,

    pub(crate) header_out: OutSection,
    /// All IDs and definitions sections.
    pub(crate) ids_defs_out: OutSection,
    pub(crate) map_list_out: OutSection,
    pub(crate) type_list_out: OutSection,
    /// Parameter annotation lists.
    pub(crate) annotation_set_ref_list_out: OutSection,
    /// Sets of annotations on a member, parameter or type.
    pub(crate) annotation_set_out: OutSection,
    pub(crate) class_data_out: OutSection,
    pub(crate) code_out: OutSection,
    pub(crate) string_data_out: OutSection,
    pub(crate) debug_info_out: OutSection,
    /// Individual annotations, each containing zero or more fields.
    pub(crate) annotation_out: OutSection,
    pub(crate) encoded_array_out: OutSection,
    /// Annotations directory on a type.
    pub(crate) annotations_directory_out: OutSection,
}

fn plan_section(pos: &mut u32, name: &'static str, size: u32) -> OutSection {
    let capacity = align4(size);
    let section = OutSection::new(name, *pos, capacity);
    *pos += capacity;
    section
}

impl DexMerger {
    pub fn new(dex_a: DexBuffer, dex_b: DexBuffer, collision_policy: CollisionPolicy) -> DexMerger {
        let sizes = WriterSizes::pessimistic(dex_a.toc(), dex_b.toc());
        DexMerger::with_sizes(dex_a, dex_b, collision_policy, sizes)
    }

    fn with_sizes(
        dex_a: DexBuffer,
        dex_b: DexBuffer,
        collision_policy: CollisionPolicy,
        sizes: WriterSizes,
    ) -> DexMerger {
        let a_index_map = IndexMap::new(dex_a.toc());
        let b_index_map = IndexMap::new(dex_b.toc());
        let mut contents_out = TableOfContents::default();

        let mut pos = 0u32;
        let header_out = plan_section(&mut pos, "header", sizes.header);
        let ids_defs_out = plan_section(&mut pos, "ids defs", sizes.ids_defs);

        contents_out.header.off = 0;
        contents_out.header.size = 1;
        contents_out.data_off = pos;

        contents_out.map_list.off = pos;
        contents_out.map_list.size = 1;
        let map_list_out = plan_section(&mut pos, "map list", sizes.map_list);

        contents_out.type_lists.off = pos;
        let type_list_out = plan_section(&mut pos, "type list", sizes.type_list);

        contents_out.annotation_set_ref_lists.off = pos;
        let annotation_set_ref_list_out =
            plan_section(&mut pos, "annotation set ref list", sizes.annotation_set_ref_list);

        contents_out.annotation_sets.off = pos;
        let annotation_set_out = plan_section(&mut pos, "annotation sets", sizes.annotation_set);

        contents_out.class_datas.off = pos;
        let class_data_out = plan_section(&mut pos, "class data", sizes.class_data);

        contents_out.codes.off = pos;
        let code_out = plan_section(&mut pos, "code", sizes.code);

        contents_out.string_datas.off = pos;
        let string_data_out = plan_section(&mut pos, "string data", sizes.string_data);

        contents_out.debug_infos.off = pos;
        let debug_info_out = plan_section(&mut pos, "debug info", sizes.debug_info);

        contents_out.annotations.off = pos;
        let annotation_out = plan_section(&mut pos, "annotation", sizes.annotation);

        contents_out.encoded_arrays.off = pos;
        let encoded_array_out = plan_section(&mut pos, "encoded array", sizes.encoded_array);

        contents_out.annotations_directories.off = pos;
        let annotations_directory_out =
            plan_section(&mut pos, "annotations directory", sizes.annotations_directory);

        contents_out.file_size = pos;
        contents_out.data_size = pos - contents_out.data_off;

        DexMerger {
            dex_a,
            dex_b,
            collision_policy,
            writer_sizes: sizes,
            compact_waste_threshold: 1024 * 1024,
            a_index_map,
            b_index_map,
            removal: RemovalContext::default(),
            contents_out,
            header_out,
            ids_defs_out,
            map_list_out,
            type_list_out,
            annotation_set_ref_list_out,
            annotation_set_out,
            class_data_out,
            code_out,
            string_data_out,
            debug_info_out,
            annotation_out,
            encoded_array_out,
            annotations_directory_out,
        }
    }

    /// How many bytes the pessimistic plan must waste before the result is
    /// re-merged at exact sizes. Defaults to 1 MiB.
    pub fn set_compact_waste_threshold(&mut self, bytes: u32) {
        self.compact_waste_threshold = bytes;
    }

    /// Excludes a class (by fully-qualified descriptor, e.g.
    /// `"Ltest/Type1;"`) from the merged output.
    pub fn remove_class(&mut self, descriptor: &str) {
        self.removal.add(descriptor);
    }

    pub(crate) fn input(&self, which: Input) -> &DexBuffer {
        match which {
            Input::A => &self.dex_a,
            Input::B => &self.dex_b,
        }
    }

    pub(crate) fn index_map(&self, which: Input) -> &IndexMap {
        match which {
            Input::A => &self.a_index_map,
            Input::B => &self.b_index_map,
        }
    }

    pub(crate) fn index_map_mut(&mut self, which: Input) -> &mut IndexMap {
        match which {
            Input::A => &mut self.a_index_map,
            Input::B => &mut self.b_index_map,
        }
    }

    /// Runs the merge, compacting the result when the pessimistic plan
    /// wasted at least the configured threshold.
    pub fn merge(mut self) -> Result<Vec<u8>, DexError> {
        let out = self.merge_buffers()?;

        let compacted_sizes = self.exact_sizes();
        let wasted = self.writer_sizes.total().saturating_sub(compacted_sizes.total());
        info!(
            "merged dex A ({} defs, {} bytes) with dex B ({} defs, {} bytes) into {} defs, {} bytes",
            self.dex_a.toc().class_defs.size,
            self.dex_a.len(),
            self.dex_b.toc().class_defs.size,
            self.dex_b.len(),
            self.contents_out.class_defs.size,
            out.len(),
        );

        if wasted >= self.compact_waste_threshold {
            let full_size = out.len();
            let result = DexBuffer::from_bytes(out)?;
            let mut compacter = DexMerger::with_sizes(
                result,
                DexBuffer::empty(),
                CollisionPolicy::Fail,
                compacted_sizes,
            );
            let compacted = compacter.merge_buffers()?;
            info!(
                "result compacted from {} bytes to {} bytes, saving {}",
                full_size,
                compacted.len(),
                full_size - compacted.len(),
            );
            return Ok(compacted);
        }

        debug!(
            "not compacting: {} bytes wasted, threshold is {}",
            wasted, self.compact_waste_threshold
        );
        Ok(out)
    }

    /// One pass: merge every section in dependency order, then write the
    /// header, map list and hashes.
    fn merge_buffers(&mut self) -> Result<Vec<u8>, DexError> {
        merge_sorted::<StringIdMerger>(self)?;
        merge_sorted::<TypeIdMerger>(self)?;
        merge_unsorted::<TypeListMerger>(self)?;
        merge_sorted::<ProtoIdMerger>(self)?;
        merge_sorted::<FieldIdMerger>(self)?;
        merge_sorted::<MethodIdMerger>(self)?;
        merge_unsorted::<AnnotationMerger>(self)?;
        merge_unsorted::<AnnotationSetMerger>(self)?;
        merge_unsorted::<AnnotationSetRefMerger>(self)?;
        merge_unsorted::<AnnotationDirectoryMerger>(self)?;
        merge_unsorted::<StaticValuesMerger>(self)?;
        self.merge_class_defs()?;

        let header_bytes = self.contents_out.header_bytes();
        self.header_out.write_bytes(&header_bytes);
        let map_bytes = self.contents_out.map_bytes();
        self.map_list_out.write_bytes(&map_bytes);

        let mut file = output::assemble(&[
            &self.header_out,
            &self.ids_defs_out,
            &self.map_list_out,
            &self.type_list_out,
            &self.annotation_set_ref_list_out,
            &self.annotation_set_out,
            &self.class_data_out,
            &self.code_out,
            &self.string_data_out,
            &self.debug_info_out,
            &self.annotation_out,
            &self.encoded_array_out,
            &self.annotations_directory_out,
        ])?;
        debug_assert_eq!(file.len() as u32, self.contents_out.file_size);
        write_hashes(&mut file)?;
        Ok(file)
    }

    fn merge_class_defs(&mut self) -> Result<(), DexError> {
        let types = self.sorted_types()?;
        self.contents_out.class_defs.off = self.ids_defs_out.pos();
        self.contents_out.class_defs.size = types.len() as u32;
        for sortable in &types {
            self.transform_class_def(sortable)?;
        }
        Ok(())
    }

    /// The union of classes from both inputs, ordered such that a class is
    /// always preceded by its supertype and implemented interfaces.
    fn sorted_types(&mut self) -> Result<Vec<SortableType>, DexError> {
        let slots = self.contents_out.type_ids.size as usize;
        let mut sortable: Vec<Option<SortableType>> = (0..slots).map(|_| None).collect();
        self.read_sortable_types(&mut sortable, Input::A)?;
        self.read_sortable_types(&mut sortable, Input::B)?;

        for slot in sortable.iter_mut() {
            let removed = matches!(slot, Some(t) if self.removal.removes_type(t.type_index()));
            if removed {
                *slot = None;
            }
        }

        assign_depths(&mut sortable)?;
        Ok(into_emission_order(sortable))
    }

    fn read_sortable_types(
        &self,
        sortable: &mut [Option<SortableType>],
        which: Input,
    ) -> Result<(), DexError> {
        let buffer = self.input(which);
        for class_def in buffer.class_defs()? {
            let old_type_index = class_def.class_idx;
            let sortable_type =
                SortableType::new(which, class_def, self.index_map(which), buffer.bytes())?;
            let slot = sortable_type.type_index() as usize;
            if slot >= sortable.len() {
                fail!("class def type index {} out of range", slot);
            }
            if sortable[slot].is_none() {
                sortable[slot] = Some(sortable_type);
            } else if self.collision_policy != CollisionPolicy::KeepFirst {
                let descriptor = buffer
                    .type_name(old_type_index)
                    .unwrap_or_else(|_| format!("type index {}", old_type_index));
                return Err(DexError::with_kind(
                    DexErrorKind::Collision,
                    &format!("multiple dex files define {}", descriptor),
                ));
            }
        }
        Ok(())
    }

    /// Writes one class_def_item plus its class data, code, debug info and
    /// static-value references, all remapped into the output.
    fn transform_class_def(&mut self, sortable: &SortableType) -> Result<(), DexError> {
        let which = sortable.input();
        let class_def = sortable.class_def().clone();

        self.ids_defs_out.assert_four_byte_aligned()?;
        self.ids_defs_out.write_u4(sortable.type_index());
        self.ids_defs_out.write_u4(class_def.access_flags);
        self.ids_defs_out.write_u4(sortable.supertype_index());

        let interfaces_off = self.index_map(which).adjust_type_list_offset(class_def.interfaces_off)?;
        self.ids_defs_out.write_u4(interfaces_off);

        let source_file = self.index_map(which).adjust_string(class_def.source_file_idx)?;
        self.ids_defs_out.write_u4(source_file);

        let annotations_off =
            self.index_map(which).adjust_annotation_directory_offset(class_def.annotations_off)?;
        self.ids_defs_out.write_u4(annotations_off);

        if class_def.class_data_off == 0 {
            self.ids_defs_out.write_u4(0);
        } else {
            let class_data_pos = self.class_data_out.pos();
            self.ids_defs_out.write_u4(class_data_pos);
            let mut ix = class_def.class_data_off as usize;
            let class_data = ClassData::read(self.input(which).bytes(), &mut ix)?;
            self.transform_class_data(which, &class_data)?;
        }

        let static_values_off =
            self.index_map(which).adjust_static_values_offset(class_def.static_values_off)?;
        self.ids_defs_out.write_u4(static_values_off);
        Ok(())
    }

    fn transform_class_data(&mut self, which: Input, class_data: &ClassData) -> Result<(), DexError> {
        self.contents_out.class_datas.size += 1;

        self.class_data_out.write_uleb128(class_data.static_fields.len() as u32);
        self.class_data_out.write_uleb128(class_data.instance_fields.len() as u32);
        self.class_data_out.write_uleb128(class_data.direct_methods.len() as u32);
        self.class_data_out.write_uleb128(class_data.virtual_methods.len() as u32);

        self.transform_fields(which, &class_data.static_fields)?;
        self.transform_fields(which, &class_data.instance_fields)?;
        self.transform_methods(which, &class_data.direct_methods)?;
        self.transform_methods(which, &class_data.virtual_methods)?;
        Ok(())
    }

    /// Member indices are delta-encoded; the deltas are recomputed in the
    /// new index space. Remapping preserves the relative order of members
    /// of one class, so the deltas stay non-negative on well-formed input.
    fn transform_fields(&mut self, which: Input, fields: &[EncodedFieldEntry]) -> Result<(), DexError> {
        let mut last_out_index = 0u32;
        for field in fields {
            let out_index = self.index_map(which).adjust_field(field.field_idx)?;
            let delta = out_index.checked_sub(last_out_index).ok_or_else(|| {
                DexError::new("field indices not ascending after remap")
            })?;
            self.class_data_out.write_uleb128(delta);
            last_out_index = out_index;
            self.class_data_out.write_uleb128(field.access_flags);
        }
        Ok(())
    }

    fn transform_methods(
        &mut self,
        which: Input,
        methods: &[EncodedMethodEntry],
    ) -> Result<(), DexError> {
        let mut last_out_index = 0u32;
        for method in methods {
            let out_index = self.index_map(which).adjust_method(method.method_idx)?;
            let delta = out_index.checked_sub(last_out_index).ok_or_else(|| {
                DexError::new("method indices not ascending after remap")
            })?;
            self.class_data_out.write_uleb128(delta);
            last_out_index = out_index;

            self.class_data_out.write_uleb128(method.access_flags);

            if method.code_off == 0 {
                self.class_data_out.write_uleb128(0);
            } else {
                self.code_out.align4();
                let code_pos = self.code_out.pos();
                self.class_data_out.write_uleb128(code_pos);
                let mut ix = method.code_off as usize;
                let code = Code::read(self.input(which).bytes(), &mut ix)?;
                self.transform_code(which, &code)?;
            }
        }
        Ok(())
    }

    fn transform_code(&mut self, which: Input, code: &Code) -> Result<(), DexError> {
        self.contents_out.codes.size += 1;
        self.code_out.assert_four_byte_aligned()?;

        self.code_out.write_u2(code.registers_size);
        self.code_out.write_u2(code.ins_size);
        self.code_out.write_u2(code.outs_size);
        self.code_out.write_u2(code.tries.len() as u16);

        if code.debug_info_off != 0 {
            let debug_info_pos = self.debug_info_out.pos();
            self.code_out.write_u4(debug_info_pos);
            self.transform_debug_info(which, code.debug_info_off)?;
        } else {
            self.code_out.write_u4(0);
        }

        let new_insns = instruction_transformer::transform(self.index_map(which), &code.insns)?;
        self.code_out.write_u4(new_insns.len() as u32);
        for unit in &new_insns {
            self.code_out.write_u2(*unit);
        }

        if !code.tries.is_empty() {
            if new_insns.len() % 2 == 1 {
                self.code_out.write_u2(0); // padding
            }

            // The handler list is encoded after the tries but its offsets
            // must be known to write them, so reserve the try items, emit
            // the handlers, then back-patch.
            let tries_at = self.code_out.reserve(code.tries.len() * SIZE_TRY_ITEM as usize);
            let handler_offsets = self.transform_catch_handlers(which, code)?;
            let try_bytes = Self::encode_tries(&code.tries, &handler_offsets)?;
            self.code_out.patch(tries_at, &try_bytes)?;
        }
        Ok(())
    }

    /// Writes the catch handler list and returns each handler's offset
    /// relative to the start of the list.
    fn transform_catch_handlers(&mut self, which: Input, code: &Code) -> Result<Vec<u32>, DexError> {
        let base = self.code_out.pos();
        self.code_out.write_uleb128(code.handlers.len() as u32);
        let mut offsets = Vec::with_capacity(code.handlers.len());
        for handler in &code.handlers {
            offsets.push(self.code_out.pos() - base);

            if handler.catch_all_addr.is_some() {
                self.code_out.write_sleb128(-(handler.pairs.len() as i32));
            } else {
                self.code_out.write_sleb128(handler.pairs.len() as i32);
            }
            for (type_idx, addr) in &handler.pairs {
                let new_type = self.index_map(which).adjust_type(*type_idx)?;
                self.code_out.write_uleb128(new_type);
                self.code_out.write_uleb128(*addr);
            }
            if let Some(addr) = handler.catch_all_addr {
                self.code_out.write_uleb128(addr);
            }
        }
        Ok(offsets)
    }

    fn encode_tries(tries: &[Try], handler_offsets: &[u32]) -> Result<Vec<u8>, DexError> {
        let mut bytes = Vec::with_capacity(tries.len() * SIZE_TRY_ITEM as usize);
        for try_item in tries {
            write_u4(&mut bytes, try_item.start_addr);
            write_u2(&mut bytes, try_item.insn_count);
            let offset = handler_offsets[try_item.handler_index];
            let offset = u16::try_from(offset)
                .map_err(|_| DexError::new("catch handler list exceeds 16-bit offsets"))?;
            write_u2(&mut bytes, offset);
        }
        Ok(bytes)
    }

    /// Re-emits a debug info item, remapping the string and type indices
    /// embedded in its opcode stream. uleb128p1 payloads keep the
    /// 0-encodes-minus-one convention, so the absent sentinel survives.
    fn transform_debug_info(&mut self, which: Input, off: u32) -> Result<(), DexError> {
        self.contents_out.debug_infos.size += 1;
        let (bytes, index_map) = match which {
            Input::A => (self.dex_a.bytes(), &self.a_index_map),
            Input::B => (self.dex_b.bytes(), &self.b_index_map),
        };
        let out = &mut self.debug_info_out;
        let mut ix = off as usize;

        let line_start = read_uleb128(bytes, &mut ix)?;
        out.write_uleb128(line_start);

        let parameters_size = read_uleb128(bytes, &mut ix)?;
        out.write_uleb128(parameters_size);
        for _ in 0..parameters_size {
            let parameter_name = read_uleb128p1(bytes, &mut ix)?;
            out.write_uleb128p1(adjust_string_p1(index_map, parameter_name)?);
        }

        loop {
            let opcode = read_u1(bytes, &mut ix)?;
            out.write_u1(opcode);

            match opcode {
                DBG_END_SEQUENCE => return Ok(()),

                DBG_ADVANCE_PC => {
                    let addr_diff = read_uleb128(bytes, &mut ix)?;
                    out.write_uleb128(addr_diff);
                }

                DBG_ADVANCE_LINE => {
                    let line_diff = read_sleb128(bytes, &mut ix)?;
                    out.write_sleb128(line_diff);
                }

                DBG_START_LOCAL | DBG_START_LOCAL_EXTENDED => {
                    let register = read_uleb128(bytes, &mut ix)?;
                    out.write_uleb128(register);
                    let name = read_uleb128p1(bytes, &mut ix)?;
                    out.write_uleb128p1(adjust_string_p1(index_map, name)?);
                    let local_type = read_uleb128p1(bytes, &mut ix)?;
                    out.write_uleb128p1(adjust_type_p1(index_map, local_type)?);
                    if opcode == DBG_START_LOCAL_EXTENDED {
                        let signature = read_uleb128p1(bytes, &mut ix)?;
                        out.write_uleb128p1(adjust_string_p1(index_map, signature)?);
                    }
                }

                DBG_END_LOCAL | DBG_RESTART_LOCAL => {
                    let register = read_uleb128(bytes, &mut ix)?;
                    out.write_uleb128(register);
                }

                DBG_SET_FILE => {
                    let name = read_uleb128p1(bytes, &mut ix)?;
                    out.write_uleb128p1(adjust_string_p1(index_map, name)?);
                }

                // Prologue/epilogue markers and the special line/address
                // opcodes carry no payload.
                DBG_SET_PROLOGUE_END | DBG_SET_EPILOGUE_BEGIN => {}
                _ => {}
            }
        }
    }

    /// Measured byte counts of a finished merge, used to size the
    /// compaction pass.
    fn exact_sizes(&self) -> WriterSizes {
        WriterSizes {
            header: self.header_out.used(),
            ids_defs: self.ids_defs_out.used(),
            map_list: self.map_list_out.used(),
            type_list: self.type_list_out.used(),
            class_data: self.class_data_out.used(),
            code: self.code_out.used(),
            string_data: self.string_data_out.used(),
            debug_info: self.debug_info_out.used(),
            encoded_array: self.encoded_array_out.used(),
            annotations_directory: self.annotations_directory_out.used(),
            annotation_set: self.annotation_set_out.used(),
            annotation_set_ref_list: self.annotation_set_ref_list_out.used(),
            annotation: self.annotation_out.used(),
        }
    }
}

fn adjust_string_p1(index_map: &IndexMap, value: i32) -> Result<i32, DexError> {
    if value == -1 {
        return Ok(-1);
    }
    Ok(index_map.adjust_string(value as u32)? as i32)
}

fn adjust_type_p1(index_map: &IndexMap, value: i32) -> Result<i32, DexError> {
    if value == -1 {
        return Ok(-1);
    }
    Ok(index_map.adjust_type(value as u32)? as i32)
}
