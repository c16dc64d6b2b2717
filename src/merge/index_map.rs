//! Per-input translation tables from old indices and offsets to their
//! positions in the merged output.

use std::collections::HashMap;

use crate::dex::encoded_values::{AnnotationElement, EncodedAnnotation, EncodedValue};
use crate::dex::error::DexError;
use crate::dex::file::TableOfContents;
use crate::dex::items::{Annotation, FieldId, MethodId, ProtoId, TypeList};
use crate::dex::NO_INDEX;

/// Maps every index and offset of one input file into the output. The ID
/// tables are written exactly once each while that section merges, then
/// read-only for the rewrite phase; each old offset likewise maps to the
/// single deduplicated copy in the output.
#[derive(Debug)]
pub struct IndexMap {
    pub string_ids: Vec<u32>,
    pub type_ids: Vec<u16>,
    pub proto_ids: Vec<u16>,
    pub field_ids: Vec<u16>,
    pub method_ids: Vec<u16>,
    type_list_offsets: HashMap<u32, u32>,
    annotation_offsets: HashMap<u32, u32>,
    annotation_set_offsets: HashMap<u32, u32>,
    annotation_set_ref_offsets: HashMap<u32, u32>,
    annotation_directory_offsets: HashMap<u32, u32>,
    static_values_offsets: HashMap<u32, u32>,
}

impl IndexMap {
    pub fn new(toc: &TableOfContents) -> Self {
        IndexMap {
            string_ids: vec![0; toc.string_ids.size as usize],
            type_ids: vec![0; toc.type_ids.size as usize],
            proto_ids: vec![0; toc.proto_ids.size as usize],
            field_ids: vec![0; toc.field_ids.size as usize],
            method_ids: vec![0; toc.method_ids.size as usize],
            type_list_offsets: HashMap::new(),
            annotation_offsets: HashMap::new(),
            annotation_set_offsets: HashMap::new(),
            annotation_set_ref_offsets: HashMap::new(),
            annotation_directory_offsets: HashMap::new(),
            static_values_offsets: HashMap::new(),
        }
    }

    pub fn adjust_string(&self, index: u32) -> Result<u32, DexError> {
        if index == NO_INDEX {
            return Ok(NO_INDEX);
        }
        match self.string_ids.get(index as usize) {
            Some(new) => Ok(*new),
            None => Err(DexError::new(&format!("string index {} out of range", index))),
        }
    }

    pub fn adjust_type(&self, index: u32) -> Result<u32, DexError> {
        if index == NO_INDEX {
            return Ok(NO_INDEX);
        }
        match self.type_ids.get(index as usize) {
            Some(new) => Ok(*new as u32),
            None => Err(DexError::new(&format!("type index {} out of range", index))),
        }
    }

    pub fn adjust_proto(&self, index: u32) -> Result<u32, DexError> {
        match self.proto_ids.get(index as usize) {
            Some(new) => Ok(*new as u32),
            None => Err(DexError::new(&format!("proto index {} out of range", index))),
        }
    }

    pub fn adjust_field(&self, index: u32) -> Result<u32, DexError> {
        match self.field_ids.get(index as usize) {
            Some(new) => Ok(*new as u32),
            None => Err(DexError::new(&format!("field index {} out of range", index))),
        }
    }

    pub fn adjust_method(&self, index: u32) -> Result<u32, DexError> {
        match self.method_ids.get(index as usize) {
            Some(new) => Ok(*new as u32),
            None => Err(DexError::new(&format!("method index {} out of range", index))),
        }
    }

    pub fn put_type_list_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.type_list_offsets, old, new);
    }

    pub fn put_annotation_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.annotation_offsets, old, new);
    }

    pub fn put_annotation_set_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.annotation_set_offsets, old, new);
    }

    pub fn put_annotation_set_ref_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.annotation_set_ref_offsets, old, new);
    }

    pub fn put_annotation_directory_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.annotation_directory_offsets, old, new);
    }

    pub fn put_static_values_offset(&mut self, old: u32, new: u32) {
        put_once(&mut self.static_values_offsets, old, new);
    }

    pub fn adjust_type_list_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.type_list_offsets, off, "type list")
    }

    pub fn adjust_annotation_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.annotation_offsets, off, "annotation")
    }

    pub fn adjust_annotation_set_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.annotation_set_offsets, off, "annotation set")
    }

    pub fn adjust_annotation_set_ref_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.annotation_set_ref_offsets, off, "annotation set ref list")
    }

    pub fn adjust_annotation_directory_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.annotation_directory_offsets, off, "annotations directory")
    }

    pub fn adjust_static_values_offset(&self, off: u32) -> Result<u32, DexError> {
        adjust_offset(&self.static_values_offsets, off, "static values")
    }

    /// Remaps every embedded type index of a type list.
    pub fn adjust_type_list(&self, list: TypeList) -> Result<TypeList, DexError> {
        let mut adjusted = Vec::with_capacity(list.0.len());
        for type_idx in list.0 {
            adjusted.push(self.adjust_type(type_idx as u32)? as u16);
        }
        Ok(TypeList(adjusted))
    }

    pub fn adjust_proto_id(&self, proto: ProtoId) -> Result<ProtoId, DexError> {
        Ok(ProtoId {
            shorty_idx: self.adjust_string(proto.shorty_idx)?,
            return_type_idx: self.adjust_type(proto.return_type_idx)?,
            parameters_off: self.adjust_type_list_offset(proto.parameters_off)?,
        })
    }

    pub fn adjust_field_id(&self, field: FieldId) -> Result<FieldId, DexError> {
        Ok(FieldId {
            class_idx: self.adjust_type(field.class_idx as u32)? as u16,
            type_idx: self.adjust_type(field.type_idx as u32)? as u16,
            name_idx: self.adjust_string(field.name_idx)?,
        })
    }

    pub fn adjust_method_id(&self, method: MethodId) -> Result<MethodId, DexError> {
        Ok(MethodId {
            class_idx: self.adjust_type(method.class_idx as u32)? as u16,
            proto_idx: self.adjust_proto(method.proto_idx as u32)? as u16,
            name_idx: self.adjust_string(method.name_idx)?,
        })
    }

    pub fn adjust_annotation(&self, annotation: Annotation) -> Result<Annotation, DexError> {
        Ok(Annotation {
            visibility: annotation.visibility,
            annotation: self.adjust_encoded_annotation(annotation.annotation)?,
        })
    }

    pub fn adjust_encoded_annotation(
        &self,
        annotation: EncodedAnnotation,
    ) -> Result<EncodedAnnotation, DexError> {
        let mut elements = Vec::with_capacity(annotation.elements.len());
        for element in annotation.elements {
            elements.push(AnnotationElement {
                name_idx: self.adjust_string(element.name_idx)?,
                value: self.adjust_encoded_value(element.value)?,
            });
        }
        Ok(EncodedAnnotation { type_idx: self.adjust_type(annotation.type_idx)?, elements })
    }

    pub fn adjust_encoded_array(
        &self,
        values: Vec<EncodedValue>,
    ) -> Result<Vec<EncodedValue>, DexError> {
        values.into_iter().map(|v| self.adjust_encoded_value(v)).collect()
    }

    pub fn adjust_encoded_value(&self, value: EncodedValue) -> Result<EncodedValue, DexError> {
        Ok(match value {
            EncodedValue::String(i) => EncodedValue::String(self.adjust_string(i)?),
            EncodedValue::Type(i) => EncodedValue::Type(self.adjust_type(i)?),
            EncodedValue::Field(i) => EncodedValue::Field(self.adjust_field(i)?),
            EncodedValue::Enum(i) => EncodedValue::Enum(self.adjust_field(i)?),
            EncodedValue::Method(i) => EncodedValue::Method(self.adjust_method(i)?),
            EncodedValue::MethodType(i) => EncodedValue::MethodType(self.adjust_proto(i)?),
            EncodedValue::MethodHandle(_) => {
                fail!("method handle constants are not supported in v035/v037 inputs")
            }
            EncodedValue::Array(values) => EncodedValue::Array(self.adjust_encoded_array(values)?),
            EncodedValue::Annotation(a) => {
                EncodedValue::Annotation(self.adjust_encoded_annotation(a)?)
            }
            other => other,
        })
    }
}

fn put_once(map: &mut HashMap<u32, u32>, old: u32, new: u32) {
    let previous = map.insert(old, new);
    debug_assert!(
        previous.is_none() || previous == Some(new),
        "offset {:#x} remapped twice: {:?} then {:#x}",
        old,
        previous,
        new
    );
}

fn adjust_offset(map: &HashMap<u32, u32>, off: u32, what: &str) -> Result<u32, DexError> {
    if off == 0 {
        return Ok(0);
    }
    match map.get(&off) {
        Some(new) => Ok(*new),
        None => Err(DexError::new(&format!("no merged {} at old offset {:#x}", what, off))),
    }
}
