//! Byte budgets for the output sections. First-pass budgets are
//! pessimistic: duplication between the inputs and post-remap ULEB growth
//! are unknowable up front, so LEB-heavy sections get a multiplier. The
//! second pass measures a finished merge exactly, and the difference is
//! what compaction reclaims.

use crate::dex::file::TableOfContents;
use crate::dex::{
    align4, HEADER_SIZE, SECTION_KIND_COUNT, SIZE_CLASS_DEF_ITEM, SIZE_MAP_ITEM,
    SIZE_MEMBER_ID_ITEM, SIZE_PROTO_ID_ITEM, SIZE_STRING_ID_ITEM, SIZE_TYPE_ID_ITEM, SIZE_UINT,
};

#[derive(Debug, Clone, Copy)]
pub struct WriterSizes {
    pub header: u32,
    pub ids_defs: u32,
    pub map_list: u32,
    pub type_list: u32,
    pub class_data: u32,
    pub code: u32,
    pub string_data: u32,
    pub debug_info: u32,
    pub encoded_array: u32,
    pub annotations_directory: u32,
    pub annotation_set: u32,
    pub annotation_set_ref_list: u32,
    pub annotation: u32,
}

impl WriterSizes {
    /// Budgets large enough for any merge of `a` and `b`.
    pub fn pessimistic(a: &TableOfContents, b: &TableOfContents) -> WriterSizes {
        let mut sizes = WriterSizes::empty();
        sizes.plus(a, false);
        sizes.plus(b, false);
        sizes
    }

    fn empty() -> WriterSizes {
        WriterSizes {
            header: HEADER_SIZE,
            ids_defs: 0,
            map_list: 0,
            type_list: 0,
            class_data: 0,
            code: 0,
            string_data: 0,
            debug_info: 0,
            encoded_array: 0,
            annotations_directory: 0,
            annotation_set: 0,
            annotation_set_ref_list: 0,
            annotation: 0,
        }
    }

    fn plus(&mut self, contents: &TableOfContents, exact: bool) {
        self.ids_defs += contents.string_ids.size * SIZE_STRING_ID_ITEM
            + contents.type_ids.size * SIZE_TYPE_ID_ITEM
            + contents.proto_ids.size * SIZE_PROTO_ID_ITEM
            + contents.field_ids.size * SIZE_MEMBER_ID_ITEM
            + contents.method_ids.size * SIZE_MEMBER_ID_ITEM
            + contents.class_defs.size * SIZE_CLASS_DEF_ITEM;
        self.map_list = SIZE_UINT + SECTION_KIND_COUNT * SIZE_MAP_ITEM;
        self.type_list += contents.type_lists.byte_count;
        self.string_data += contents.string_datas.byte_count;
        self.annotations_directory += contents.annotations_directories.byte_count;
        self.annotation_set += contents.annotation_sets.byte_count;
        self.annotation_set_ref_list += contents.annotation_set_ref_lists.byte_count;

        if exact {
            self.code += contents.codes.byte_count;
            self.class_data += contents.class_datas.byte_count;
            self.encoded_array += contents.encoded_arrays.byte_count;
            self.annotation += contents.annotations.byte_count;
            self.debug_info += contents.debug_infos.byte_count;
        } else {
            // at most 1/4 of the bytes in a code section are uleb/sleb
            self.code += ceil_mul(contents.codes.byte_count, 125);
            // at most 1/3 of the bytes in a class data section are uleb/sleb
            self.class_data += ceil_mul(contents.class_datas.byte_count, 134);
            // all of the bytes in an encoded array section may be uleb/sleb
            self.encoded_array += contents.encoded_arrays.byte_count * 2;
            // all of the bytes in an annotations section may be uleb/sleb
            self.annotation += contents.annotations.byte_count * 2;
            // all of the bytes in a debug info section may be uleb/sleb
            self.debug_info += contents.debug_infos.byte_count * 2;
        }

        self.type_list = align4(self.type_list);
        self.code = align4(self.code);
    }

    pub fn total(&self) -> u32 {
        self.header
            + self.ids_defs
            + self.map_list
            + self.type_list
            + self.class_data
            + self.code
            + self.string_data
            + self.debug_info
            + self.encoded_array
            + self.annotations_directory
            + self.annotation_set
            + self.annotation_set_ref_list
            + self.annotation
    }
}

/// `ceil(count * percent / 100)` without leaving integer arithmetic.
fn ceil_mul(count: u32, percent: u64) -> u32 {
    ((count as u64 * percent + 99) / 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_still_budget_header_and_map() {
        let a = TableOfContents::default();
        let b = TableOfContents::default();
        let sizes = WriterSizes::pessimistic(&a, &b);
        assert_eq!(sizes.header, HEADER_SIZE);
        assert_eq!(sizes.map_list, SIZE_UINT + SECTION_KIND_COUNT * SIZE_MAP_ITEM);
        assert_eq!(sizes.total(), sizes.header + sizes.map_list);
    }

    #[test]
    fn leb_heavy_sections_get_multipliers() {
        let mut a = TableOfContents::default();
        a.codes.byte_count = 100;
        a.class_datas.byte_count = 100;
        a.encoded_arrays.byte_count = 10;
        let b = TableOfContents::default();

        let sizes = WriterSizes::pessimistic(&a, &b);
        assert_eq!(sizes.code, align4(125));
        assert_eq!(sizes.class_data, 134);
        assert_eq!(sizes.encoded_array, 20);
    }

    #[test]
    fn ids_budget_sums_both_inputs() {
        let mut a = TableOfContents::default();
        a.string_ids.size = 2;
        a.class_defs.size = 1;
        let mut b = TableOfContents::default();
        b.string_ids.size = 3;

        let sizes = WriterSizes::pessimistic(&a, &b);
        assert_eq!(sizes.ids_defs, 5 * SIZE_STRING_ID_ITEM + SIZE_CLASS_DEF_ITEM);
    }

    #[test]
    fn ceil_mul_rounds_up() {
        assert_eq!(ceil_mul(1, 125), 2);
        assert_eq!(ceil_mul(4, 125), 5);
        assert_eq!(ceil_mul(3, 134), 5);
    }
}
