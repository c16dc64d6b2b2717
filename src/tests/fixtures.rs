//! Builds small but complete DEX images in memory for merge tests:
//! real header, sorted ID sections, type lists, class data, trivial code
//! items, string data, map list and hashes.

use std::collections::{BTreeMap, BTreeSet};

use crate::dex::file::{write_hashes, DexBuffer, DexString, Header, DEX_FILE_MAGIC};
use crate::dex::{
    write_sleb128, write_u2, write_u4, write_uleb128, ENDIAN_CONSTANT, HEADER_SIZE, NO_INDEX,
    SIZE_CLASS_DEF_ITEM, SIZE_MEMBER_ID_ITEM, SIZE_PROTO_ID_ITEM, SIZE_STRING_ID_ITEM,
    SIZE_TYPE_ID_ITEM, TYPE_CLASS_DATA_ITEM, TYPE_CLASS_DEF_ITEM, TYPE_CODE_ITEM,
    TYPE_DEBUG_INFO_ITEM, TYPE_HEADER_ITEM, TYPE_MAP_LIST, TYPE_METHOD_ID_ITEM,
    TYPE_PROTO_ID_ITEM, TYPE_STRING_DATA_ITEM, TYPE_STRING_ID_ITEM, TYPE_TYPE_ID_ITEM,
    TYPE_TYPE_LIST,
};

const ACC_PUBLIC: u32 = 0x1;

#[derive(Clone)]
pub struct ClassSpec {
    pub descriptor: &'static str,
    pub superclass: Option<&'static str>,
    pub interfaces: Vec<&'static str>,
    pub source_file: Option<&'static str>,
    pub methods: Vec<MethodSpec>,
}

#[derive(Clone)]
pub struct MethodSpec {
    pub name: &'static str,
    pub with_code: bool,
    /// Wrap the body in a try with one typed catch of `Ljava/lang/Object;`.
    pub with_try: bool,
    /// Attach a minimal debug_info_item.
    pub with_debug: bool,
}

impl ClassSpec {
    pub fn new(descriptor: &'static str) -> ClassSpec {
        ClassSpec {
            descriptor,
            superclass: None,
            interfaces: vec![],
            source_file: None,
            methods: vec![],
        }
    }

    pub fn extends(mut self, descriptor: &'static str) -> ClassSpec {
        self.superclass = Some(descriptor);
        self
    }

    pub fn implements(mut self, descriptor: &'static str) -> ClassSpec {
        self.interfaces.push(descriptor);
        self
    }

    pub fn source(mut self, file: &'static str) -> ClassSpec {
        self.source_file = Some(file);
        self
    }

    pub fn method(mut self, name: &'static str, with_code: bool) -> ClassSpec {
        self.methods.push(MethodSpec { name, with_code, with_try: false, with_debug: false });
        self
    }

    pub fn method_spec(mut self, spec: MethodSpec) -> ClassSpec {
        self.methods.push(spec);
        self
    }
}

pub fn build_dex(classes: &[ClassSpec]) -> Vec<u8> {
    let has_methods = classes.iter().any(|c| !c.methods.is_empty());

    // String pool: every descriptor and name the file mentions, sorted.
    let mut strings: BTreeSet<String> = BTreeSet::new();
    let mut type_names: BTreeSet<String> = BTreeSet::new();
    for class in classes {
        strings.insert(class.descriptor.to_string());
        type_names.insert(class.descriptor.to_string());
        if let Some(superclass) = class.superclass {
            strings.insert(superclass.to_string());
            type_names.insert(superclass.to_string());
        }
        for interface in &class.interfaces {
            strings.insert(interface.to_string());
            type_names.insert(interface.to_string());
        }
        if let Some(source) = class.source_file {
            strings.insert(source.to_string());
        }
        for method in &class.methods {
            strings.insert(method.name.to_string());
        }
    }
    if has_methods {
        strings.insert("V".to_string());
        type_names.insert("V".to_string());
    }
    let has_try = classes.iter().flat_map(|c| &c.methods).any(|m| m.with_try);
    if has_try {
        strings.insert("Ljava/lang/Object;".to_string());
        type_names.insert("Ljava/lang/Object;".to_string());
    }

    let strings: Vec<String> = strings.into_iter().collect();
    let string_index: BTreeMap<&str, u32> =
        strings.iter().enumerate().map(|(i, s)| (s.as_str(), i as u32)).collect();

    // Types sort by string index, which for a sorted pool is descriptor order.
    let types: Vec<String> = type_names.into_iter().collect();
    let type_index: BTreeMap<&str, u32> =
        types.iter().enumerate().map(|(i, s)| (s.as_str(), i as u32)).collect();

    let proto_count: u32 = if has_methods { 1 } else { 0 };

    // method_id_item order is (class, name, proto); one ()V proto shared.
    let mut method_ids: Vec<(u32, u32)> = Vec::new(); // (class type idx, name string idx)
    for class in classes {
        let class_idx = type_index[class.descriptor];
        for method in &class.methods {
            method_ids.push((class_idx, string_index[method.name]));
        }
    }
    method_ids.sort();
    method_ids.dedup();
    let method_index: BTreeMap<(u32, u32), u32> =
        method_ids.iter().enumerate().map(|(i, key)| (*key, i as u32)).collect();

    // Fixed-width ID sections define the data region's start.
    let string_ids_off = HEADER_SIZE;
    let type_ids_off = string_ids_off + strings.len() as u32 * SIZE_STRING_ID_ITEM;
    let proto_ids_off = type_ids_off + types.len() as u32 * SIZE_TYPE_ID_ITEM;
    let method_ids_off = proto_ids_off + proto_count * SIZE_PROTO_ID_ITEM;
    let class_defs_off = method_ids_off + method_ids.len() as u32 * SIZE_MEMBER_ID_ITEM;
    let data_off = class_defs_off + classes.len() as u32 * SIZE_CLASS_DEF_ITEM;

    let mut data: Vec<u8> = Vec::new();
    let abs = |data: &Vec<u8>| data_off + data.len() as u32;
    let align_data = |data: &mut Vec<u8>| {
        while data.len() % 4 != 0 {
            data.push(0);
        }
    };

    // Interface type lists.
    let mut interface_offs: BTreeMap<&str, u32> = BTreeMap::new();
    let mut type_list_count = 0u32;
    let mut first_type_list_off = 0u32;
    for class in classes {
        if class.interfaces.is_empty() {
            continue;
        }
        align_data(&mut data);
        let off = abs(&data);
        if type_list_count == 0 {
            first_type_list_off = off;
        }
        type_list_count += 1;
        interface_offs.insert(class.descriptor, off);
        write_u4(&mut data, class.interfaces.len() as u32);
        for interface in &class.interfaces {
            write_u2(&mut data, type_index[*interface] as u16);
        }
    }

    // Minimal debug info items: a line start and the end marker.
    let mut debug_offs: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    let mut debug_count = 0u32;
    let mut first_debug_off = 0u32;
    for class in classes {
        let class_idx = type_index[class.descriptor];
        for method in &class.methods {
            if !method.with_debug {
                continue;
            }
            let off = abs(&data);
            if debug_count == 0 {
                first_debug_off = off;
            }
            debug_count += 1;
            debug_offs.insert((class_idx, string_index[method.name]), off);
            write_uleb128(&mut data, 1); // line_start
            write_uleb128(&mut data, 0); // parameters_size
            data.push(0x00); // DBG_END_SEQUENCE
        }
    }

    // Trivial code items: one register, `return-void`.
    let mut code_offs: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    let mut code_count = 0u32;
    let mut first_code_off = 0u32;
    for class in classes {
        let class_idx = type_index[class.descriptor];
        for method in &class.methods {
            if !method.with_code {
                continue;
            }
            align_data(&mut data);
            let off = abs(&data);
            if code_count == 0 {
                first_code_off = off;
            }
            code_count += 1;
            code_offs.insert((class_idx, string_index[method.name]), off);
            write_u2(&mut data, 1); // registers_size
            write_u2(&mut data, 1); // ins_size
            write_u2(&mut data, 0); // outs_size
            write_u2(&mut data, if method.with_try { 1 } else { 0 });
            let debug_off =
                debug_offs.get(&(class_idx, string_index[method.name])).copied().unwrap_or(0);
            write_u4(&mut data, debug_off);
            write_u4(&mut data, 1); // insns_size
            write_u2(&mut data, 0x000e); // return-void
            if method.with_try {
                write_u2(&mut data, 0); // padding: odd number of code units
                write_u4(&mut data, 0); // try start_addr
                write_u2(&mut data, 1); // try insn_count
                write_u2(&mut data, 1); // handler_off, just past the list size
                write_uleb128(&mut data, 1); // one catch handler
                write_sleb128(&mut data, 1); // one typed catch, no catch-all
                write_uleb128(&mut data, type_index["Ljava/lang/Object;"]);
                write_uleb128(&mut data, 0); // handler address
            }
        }
    }

    // Class data, methods in ascending method-index order.
    let mut class_data_offs: BTreeMap<&str, u32> = BTreeMap::new();
    let mut class_data_count = 0u32;
    let mut first_class_data_off = 0u32;
    for class in classes {
        if class.methods.is_empty() {
            continue;
        }
        let class_idx = type_index[class.descriptor];
        let off = abs(&data);
        if class_data_count == 0 {
            first_class_data_off = off;
        }
        class_data_count += 1;
        class_data_offs.insert(class.descriptor, off);

        let mut indices: Vec<(u32, bool)> = class
            .methods
            .iter()
            .map(|m| (method_index[&(class_idx, string_index[m.name])], m.with_code))
            .collect();
        indices.sort();

        write_uleb128(&mut data, 0); // static fields
        write_uleb128(&mut data, 0); // instance fields
        write_uleb128(&mut data, indices.len() as u32); // direct methods
        write_uleb128(&mut data, 0); // virtual methods
        let mut last = 0u32;
        for (method_idx, with_code) in indices {
            write_uleb128(&mut data, method_idx - last);
            last = method_idx;
            write_uleb128(&mut data, ACC_PUBLIC);
            let code_off =
                if with_code { code_offs[&(class_idx, method_ids[method_idx as usize].1)] } else { 0 };
            write_uleb128(&mut data, code_off);
        }
    }

    // String data, in pool order.
    let mut string_data_offs: Vec<u32> = Vec::with_capacity(strings.len());
    let first_string_data_off = abs(&data);
    for s in &strings {
        string_data_offs.push(abs(&data));
        DexString::from_string(s).write(&mut data);
    }

    // Map list.
    align_data(&mut data);
    let map_off = abs(&data);
    let mut map_entries: Vec<(u16, u32, u32)> = vec![(TYPE_HEADER_ITEM, 1, 0)];
    if !strings.is_empty() {
        map_entries.push((TYPE_STRING_ID_ITEM, strings.len() as u32, string_ids_off));
    }
    if !types.is_empty() {
        map_entries.push((TYPE_TYPE_ID_ITEM, types.len() as u32, type_ids_off));
    }
    if proto_count > 0 {
        map_entries.push((TYPE_PROTO_ID_ITEM, proto_count, proto_ids_off));
    }
    if !method_ids.is_empty() {
        map_entries.push((TYPE_METHOD_ID_ITEM, method_ids.len() as u32, method_ids_off));
    }
    if !classes.is_empty() {
        map_entries.push((TYPE_CLASS_DEF_ITEM, classes.len() as u32, class_defs_off));
    }
    if type_list_count > 0 {
        map_entries.push((TYPE_TYPE_LIST, type_list_count, first_type_list_off));
    }
    if debug_count > 0 {
        map_entries.push((TYPE_DEBUG_INFO_ITEM, debug_count, first_debug_off));
    }
    if code_count > 0 {
        map_entries.push((TYPE_CODE_ITEM, code_count, first_code_off));
    }
    if class_data_count > 0 {
        map_entries.push((TYPE_CLASS_DATA_ITEM, class_data_count, first_class_data_off));
    }
    if !strings.is_empty() {
        map_entries.push((TYPE_STRING_DATA_ITEM, strings.len() as u32, first_string_data_off));
    }
    map_entries.push((TYPE_MAP_LIST, 1, map_off));
    map_entries.sort_by_key(|entry| entry.2);
    write_u4(&mut data, map_entries.len() as u32);
    for (type_code, size, off) in &map_entries {
        write_u2(&mut data, *type_code);
        write_u2(&mut data, 0);
        write_u4(&mut data, *size);
        write_u4(&mut data, *off);
    }

    // IDs sections.
    let mut file = vec![0u8; HEADER_SIZE as usize];
    for off in &string_data_offs {
        write_u4(&mut file, *off);
    }
    for type_name in &types {
        write_u4(&mut file, string_index[type_name.as_str()]);
    }
    if has_methods {
        write_u4(&mut file, string_index["V"]);
        write_u4(&mut file, type_index["V"]);
        write_u4(&mut file, 0); // no parameters
    }
    for (class_idx, name_idx) in &method_ids {
        write_u2(&mut file, *class_idx as u16);
        write_u2(&mut file, 0); // the single ()V proto
        write_u4(&mut file, *name_idx);
    }
    for class in classes {
        write_u4(&mut file, type_index[class.descriptor]);
        write_u4(&mut file, ACC_PUBLIC);
        let superclass = match class.superclass {
            Some(s) => type_index[s],
            None => NO_INDEX,
        };
        write_u4(&mut file, superclass);
        write_u4(&mut file, interface_offs.get(class.descriptor).copied().unwrap_or(0));
        let source = match class.source_file {
            Some(s) => string_index[s],
            None => NO_INDEX,
        };
        write_u4(&mut file, source);
        write_u4(&mut file, 0); // annotations
        write_u4(&mut file, class_data_offs.get(class.descriptor).copied().unwrap_or(0));
        write_u4(&mut file, 0); // static values
    }
    assert_eq!(file.len() as u32, data_off);
    file.extend_from_slice(&data);

    let header = Header {
        magic: DEX_FILE_MAGIC,
        checksum: 0,
        signature: [0; 20],
        file_size: file.len() as u32,
        header_size: HEADER_SIZE,
        endian_tag: ENDIAN_CONSTANT,
        link_size: 0,
        link_off: 0,
        map_off,
        string_ids_size: strings.len() as u32,
        string_ids_off,
        type_ids_size: types.len() as u32,
        type_ids_off,
        proto_ids_size: proto_count,
        proto_ids_off: if proto_count > 0 { proto_ids_off } else { 0 },
        field_ids_size: 0,
        field_ids_off: 0,
        method_ids_size: method_ids.len() as u32,
        method_ids_off: if method_ids.is_empty() { 0 } else { method_ids_off },
        class_defs_size: classes.len() as u32,
        class_defs_off: if classes.is_empty() { 0 } else { class_defs_off },
        data_size: file.len() as u32 - data_off,
        data_off,
    };
    let mut header_bytes = Vec::with_capacity(HEADER_SIZE as usize);
    header.write(&mut header_bytes);
    file[..HEADER_SIZE as usize].copy_from_slice(&header_bytes);

    write_hashes(&mut file).expect("fixture files always exceed one header");
    file
}

pub fn parse(bytes: Vec<u8>) -> DexBuffer {
    DexBuffer::from_bytes(bytes).expect("fixture or merge output failed to parse")
}

/// All strings in string-ID order.
pub fn read_strings(dex: &DexBuffer) -> Vec<String> {
    (0..dex.toc().string_ids.size)
        .map(|i| dex.string(i).unwrap().to_string().unwrap())
        .collect()
}

/// Class descriptors in class_def emission order.
pub fn class_descriptors(dex: &DexBuffer) -> Vec<String> {
    dex.class_defs()
        .unwrap()
        .iter()
        .map(|def| dex.type_name(def.class_idx).unwrap())
        .collect()
}

/// The descriptor of a class's superclass, if it has one.
pub fn superclass_of(dex: &DexBuffer, descriptor: &str) -> Option<String> {
    for def in dex.class_defs().unwrap() {
        if dex.type_name(def.class_idx).unwrap() == descriptor {
            if def.superclass_idx == NO_INDEX {
                return None;
            }
            return Some(dex.type_name(def.superclass_idx).unwrap());
        }
    }
    panic!("class {} not found", descriptor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_parses_and_is_sorted() {
        let dex = parse(build_dex(&[
            ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true),
            ClassSpec::new("LBar;").extends("Ljava/lang/Object;"),
        ]));

        let strings = read_strings(&dex);
        let mut sorted = strings.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(strings, sorted);

        assert_eq!(dex.toc().class_defs.size, 2);
        assert_eq!(dex.toc().codes.size, 1);
        assert_eq!(superclass_of(&dex, "LFoo;").unwrap(), "Ljava/lang/Object;");
    }
}
