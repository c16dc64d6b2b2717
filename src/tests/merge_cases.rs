//! End-to-end merge scenarios over synthetic DEX inputs.

use adler::adler32_slice;
use sha1::{Digest, Sha1};

use crate::dex::error::DexErrorKind;
use crate::dex::file::DexBuffer;
use crate::dex::items::{ClassData, Code, MethodId};
use crate::dex::{read_u4, SIZE_MEMBER_ID_ITEM};
use crate::merge::{CollisionPolicy, DexMerger};
use crate::tests::fixtures::{
    build_dex, class_descriptors, parse, read_strings, superclass_of, ClassSpec, MethodSpec,
};

fn merge(a: Vec<u8>, b: Vec<u8>, policy: CollisionPolicy) -> Vec<u8> {
    try_merge(a, b, policy).expect("merge failed")
}

fn try_merge(
    a: Vec<u8>,
    b: Vec<u8>,
    policy: CollisionPolicy,
) -> Result<Vec<u8>, crate::dex::error::DexError> {
    let dex_a = DexBuffer::from_bytes(a)?;
    let dex_b = if b.is_empty() { DexBuffer::empty() } else { DexBuffer::from_bytes(b)? };
    DexMerger::new(dex_a, dex_b, policy).merge()
}

/// Compaction forced on, so outputs are exact-sized.
fn merge_compacted(a: Vec<u8>, b: Vec<u8>) -> Vec<u8> {
    let dex_a = DexBuffer::from_bytes(a).unwrap();
    let dex_b = if b.is_empty() { DexBuffer::empty() } else { DexBuffer::from_bytes(b).unwrap() };
    let mut merger = DexMerger::new(dex_a, dex_b, CollisionPolicy::KeepFirst);
    merger.set_compact_waste_threshold(0);
    merger.merge().unwrap()
}

fn assert_strictly_sorted_strings(dex: &DexBuffer) {
    let strings = read_strings(dex);
    for pair in strings.windows(2) {
        assert!(pair[0] < pair[1], "string IDs not strictly sorted: {:?} >= {:?}", pair[0], pair[1]);
    }
}

#[test]
fn merging_with_empty_preserves_all_classes() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;")]);
    let out = parse(merge(a, vec![], CollisionPolicy::KeepFirst));

    assert_eq!(class_descriptors(&out), vec!["LFoo;"]);
    assert_eq!(superclass_of(&out, "LFoo;").unwrap(), "Ljava/lang/Object;");
    assert_strictly_sorted_strings(&out);
}

#[test]
fn disjoint_inputs_keep_both_classes() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").method("run", true)]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    let mut descriptors = class_descriptors(&out);
    descriptors.sort();
    assert_eq!(descriptors, vec!["LBar;", "LFoo;"]);
    assert_eq!(out.toc().codes.size, 2);
    assert_eq!(out.toc().method_ids.size, 2);
    assert_strictly_sorted_strings(&out);
}

#[test]
fn shared_strings_are_deduplicated() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").source("hello")]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").source("hello")]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    let strings = read_strings(&out);
    assert_eq!(strings.iter().filter(|s| s.as_str() == "hello").count(), 1);
    assert_eq!(
        strings.iter().filter(|s| s.as_str() == "Ljava/lang/Object;").count(),
        1
    );
    assert_strictly_sorted_strings(&out);
}

#[test]
fn collision_keep_first_retains_first_definition() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("LSuperA;")]);
    let b = build_dex(&[ClassSpec::new("LFoo;").extends("LSuperB;")]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    assert_eq!(class_descriptors(&out), vec!["LFoo;"]);
    assert_eq!(superclass_of(&out, "LFoo;").unwrap(), "LSuperA;");
}

#[test]
fn collision_fail_names_the_duplicate() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("LSuperA;")]);
    let b = build_dex(&[ClassSpec::new("LFoo;").extends("LSuperB;")]);
    let err = try_merge(a, b, CollisionPolicy::Fail).unwrap_err();

    assert_eq!(err.kind(), DexErrorKind::Collision);
    assert!(err.to_string().contains("LFoo;"), "message was: {}", err);
}

#[test]
fn classes_emit_after_their_supertypes_and_interfaces() {
    // Descriptor order is the reverse of inheritance order, so a correct
    // result can only come from the depth sort.
    let a = build_dex(&[
        ClassSpec::new("LB;").extends("LC;"),
        ClassSpec::new("LC;").extends("Ljava/lang/Object;"),
    ]);
    let b = build_dex(&[ClassSpec::new("LA;").extends("LB;")]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    assert_eq!(class_descriptors(&out), vec!["LC;", "LB;", "LA;"]);
}

#[test]
fn interfaces_precede_their_implementors() {
    let a = build_dex(&[
        ClassSpec::new("LZImpl;").extends("Ljava/lang/Object;").implements("LIface;"),
        ClassSpec::new("LIface;").extends("Ljava/lang/Object;"),
    ]);
    let out = parse(merge(a, vec![], CollisionPolicy::KeepFirst));

    let order = class_descriptors(&out);
    let iface = order.iter().position(|d| d == "LIface;").unwrap();
    let implementor = order.iter().position(|d| d == "LZImpl;").unwrap();
    assert!(iface < implementor, "emission order was {:?}", order);
}

#[test]
fn removed_classes_are_dropped_from_the_output() {
    let a = build_dex(&[
        ClassSpec::new("LFoo;").extends("Ljava/lang/Object;"),
        ClassSpec::new("LBar;").extends("Ljava/lang/Object;"),
    ]);
    let dex_a = DexBuffer::from_bytes(a).unwrap();
    let mut merger = DexMerger::new(dex_a, DexBuffer::empty(), CollisionPolicy::KeepFirst);
    merger.remove_class("LBar;");
    let out = parse(merger.merge().unwrap());

    assert_eq!(class_descriptors(&out), vec!["LFoo;"]);
    // The descriptor string itself survives; only the definition goes.
    assert!(read_strings(&out).contains(&"LBar;".to_string()));
}

#[test]
fn method_code_survives_the_rewrite() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").method("run", true)]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    for def in out.class_defs().unwrap() {
        assert_ne!(def.class_data_off, 0);
        let mut ix = def.class_data_off as usize;
        let class_data = ClassData::read(out.bytes(), &mut ix).unwrap();
        assert_eq!(class_data.direct_methods.len(), 1);

        let method = &class_data.direct_methods[0];
        assert_ne!(method.code_off, 0);
        let mut code_ix = method.code_off as usize;
        let code = Code::read(out.bytes(), &mut code_ix).unwrap();
        assert_eq!(code.insns, vec![0x000e]);
        assert_eq!(code.registers_size, 1);

        // The delta-encoded method index resolves inside the merged table.
        assert!(method.method_idx < out.toc().method_ids.size);
    }
}

#[test]
fn method_ids_stay_sorted_after_merge() {
    let a = build_dex(&[
        ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("b", false).method("a", false),
    ]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").method("c", false)]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    let section = out.toc().method_ids;
    let mut previous: Option<MethodId> = None;
    for i in 0..section.size {
        let mut ix = (section.off + i * SIZE_MEMBER_ID_ITEM) as usize;
        let method = MethodId::read(out.bytes(), &mut ix).unwrap();
        if let Some(previous) = &previous {
            assert!(previous < &method, "method IDs not strictly sorted");
        }
        previous = Some(method);
    }
}

#[test]
fn header_and_map_describe_the_file() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let out = merge(a, vec![], CollisionPolicy::KeepFirst);

    // file_size covers the whole image.
    let mut ix = 32;
    assert_eq!(read_u4(&out, &mut ix).unwrap() as usize, out.len());

    // Hashes are self-consistent.
    let mut hasher = Sha1::new();
    hasher.update(&out[32..]);
    assert_eq!(out[12..32], hasher.finalize()[..]);
    assert_eq!(
        u32::from_le_bytes(out[8..12].try_into().unwrap()),
        adler32_slice(&out[12..])
    );

    // Each non-empty section appears exactly once, in ascending offset order.
    let parsed = parse(out);
    let map_off = parsed.toc().map_list.off;
    let mut ix = map_off as usize;
    let count = read_u4(parsed.bytes(), &mut ix).unwrap();
    let mut seen = std::collections::HashSet::new();
    let mut last_off = None;
    for _ in 0..count {
        let type_code = crate::dex::read_u2(parsed.bytes(), &mut ix).unwrap();
        let _unused = crate::dex::read_u2(parsed.bytes(), &mut ix).unwrap();
        let size = read_u4(parsed.bytes(), &mut ix).unwrap();
        let off = read_u4(parsed.bytes(), &mut ix).unwrap();
        assert!(seen.insert(type_code), "map repeats section {:#06x}", type_code);
        assert!(size > 0, "map lists empty section {:#06x}", type_code);
        if let Some(last) = last_off {
            assert!(off > last, "map not sorted by offset");
        }
        last_off = Some(off);
    }
}

#[test]
fn compaction_reaches_a_fixed_point() {
    let a = build_dex(&[
        ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true).source("Foo.java"),
    ]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").method("run", true)]);

    let first = merge_compacted(a, b);
    let second = merge_compacted(first.clone(), vec![]);
    let third = merge_compacted(second.clone(), vec![]);

    // Self-merge with an empty file changes nothing once sizes are exact.
    assert_eq!(second, third);

    // And the first compacted result already agrees on all content.
    let first = parse(first);
    let second = parse(second);
    assert_eq!(class_descriptors(&first), class_descriptors(&second));
    assert_eq!(read_strings(&first), read_strings(&second));
}

#[test]
fn compaction_shrinks_a_padded_merge() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;")]);

    let padded = merge(a.clone(), b.clone(), CollisionPolicy::KeepFirst);
    let compacted = merge_compacted(a, b);
    assert!(
        compacted.len() < padded.len(),
        "expected compaction to reclaim slack ({} vs {})",
        compacted.len(),
        padded.len()
    );
    // Same classes either way.
    assert_eq!(class_descriptors(&parse(padded)), class_descriptors(&parse(compacted)));
}

#[test]
fn exception_tables_and_debug_info_are_rewritten() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method_spec(
        MethodSpec { name: "go", with_code: true, with_try: true, with_debug: true },
    )]);
    let b = build_dex(&[ClassSpec::new("LBar;").extends("Ljava/lang/Object;").method("run", true)]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    assert_eq!(out.toc().debug_infos.size, 1);

    let foo = out
        .class_defs()
        .unwrap()
        .into_iter()
        .find(|def| out.type_name(def.class_idx).unwrap() == "LFoo;")
        .unwrap();
    let mut ix = foo.class_data_off as usize;
    let class_data = ClassData::read(out.bytes(), &mut ix).unwrap();
    let mut code_ix = class_data.direct_methods[0].code_off as usize;
    let code = Code::read(out.bytes(), &mut code_ix).unwrap();

    assert_eq!(code.insns, vec![0x000e]);
    assert_eq!(code.tries.len(), 1);
    assert_eq!(code.tries[0].start_addr, 0);
    assert_eq!(code.tries[0].insn_count, 1);
    let handler = &code.handlers[code.tries[0].handler_index];
    assert_eq!(handler.pairs.len(), 1);
    assert_eq!(out.type_name(handler.pairs[0].0).unwrap(), "Ljava/lang/Object;");
    assert_eq!(handler.catch_all_addr, None);

    // The minimal debug item survives the opcode-stream rewrite verbatim.
    assert_ne!(code.debug_info_off, 0);
    let debug = &out.bytes()[code.debug_info_off as usize..code.debug_info_off as usize + 3];
    assert_eq!(debug, &[0x01, 0x00, 0x00]);
}

#[test]
fn duplicate_classes_merge_to_one_under_keep_first_even_with_code() {
    let a = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let b = build_dex(&[ClassSpec::new("LFoo;").extends("Ljava/lang/Object;").method("go", true)]);
    let out = parse(merge(a, b, CollisionPolicy::KeepFirst));

    assert_eq!(class_descriptors(&out), vec!["LFoo;"]);
    assert_eq!(out.toc().codes.size, 1);
    assert_eq!(out.toc().method_ids.size, 1);
}
