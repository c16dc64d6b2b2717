//! Class-def emission ordering. A class may only be written after its
//! supertype and every implemented interface, so each sortable type gets a
//! depth (the longest chain of declared supertypes/interfaces among the
//! types being emitted) and the section is sorted by (depth, type index).

use crate::dex::error::DexError;
use crate::dex::items::{ClassDef, TypeList};
use crate::dex::NO_INDEX;
use crate::merge::index_map::IndexMap;
use crate::merge::Input;

#[derive(Debug)]
pub struct SortableType {
    input: Input,
    class_def: ClassDef,
    type_index: u32,
    supertype_index: u32,
    interfaces: Vec<u16>,
    depth: Option<u32>,
}

impl SortableType {
    /// Captures just enough of a class_def, already remapped into the new
    /// index space, to order it and find it again later.
    pub fn new(
        input: Input,
        class_def: ClassDef,
        index_map: &IndexMap,
        source: &[u8],
    ) -> Result<SortableType, DexError> {
        let type_index = index_map.adjust_type(class_def.class_idx)?;
        let supertype_index = index_map.adjust_type(class_def.superclass_idx)?;
        let interfaces = if class_def.interfaces_off != 0 {
            let mut ix = class_def.interfaces_off as usize;
            index_map.adjust_type_list(TypeList::read(source, &mut ix)?)?.0
        } else {
            Vec::new()
        };

        Ok(SortableType { input, class_def, type_index, supertype_index, interfaces, depth: None })
    }

    pub fn input(&self) -> Input {
        self.input
    }

    pub fn class_def(&self) -> &ClassDef {
        &self.class_def
    }

    /// The class's type index in the merged output.
    pub fn type_index(&self) -> u32 {
        self.type_index
    }

    /// The remapped supertype index, `NO_INDEX` for rootless classes.
    pub fn supertype_index(&self) -> u32 {
        self.supertype_index
    }

    fn referenced_types(&self) -> impl Iterator<Item = u32> + '_ {
        let supertype =
            if self.supertype_index == NO_INDEX { None } else { Some(self.supertype_index) };
        supertype.into_iter().chain(self.interfaces.iter().map(|i| *i as u32))
    }
}

/// Populates every type's depth. Each pass assigns a depth to every type
/// whose references are all resolved, so the assigned count strictly grows
/// per pass on acyclic input; a pass with no progress means a cycle.
pub fn assign_depths(types: &mut [Option<SortableType>]) -> Result<(), DexError> {
    loop {
        let mut all_done = true;
        let mut progressed = false;
        for i in 0..types.len() {
            let unassigned = matches!(&types[i], Some(t) if t.depth.is_none());
            if !unassigned {
                continue;
            }
            match compute_depth(types, i) {
                Some(depth) => {
                    if let Some(t) = types[i].as_mut() {
                        t.depth = Some(depth);
                    }
                    progressed = true;
                }
                None => all_done = false,
            }
        }
        if all_done {
            return Ok(());
        }
        if !progressed {
            fail!("cyclic class hierarchy");
        }
    }
}

/// `1 + max(referenced depths)`; types outside the sortable set count as
/// depth 0. `None` while any referenced depth is still unassigned.
fn compute_depth(types: &[Option<SortableType>], index: usize) -> Option<u32> {
    let t = types[index].as_ref().expect("caller checked presence");
    let mut max = 0;
    for referenced in t.referenced_types() {
        match types.get(referenced as usize).and_then(|slot| slot.as_ref()) {
            None => {}
            Some(other) => match other.depth {
                Some(depth) => max = max.max(depth),
                None => return None,
            },
        }
    }
    Some(max + 1)
}

/// Flattens the sparse array into emission order: (depth, type index)
/// ascending, absent slots dropped.
pub fn into_emission_order(types: Vec<Option<SortableType>>) -> Vec<SortableType> {
    let mut present: Vec<SortableType> = types.into_iter().flatten().collect();
    present.sort_by_key(|t| (t.depth.expect("depths assigned before sorting"), t.type_index));
    present
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sortable(type_index: u32, supertype_index: u32, interfaces: Vec<u16>) -> SortableType {
        SortableType {
            input: Input::A,
            class_def: ClassDef {
                class_idx: type_index,
                access_flags: 0,
                superclass_idx: supertype_index,
                interfaces_off: 0,
                source_file_idx: NO_INDEX,
                annotations_off: 0,
                class_data_off: 0,
                static_values_off: 0,
            },
            type_index,
            supertype_index,
            interfaces,
            depth: None,
        }
    }

    #[test]
    fn chain_depths_grow_by_one() {
        // 0 extends external, 1 extends 0, 2 extends 1.
        let mut types = vec![
            Some(sortable(0, NO_INDEX, vec![])),
            Some(sortable(1, 0, vec![])),
            Some(sortable(2, 1, vec![])),
        ];
        assign_depths(&mut types).unwrap();
        let order = into_emission_order(types);
        assert_eq!(order.iter().map(|t| t.type_index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(order.iter().map(|t| t.depth.unwrap()).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn interfaces_contribute_to_depth() {
        // 2 implements 1, which extends 0; all sortable.
        let mut types = vec![
            Some(sortable(0, NO_INDEX, vec![])),
            Some(sortable(1, 0, vec![])),
            Some(sortable(2, NO_INDEX, vec![1])),
        ];
        assign_depths(&mut types).unwrap();
        assert_eq!(types[2].as_ref().unwrap().depth, Some(3));
    }

    #[test]
    fn external_references_have_depth_zero() {
        // Supertype index 9 is outside the array bounds: an external type.
        let mut types = vec![Some(sortable(0, 9, vec![]))];
        assign_depths(&mut types).unwrap();
        assert_eq!(types[0].as_ref().unwrap().depth, Some(1));
    }

    #[test]
    fn cycles_are_fatal() {
        let mut types = vec![Some(sortable(0, 1, vec![])), Some(sortable(1, 0, vec![]))];
        let err = assign_depths(&mut types).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn emission_order_breaks_depth_ties_by_type_index() {
        let mut types = vec![
            Some(sortable(0, NO_INDEX, vec![])),
            None,
            Some(sortable(2, NO_INDEX, vec![])),
        ];
        assign_depths(&mut types).unwrap();
        let order = into_emission_order(types);
        assert_eq!(order.iter().map(|t| t.type_index).collect::<Vec<_>>(), vec![0, 2]);
    }
}
