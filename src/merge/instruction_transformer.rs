//! Rewrites the pool references embedded in a method's instruction stream.
//! The stream is walked by each opcode's fixed code-unit size; everything
//! except the reference operand is copied untouched.

use crate::dex::error::{DexError, DexErrorKind};
use crate::dex::opcodes::{opcode, Format, Opcode, ReferenceType};
use crate::merge::index_map::IndexMap;

const PAYLOAD_PACKED_SWITCH: u16 = 0x01;
const PAYLOAD_SPARSE_SWITCH: u16 = 0x02;
const PAYLOAD_FILL_ARRAY_DATA: u16 = 0x03;

pub fn transform(index_map: &IndexMap, insns: &[u16]) -> Result<Vec<u16>, DexError> {
    let mut out = insns.to_vec();
    let mut pc = 0usize;

    while pc < insns.len() {
        let unit = insns[pc];
        let op = (unit & 0x00ff) as u8;
        let ident = unit >> 8;

        // Pseudo-instructions share the nop opcode byte with a nonzero
        // identifier in the high byte; their content is position data and
        // literals, never pool references.
        if op == 0x00 && ident != 0 {
            pc += payload_code_units(insns, pc)?;
            continue;
        }

        let Some(opcode) = opcode(op) else {
            fail!("unknown opcode {:#04x} at pc {}", op, pc);
        };
        let width = opcode.format.code_units();
        if pc + width > insns.len() {
            fail!("truncated {} at pc {}: stream ends mid-instruction", opcode.name, pc);
        }

        match opcode.reference_type {
            ReferenceType::None => {}
            ReferenceType::String if opcode.format == Format::Format31c => {
                let old = (insns[pc + 1] as u32) | ((insns[pc + 2] as u32) << 16);
                let new = index_map.adjust_string(old)?;
                out[pc + 1] = new as u16;
                out[pc + 2] = (new >> 16) as u16;
            }
            ReferenceType::String => {
                let new = index_map.adjust_string(insns[pc + 1] as u32)?;
                set_u16(&mut out, pc + 1, new, opcode)?;
            }
            ReferenceType::Type => {
                let new = index_map.adjust_type(insns[pc + 1] as u32)?;
                set_u16(&mut out, pc + 1, new, opcode)?;
            }
            ReferenceType::Field => {
                let new = index_map.adjust_field(insns[pc + 1] as u32)?;
                set_u16(&mut out, pc + 1, new, opcode)?;
            }
            ReferenceType::Method => {
                let new = index_map.adjust_method(insns[pc + 1] as u32)?;
                set_u16(&mut out, pc + 1, new, opcode)?;
            }
            ReferenceType::MethodProto => {
                let new = index_map.adjust_proto(insns[pc + 1] as u32)?;
                set_u16(&mut out, pc + 1, new, opcode)?;
            }
            ReferenceType::CallSite | ReferenceType::MethodHandle => {
                fail!("{} references a pool this merger carries no map for", opcode.name);
            }
        }

        // invoke-polymorphic carries a second reference, the prototype, in
        // the fourth code unit.
        if let Some(second) = opcode.reference_type2 {
            if second != ReferenceType::MethodProto {
                fail!("unexpected secondary reference in {}", opcode.name);
            }
            let new = index_map.adjust_proto(insns[pc + 3] as u32)?;
            set_u16(&mut out, pc + 3, new, opcode)?;
        }

        pc += width;
    }

    Ok(out)
}

fn set_u16(out: &mut [u16], at: usize, new: u32, opcode: &Opcode) -> Result<(), DexError> {
    if new > 0xffff {
        return Err(DexError::with_kind(
            DexErrorKind::IndexOverflow,
            &format!("remapped index {} in {} does not fit in 16 bits", new, opcode.name),
        ));
    }
    out[at] = new as u16;
    Ok(())
}

/// Total size of a switch or fill-array payload, in code units.
fn payload_code_units(insns: &[u16], pc: usize) -> Result<usize, DexError> {
    let ident = insns[pc] >> 8;
    let total = match ident {
        PAYLOAD_PACKED_SWITCH => {
            // ident, size, first key (2 units), then a 2-unit target per entry
            let size = *insns.get(pc + 1).ok_or_else(truncated_payload)? as usize;
            4 + size * 2
        }
        PAYLOAD_SPARSE_SWITCH => {
            // ident, size, then 2-unit keys and 2-unit targets
            let size = *insns.get(pc + 1).ok_or_else(truncated_payload)? as usize;
            2 + size * 4
        }
        PAYLOAD_FILL_ARRAY_DATA => {
            let width = *insns.get(pc + 1).ok_or_else(truncated_payload)? as usize;
            let lo = *insns.get(pc + 2).ok_or_else(truncated_payload)? as usize;
            let hi = *insns.get(pc + 3).ok_or_else(truncated_payload)? as usize;
            let count = (hi << 16) | lo;
            4 + (width * count + 1) / 2
        }
        other => fail!("unknown payload ident {:#04x} at pc {}", other, pc),
    };

    if pc + total > insns.len() {
        fail!("truncated payload at pc {}: wants {} code units", pc, total);
    }
    Ok(total)
}

fn truncated_payload() -> DexError {
    DexError::new("truncated payload header")
}
