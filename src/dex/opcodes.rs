//! Static metadata for the Dalvik instruction set: every defined opcode's
//! name, encoding format and the kind of constant-pool reference it embeds.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// The kind of pool reference an instruction operand carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    None,
    String,
    Type,
    Field,
    Method,
    CallSite,
    MethodProto,
    MethodHandle,
}

/// Instruction encoding formats. The digit prefix is the size in 16-bit
/// code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Format10t,
    Format10x,
    Format11n,
    Format11x,
    Format12x,
    Format20t,
    Format21c,
    Format21ih,
    Format21lh,
    Format21s,
    Format21t,
    Format22b,
    Format22c,
    Format22s,
    Format22t,
    Format22x,
    Format23x,
    Format30t,
    Format31c,
    Format31i,
    Format31t,
    Format32x,
    Format35c,
    Format3rc,
    Format45cc,
    Format4rcc,
    Format51l,
}

impl Format {
    pub const fn code_units(&self) -> usize {
        match self {
            Format::Format10t
            | Format::Format10x
            | Format::Format11n
            | Format::Format11x
            | Format::Format12x => 1,

            Format::Format20t
            | Format::Format21c
            | Format::Format21ih
            | Format::Format21lh
            | Format::Format21s
            | Format::Format21t
            | Format::Format22b
            | Format::Format22c
            | Format::Format22s
            | Format::Format22t
            | Format::Format22x
            | Format::Format23x => 2,

            Format::Format30t
            | Format::Format31c
            | Format::Format31i
            | Format::Format31t
            | Format::Format32x
            | Format::Format35c
            | Format::Format3rc => 3,

            Format::Format45cc | Format::Format4rcc => 4,

            Format::Format51l => 5,
        }
    }
}

pub struct Opcode {
    pub value: u8,
    pub name: &'static str,
    pub reference_type: ReferenceType,
    pub reference_type2: Option<ReferenceType>,
    pub format: Format,
}

static OPCODES: Lazy<Vec<Opcode>> = Lazy::new(|| {
    use Format as F;
    use ReferenceType as R;

    let mut table: Vec<Opcode> = Vec::with_capacity(0xe4);
    {
        let mut def = |value: u8, name: &'static str, reference_type: R, format: F| {
            table.push(Opcode { value, name, reference_type, reference_type2: None, format });
        };

        def(0x00, "nop", R::None, F::Format10x);
        def(0x01, "move", R::None, F::Format12x);
        def(0x02, "move/from16", R::None, F::Format22x);
        def(0x03, "move/16", R::None, F::Format32x);
        def(0x04, "move-wide", R::None, F::Format12x);
        def(0x05, "move-wide/from16", R::None, F::Format22x);
        def(0x06, "move-wide/16", R::None, F::Format32x);
        def(0x07, "move-object", R::None, F::Format12x);
        def(0x08, "move-object/from16", R::None, F::Format22x);
        def(0x09, "move-object/16", R::None, F::Format32x);
        def(0x0a, "move-result", R::None, F::Format11x);
        def(0x0b, "move-result-wide", R::None, F::Format11x);
        def(0x0c, "move-result-object", R::None, F::Format11x);
        def(0x0d, "move-exception", R::None, F::Format11x);
        def(0x0e, "return-void", R::None, F::Format10x);
        def(0x0f, "return", R::None, F::Format11x);
        def(0x10, "return-wide", R::None, F::Format11x);
        def(0x11, "return-object", R::None, F::Format11x);
        def(0x12, "const/4", R::None, F::Format11n);
        def(0x13, "const/16", R::None, F::Format21s);
        def(0x14, "const", R::None, F::Format31i);
        def(0x15, "const/high16", R::None, F::Format21ih);
        def(0x16, "const-wide/16", R::None, F::Format21s);
        def(0x17, "const-wide/32", R::None, F::Format31i);
        def(0x18, "const-wide", R::None, F::Format51l);
        def(0x19, "const-wide/high16", R::None, F::Format21lh);
        def(0x1a, "const-string", R::String, F::Format21c);
        def(0x1b, "const-string/jumbo", R::String, F::Format31c);
        def(0x1c, "const-class", R::Type, F::Format21c);
        def(0x1d, "monitor-enter", R::None, F::Format11x);
        def(0x1e, "monitor-exit", R::None, F::Format11x);
        def(0x1f, "check-cast", R::Type, F::Format21c);
        def(0x20, "instance-of", R::Type, F::Format22c);
        def(0x21, "array-length", R::None, F::Format12x);
        def(0x22, "new-instance", R::Type, F::Format21c);
        def(0x23, "new-array", R::Type, F::Format22c);
        def(0x24, "filled-new-array", R::Type, F::Format35c);
        def(0x25, "filled-new-array/range", R::Type, F::Format3rc);
        def(0x26, "fill-array-data", R::None, F::Format31t);
        def(0x27, "throw", R::None, F::Format11x);
        def(0x28, "goto", R::None, F::Format10t);
        def(0x29, "goto/16", R::None, F::Format20t);
        def(0x2a, "goto/32", R::None, F::Format30t);
        def(0x2b, "packed-switch", R::None, F::Format31t);
        def(0x2c, "sparse-switch", R::None, F::Format31t);
        def(0x2d, "cmpl-float", R::None, F::Format23x);
        def(0x2e, "cmpg-float", R::None, F::Format23x);
        def(0x2f, "cmpl-double", R::None, F::Format23x);
        def(0x30, "cmpg-double", R::None, F::Format23x);
        def(0x31, "cmp-long", R::None, F::Format23x);
        def(0x32, "if-eq", R::None, F::Format22t);
        def(0x33, "if-ne", R::None, F::Format22t);
        def(0x34, "if-lt", R::None, F::Format22t);
        def(0x35, "if-ge", R::None, F::Format22t);
        def(0x36, "if-gt", R::None, F::Format22t);
        def(0x37, "if-le", R::None, F::Format22t);
        def(0x38, "if-eqz", R::None, F::Format21t);
        def(0x39, "if-nez", R::None, F::Format21t);
        def(0x3a, "if-ltz", R::None, F::Format21t);
        def(0x3b, "if-gez", R::None, F::Format21t);
        def(0x3c, "if-gtz", R::None, F::Format21t);
        def(0x3d, "if-lez", R::None, F::Format21t);
        def(0x44, "aget", R::None, F::Format23x);
        def(0x45, "aget-wide", R::None, F::Format23x);
        def(0x46, "aget-object", R::None, F::Format23x);
        def(0x47, "aget-boolean", R::None, F::Format23x);
        def(0x48, "aget-byte", R::None, F::Format23x);
        def(0x49, "aget-char", R::None, F::Format23x);
        def(0x4a, "aget-short", R::None, F::Format23x);
        def(0x4b, "aput", R::None, F::Format23x);
        def(0x4c, "aput-wide", R::None, F::Format23x);
        def(0x4d, "aput-object", R::None, F::Format23x);
        def(0x4e, "aput-boolean", R::None, F::Format23x);
        def(0x4f, "aput-byte", R::None, F::Format23x);
        def(0x50, "aput-char", R::None, F::Format23x);
        def(0x51, "aput-short", R::None, F::Format23x);
        def(0x52, "iget", R::Field, F::Format22c);
        def(0x53, "iget-wide", R::Field, F::Format22c);
        def(0x54, "iget-object", R::Field, F::Format22c);
        def(0x55, "iget-boolean", R::Field, F::Format22c);
        def(0x56, "iget-byte", R::Field, F::Format22c);
        def(0x57, "iget-char", R::Field, F::Format22c);
        def(0x58, "iget-short", R::Field, F::Format22c);
        def(0x59, "iput", R::Field, F::Format22c);
        def(0x5a, "iput-wide", R::Field, F::Format22c);
        def(0x5b, "iput-object", R::Field, F::Format22c);
        def(0x5c, "iput-boolean", R::Field, F::Format22c);
        def(0x5d, "iput-byte", R::Field, F::Format22c);
        def(0x5e, "iput-char", R::Field, F::Format22c);
        def(0x5f, "iput-short", R::Field, F::Format22c);
        def(0x60, "sget", R::Field, F::Format21c);
        def(0x61, "sget-wide", R::Field, F::Format21c);
        def(0x62, "sget-object", R::Field, F::Format21c);
        def(0x63, "sget-boolean", R::Field, F::Format21c);
        def(0x64, "sget-byte", R::Field, F::Format21c);
        def(0x65, "sget-char", R::Field, F::Format21c);
        def(0x66, "sget-short", R::Field, F::Format21c);
        def(0x67, "sput", R::Field, F::Format21c);
        def(0x68, "sput-wide", R::Field, F::Format21c);
        def(0x69, "sput-object", R::Field, F::Format21c);
        def(0x6a, "sput-boolean", R::Field, F::Format21c);
        def(0x6b, "sput-byte", R::Field, F::Format21c);
        def(0x6c, "sput-char", R::Field, F::Format21c);
        def(0x6d, "sput-short", R::Field, F::Format21c);
        def(0x6e, "invoke-virtual", R::Method, F::Format35c);
        def(0x6f, "invoke-super", R::Method, F::Format35c);
        def(0x70, "invoke-direct", R::Method, F::Format35c);
        def(0x71, "invoke-static", R::Method, F::Format35c);
        def(0x72, "invoke-interface", R::Method, F::Format35c);
        def(0x74, "invoke-virtual/range", R::Method, F::Format3rc);
        def(0x75, "invoke-super/range", R::Method, F::Format3rc);
        def(0x76, "invoke-direct/range", R::Method, F::Format3rc);
        def(0x77, "invoke-static/range", R::Method, F::Format3rc);
        def(0x78, "invoke-interface/range", R::Method, F::Format3rc);
        def(0x7b, "neg-int", R::None, F::Format12x);
        def(0x7c, "not-int", R::None, F::Format12x);
        def(0x7d, "neg-long", R::None, F::Format12x);
        def(0x7e, "not-long", R::None, F::Format12x);
        def(0x7f, "neg-float", R::None, F::Format12x);
        def(0x80, "neg-double", R::None, F::Format12x);
        def(0x81, "int-to-long", R::None, F::Format12x);
        def(0x82, "int-to-float", R::None, F::Format12x);
        def(0x83, "int-to-double", R::None, F::Format12x);
        def(0x84, "long-to-int", R::None, F::Format12x);
        def(0x85, "long-to-float", R::None, F::Format12x);
        def(0x86, "long-to-double", R::None, F::Format12x);
        def(0x87, "float-to-int", R::None, F::Format12x);
        def(0x88, "float-to-long", R::None, F::Format12x);
        def(0x89, "float-to-double", R::None, F::Format12x);
        def(0x8a, "double-to-int", R::None, F::Format12x);
        def(0x8b, "double-to-long", R::None, F::Format12x);
        def(0x8c, "double-to-float", R::None, F::Format12x);
        def(0x8d, "int-to-byte", R::None, F::Format12x);
        def(0x8e, "int-to-char", R::None, F::Format12x);
        def(0x8f, "int-to-short", R::None, F::Format12x);
        def(0x90, "add-int", R::None, F::Format23x);
        def(0x91, "sub-int", R::None, F::Format23x);
        def(0x92, "mul-int", R::None, F::Format23x);
        def(0x93, "div-int", R::None, F::Format23x);
        def(0x94, "rem-int", R::None, F::Format23x);
        def(0x95, "and-int", R::None, F::Format23x);
        def(0x96, "or-int", R::None, F::Format23x);
        def(0x97, "xor-int", R::None, F::Format23x);
        def(0x98, "shl-int", R::None, F::Format23x);
        def(0x99, "shr-int", R::None, F::Format23x);
        def(0x9a, "ushr-int", R::None, F::Format23x);
        def(0x9b, "add-long", R::None, F::Format23x);
        def(0x9c, "sub-long", R::None, F::Format23x);
        def(0x9d, "mul-long", R::None, F::Format23x);
        def(0x9e, "div-long", R::None, F::Format23x);
        def(0x9f, "rem-long", R::None, F::Format23x);
        def(0xa0, "and-long", R::None, F::Format23x);
        def(0xa1, "or-long", R::None, F::Format23x);
        def(0xa2, "xor-long", R::None, F::Format23x);
        def(0xa3, "shl-long", R::None, F::Format23x);
        def(0xa4, "shr-long", R::None, F::Format23x);
        def(0xa5, "ushr-long", R::None, F::Format23x);
        def(0xa6, "add-float", R::None, F::Format23x);
        def(0xa7, "sub-float", R::None, F::Format23x);
        def(0xa8, "mul-float", R::None, F::Format23x);
        def(0xa9, "div-float", R::None, F::Format23x);
        def(0xaa, "rem-float", R::None, F::Format23x);
        def(0xab, "add-double", R::None, F::Format23x);
        def(0xac, "sub-double", R::None, F::Format23x);
        def(0xad, "mul-double", R::None, F::Format23x);
        def(0xae, "div-double", R::None, F::Format23x);
        def(0xaf, "rem-double", R::None, F::Format23x);
        def(0xb0, "add-int/2addr", R::None, F::Format12x);
        def(0xb1, "sub-int/2addr", R::None, F::Format12x);
        def(0xb2, "mul-int/2addr", R::None, F::Format12x);
        def(0xb3, "div-int/2addr", R::None, F::Format12x);
        def(0xb4, "rem-int/2addr", R::None, F::Format12x);
        def(0xb5, "and-int/2addr", R::None, F::Format12x);
        def(0xb6, "or-int/2addr", R::None, F::Format12x);
        def(0xb7, "xor-int/2addr", R::None, F::Format12x);
        def(0xb8, "shl-int/2addr", R::None, F::Format12x);
        def(0xb9, "shr-int/2addr", R::None, F::Format12x);
        def(0xba, "ushr-int/2addr", R::None, F::Format12x);
        def(0xbb, "add-long/2addr", R::None, F::Format12x);
        def(0xbc, "sub-long/2addr", R::None, F::Format12x);
        def(0xbd, "mul-long/2addr", R::None, F::Format12x);
        def(0xbe, "div-long/2addr", R::None, F::Format12x);
        def(0xbf, "rem-long/2addr", R::None, F::Format12x);
        def(0xc0, "and-long/2addr", R::None, F::Format12x);
        def(0xc1, "or-long/2addr", R::None, F::Format12x);
        def(0xc2, "xor-long/2addr", R::None, F::Format12x);
        def(0xc3, "shl-long/2addr", R::None, F::Format12x);
        def(0xc4, "shr-long/2addr", R::None, F::Format12x);
        def(0xc5, "ushr-long/2addr", R::None, F::Format12x);
        def(0xc6, "add-float/2addr", R::None, F::Format12x);
        def(0xc7, "sub-float/2addr", R::None, F::Format12x);
        def(0xc8, "mul-float/2addr", R::None, F::Format12x);
        def(0xc9, "div-float/2addr", R::None, F::Format12x);
        def(0xca, "rem-float/2addr", R::None, F::Format12x);
        def(0xcb, "add-double/2addr", R::None, F::Format12x);
        def(0xcc, "sub-double/2addr", R::None, F::Format12x);
        def(0xcd, "mul-double/2addr", R::None, F::Format12x);
        def(0xce, "div-double/2addr", R::None, F::Format12x);
        def(0xcf, "rem-double/2addr", R::None, F::Format12x);
        def(0xd0, "add-int/lit16", R::None, F::Format22s);
        def(0xd1, "rsub-int", R::None, F::Format22s);
        def(0xd2, "mul-int/lit16", R::None, F::Format22s);
        def(0xd3, "div-int/lit16", R::None, F::Format22s);
        def(0xd4, "rem-int/lit16", R::None, F::Format22s);
        def(0xd5, "and-int/lit16", R::None, F::Format22s);
        def(0xd6, "or-int/lit16", R::None, F::Format22s);
        def(0xd7, "xor-int/lit16", R::None, F::Format22s);
        def(0xd8, "add-int/lit8", R::None, F::Format22b);
        def(0xd9, "rsub-int/lit8", R::None, F::Format22b);
        def(0xda, "mul-int/lit8", R::None, F::Format22b);
        def(0xdb, "div-int/lit8", R::None, F::Format22b);
        def(0xdc, "rem-int/lit8", R::None, F::Format22b);
        def(0xdd, "and-int/lit8", R::None, F::Format22b);
        def(0xde, "or-int/lit8", R::None, F::Format22b);
        def(0xdf, "xor-int/lit8", R::None, F::Format22b);
        def(0xe0, "shl-int/lit8", R::None, F::Format22b);
        def(0xe1, "shr-int/lit8", R::None, F::Format22b);
        def(0xe2, "ushr-int/lit8", R::None, F::Format22b);
        def(0xfc, "invoke-custom", R::CallSite, F::Format35c);
        def(0xfd, "invoke-custom/range", R::CallSite, F::Format3rc);
        def(0xfe, "const-method-handle", R::MethodHandle, F::Format21c);
        def(0xff, "const-method-type", R::MethodProto, F::Format21c);
    }

    table.push(Opcode {
        value: 0xfa,
        name: "invoke-polymorphic",
        reference_type: R::Method,
        reference_type2: Some(R::MethodProto),
        format: F::Format45cc,
    });
    table.push(Opcode {
        value: 0xfb,
        name: "invoke-polymorphic/range",
        reference_type: R::Method,
        reference_type2: Some(R::MethodProto),
        format: F::Format4rcc,
    });

    table
});

static BY_VALUE: Lazy<HashMap<u8, &'static Opcode>> =
    Lazy::new(|| OPCODES.iter().map(|op| (op.value, op)).collect());

/// Looks up the opcode occupying the low byte of an instruction's first
/// code unit. Returns `None` for the unassigned gaps in the map.
pub fn opcode(value: u8) -> Option<&'static Opcode> {
    BY_VALUE.get(&value).copied()
}
