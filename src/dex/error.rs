use std::fmt;

/// Fatal failure classes. Every error aborts the merge; no partial output
/// is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DexErrorKind {
    /// Corrupt header, truncated section, inconsistent offset, cyclic
    /// class hierarchy.
    MalformedInput,
    /// A remapped type/proto/field/method index no longer fits in 16 bits.
    IndexOverflow,
    /// Both inputs define the same class under `CollisionPolicy::Fail`.
    Collision,
    /// A section cursor was not 4-byte aligned where the format requires
    /// it. Indicates a merger bug, not bad input.
    Alignment,
    /// An underlying read or write failed; the cause is carried verbatim.
    Io,
}

#[macro_export]
macro_rules! fail {
    ($msg:literal) => {
        return Err(DexError::new($msg))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::new(&format!($fmtstr, $($args)*)))
    };
    ($kind:expr, $msg:literal) => {
        return Err(DexError::with_kind($kind, $msg))
    };
    ($kind:expr, $fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::with_kind($kind, &format!($fmtstr, $($args)*)))
    };
}

#[derive(Debug, PartialEq, Eq)]
pub struct DexError {
    kind: DexErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl DexError {
    pub(crate) fn new(msg: &str) -> Self {
        DexError {
            kind: DexErrorKind::MalformedInput,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_kind(kind: DexErrorKind, msg: &str) -> Self {
        DexError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn context(mut self, context: String) -> Self {
        self.contexts.push(context);
        self
    }

    pub fn kind(&self) -> DexErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for DexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}

impl From<std::io::Error> for DexError {
    fn from(err: std::io::Error) -> Self {
        DexError::with_kind(DexErrorKind::Io, &err.to_string())
    }
}
