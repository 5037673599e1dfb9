use std::fmt;

macro_rules! err {
    ($kind:ident, $msg:literal) => {
        $crate::classfile::error::ClassError::of_kind($crate::classfile::error::ErrorKind::$kind, $msg)
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        $crate::classfile::error::ClassError::of_kind($crate::classfile::error::ErrorKind::$kind, &format!($fmtstr, $($args)*))
    };
    ($msg:literal) => {
        $crate::classfile::error::ClassError::new($msg)
    };
    ($fmtstr:literal, $($args:tt)*) => {
        $crate::classfile::error::ClassError::new(&format!($fmtstr, $($args)*))
    };
}

#[macro_export]
macro_rules! fail {
    ($msg:literal) => {
        return Err(ClassError::new($msg))
    };
    (($msg:literal), ($context:literal)) => {
        return Err(ClassError::with_context(ClassError::new($msg), $context.to_string()))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(ClassError::new(&format!($fmtstr, $($args)*)))
    };
    (($fmtstr:literal, $($args:tt)*), ($context:literal)) => {
        return Err(ClassError::with_context(ClassError::new(&format!($fmtstr, $($args)*)), $context.to_string()))
    };
    (($fmtstr:literal, $($args:tt)*), ($contextfmt:literal, $($contextargs:tt)*)) => {
        return Err(ClassError::with_context(ClassError::new(&format!($fmtstr, $($args)*)), format!($contextfmt, $($contextargs)*)))
    };
}

/// Broad classification of a [`ClassError`], so callers can tell a corrupt input
/// apart from a query about a class nobody can find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind
{
    /// The class file bytes do not follow the class file format
    Malformed,
    /// The directly queried class is not available from any source
    UnknownClass,
    /// The superclass chain loops back on itself
    Cycle,
    /// A numeric argument is out of its permitted range
    InvalidArgument,
    /// Valid input the rewriter cannot handle, e.g. a branch that no longer fits
    Unsupported,
    /// Reading a class source failed
    Io,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ClassError
{
    kind: ErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl ClassError
{
    pub(crate) fn new(msg: &str) -> Self
    {
        ClassError::of_kind(ErrorKind::Malformed, msg)
    }

    pub(crate) fn of_kind(kind: ErrorKind, msg: &str) -> Self
    {
        ClassError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: ClassError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        ClassError { kind: base.kind, msg: base.msg, contexts }
    }

    pub fn kind(&self) -> ErrorKind
    {
        self.kind
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for ClassError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for ClassError {}

impl From<std::io::Error> for ClassError
{
    fn from(value: std::io::Error) -> Self
    {
        ClassError::of_kind(ErrorKind::Io, &value.to_string())
    }
}
