//! The structural event stream of a class and the traits stages implement.
//!
//! A class is replayed as exactly one [`ClassVisitor::visit`], then one region
//! per method, then one [`ClassVisitor::visit_end`]. A method region is the
//! [`MethodVisitor`] returned by [`ClassVisitor::visit_method`]; it borrows its
//! class visitor mutably, so no other region can be opened until
//! [`MethodVisitor::visit_end`] consumes it.
//!
//! Stages wrap the next visitor in the chain and forward events to it,
//! optionally adding synthetic ops. Original events are never reordered.

pub mod reader;
pub mod writer;

pub use reader::ClassReader;
pub use writer::ClassWriter;

use crate::classfile::code::{CodeOp, CodeTrailer};
use crate::classfile::error::ClassError;
use crate::classfile::ClassAccess;

/// Everything known about a class at class-start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader
{
    pub minor_version: u16,
    pub major_version: u16,
    pub access: ClassAccess,
    pub name: String,
    /// None only for java/lang/Object
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

impl ClassHeader
{
    pub fn is_interface(&self) -> bool
    {
        self.access.contains(ClassAccess::INTERFACE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHeader
{
    pub access: ClassAccess,
    pub name: String,
    pub descriptor: String,
    /// Position of the method in the class being read, None for methods a
    /// stage made up. The writer copies non-code attributes from this method.
    pub source: Option<usize>,
}

impl MethodHeader
{
    pub fn is_static(&self) -> bool
    {
        self.access.contains(ClassAccess::STATIC)
    }

    /// True if this method is `name` with exactly `descriptor`
    pub fn matches(&self, name: &str, descriptor: &str) -> bool
    {
        self.name == name && self.descriptor == descriptor
    }
}

pub trait ClassVisitor
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>;

    /// Opens a method region. The returned visitor sees the method's ops in
    /// program order and is closed by its own `visit_end`.
    fn visit_method<'a>(&'a mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'a>, ClassError>;

    fn visit_end(&mut self) -> Result<(), ClassError>;
}

pub trait MethodVisitor
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>;

    /// Closes the region. `trailer` is None for abstract and native methods,
    /// which never see any ops.
    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>;
}

impl<T: ClassVisitor + ?Sized> ClassVisitor for &mut T
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        (**self).visit(header)
    }

    fn visit_method<'a>(&'a mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'a>, ClassError>
    {
        (**self).visit_method(header)
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        (**self).visit_end()
    }
}

impl<T: ClassVisitor + ?Sized> ClassVisitor for Box<T>
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        (**self).visit(header)
    }

    fn visit_method<'a>(&'a mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'a>, ClassError>
    {
        (**self).visit_method(header)
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        (**self).visit_end()
    }
}

/// A method visitor that forwards every event unchanged. Stages return it for
/// methods they do not touch.
pub struct ForwardingMethodVisitor<'a>
{
    next: Box<dyn MethodVisitor + 'a>,
}

impl<'a> ForwardingMethodVisitor<'a>
{
    pub fn new(next: Box<dyn MethodVisitor + 'a>) -> Box<dyn MethodVisitor + 'a>
    {
        Box::new(ForwardingMethodVisitor { next })
    }
}

impl MethodVisitor for ForwardingMethodVisitor<'_>
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>
    {
        self.next.visit_op(op)
    }

    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        self.next.visit_end(trailer)
    }
}

/// Buffers synthetic instructions so they land after the labels, lines and
/// frames preceding the next original instruction, which makes every branch,
/// handler and line entry that pointed at that instruction point at the
/// synthetic code instead.
#[derive(Debug, Default)]
pub struct InsertionPoint
{
    pending: Vec<CodeOp>,
}

impl InsertionPoint
{
    /// Queues `ops` to be emitted right before the next instruction
    pub fn before_next_insn(&mut self, ops: impl IntoIterator<Item = CodeOp>)
    {
        self.pending.extend(ops);
    }

    pub fn is_empty(&self) -> bool
    {
        self.pending.is_empty()
    }

    /// Forwards `op`, flushing queued ops first when `op` is an instruction
    pub fn forward(&mut self, op: CodeOp, next: &mut (dyn MethodVisitor + '_)) -> Result<(), ClassError>
    {
        if matches!(op, CodeOp::Insn(_))
        {
            for pending in self.pending.drain(..)
            {
                next.visit_op(pending)?;
            }
        }
        next.visit_op(op)
    }
}
