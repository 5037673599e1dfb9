//! Stack map frames, in both the Java 6 `StackMapTable` encoding and the
//! CLDC preverifier's `StackMap` encoding.
//!
//! Frames are decoded to absolute offsets so that code can be moved underneath
//! them; `Uninitialized` entries point at the `new` instruction by label rather
//! than by offset for the same reason.

use crate::classfile::code::Label;
use crate::classfile::error::ClassError;
use crate::classfile::{read_u1, read_u2, write_u1, write_u2};

pub const STACK_MAP_TABLE: &str = "StackMapTable";
pub const CLDC_STACK_MAP: &str = "StackMap";

const ITEM_TOP: u8 = 0;
const ITEM_INTEGER: u8 = 1;
const ITEM_FLOAT: u8 = 2;
const ITEM_DOUBLE: u8 = 3;
const ITEM_LONG: u8 = 4;
const ITEM_NULL: u8 = 5;
const ITEM_UNINITIALIZED_THIS: u8 = 6;
const ITEM_OBJECT: u8 = 7;
const ITEM_UNINITIALIZED: u8 = 8;

const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const SAME_FRAME_EXTENDED: u8 = 251;
const FULL_FRAME: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMapKind
{
    /// `StackMapTable`, delta encoded
    Table,
    /// CLDC `StackMap`, absolute offsets and full frames only
    Cldc,
}

impl StackMapKind
{
    pub fn attribute_name(&self) -> &'static str
    {
        match self
        {
            StackMapKind::Table => STACK_MAP_TABLE,
            StackMapKind::Cldc => CLDC_STACK_MAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType
{
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Constant pool index of a Class entry
    Object(u16),
    /// The `new` instruction that created the value
    Uninitialized(Label),
}

impl VerificationType
{
    fn read(bytes: &[u8], ix: &mut usize, new_site: &mut dyn FnMut(u16) -> Result<Label, ClassError>) -> Result<VerificationType, ClassError>
    {
        let tag = read_u1(bytes, ix)?;
        Ok(match tag
        {
            ITEM_TOP => VerificationType::Top,
            ITEM_INTEGER => VerificationType::Integer,
            ITEM_FLOAT => VerificationType::Float,
            ITEM_DOUBLE => VerificationType::Double,
            ITEM_LONG => VerificationType::Long,
            ITEM_NULL => VerificationType::Null,
            ITEM_UNINITIALIZED_THIS => VerificationType::UninitializedThis,
            ITEM_OBJECT => VerificationType::Object(read_u2(bytes, ix)?),
            ITEM_UNINITIALIZED => VerificationType::Uninitialized(new_site(read_u2(bytes, ix)?)?),
            _ => fail!("Unknown verification type tag {}", tag),
        })
    }

    fn write(&self, bytes: &mut Vec<u8>, offset_of: &dyn Fn(Label) -> Result<u32, ClassError>) -> Result<usize, ClassError>
    {
        Ok(match self
        {
            VerificationType::Top => write_u1(bytes, ITEM_TOP),
            VerificationType::Integer => write_u1(bytes, ITEM_INTEGER),
            VerificationType::Float => write_u1(bytes, ITEM_FLOAT),
            VerificationType::Double => write_u1(bytes, ITEM_DOUBLE),
            VerificationType::Long => write_u1(bytes, ITEM_LONG),
            VerificationType::Null => write_u1(bytes, ITEM_NULL),
            VerificationType::UninitializedThis => write_u1(bytes, ITEM_UNINITIALIZED_THIS),
            VerificationType::Object(index) => write_u1(bytes, ITEM_OBJECT) + write_u2(bytes, *index),
            VerificationType::Uninitialized(label) => write_u1(bytes, ITEM_UNINITIALIZED) + write_u2(bytes, offset_of(*label)? as u16),
        })
    }
}

/// One frame, keeping the compact form it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackFrame
{
    Same { extended: bool },
    SameLocals1StackItem { stack: VerificationType, extended: bool },
    Chop { k: u8 },
    Append { locals: Vec<VerificationType> },
    Full { locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

fn read_types(bytes: &[u8], ix: &mut usize, count: usize, new_site: &mut dyn FnMut(u16) -> Result<Label, ClassError>) -> Result<Vec<VerificationType>, ClassError>
{
    let mut v = Vec::with_capacity(count);
    for _ in 0..count { v.push(VerificationType::read(bytes, ix, new_site)?); }
    Ok(v)
}

fn write_types(bytes: &mut Vec<u8>, types: &[VerificationType], offset_of: &dyn Fn(Label) -> Result<u32, ClassError>) -> Result<usize, ClassError>
{
    let mut c = 0;
    for t in types { c += t.write(bytes, offset_of)?; }
    Ok(c)
}

/// Decodes a stack map attribute body into frames at absolute code offsets
pub fn read_frames(info: &[u8], kind: StackMapKind, new_site: &mut dyn FnMut(u16) -> Result<Label, ClassError>) -> Result<Vec<(u32, StackFrame)>, ClassError>
{
    let mut ix = 0;
    let bytes = info;
    let count = read_u2(bytes, &mut ix)?;
    let mut frames = Vec::with_capacity(count as usize);

    match kind
    {
        StackMapKind::Cldc => {
            for _ in 0..count
            {
                let offset = read_u2(bytes, &mut ix)? as u32;
                let nlocals = read_u2(bytes, &mut ix)? as usize;
                let locals = read_types(bytes, &mut ix, nlocals, new_site)?;
                let nstack = read_u2(bytes, &mut ix)? as usize;
                let stack = read_types(bytes, &mut ix, nstack, new_site)?;
                frames.push((offset, StackFrame::Full { locals, stack }));
            }
        }
        StackMapKind::Table => {
            let mut previous: Option<u32> = None;
            for _ in 0..count
            {
                let tag = read_u1(bytes, &mut ix)?;
                let (delta, frame) = match tag
                {
                    0..=63 => (tag as u32, StackFrame::Same { extended: false }),
                    64..=127 => {
                        let stack = VerificationType::read(bytes, &mut ix, new_site)?;
                        ((tag - 64) as u32, StackFrame::SameLocals1StackItem { stack, extended: false })
                    }
                    SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
                        let delta = read_u2(bytes, &mut ix)? as u32;
                        let stack = VerificationType::read(bytes, &mut ix, new_site)?;
                        (delta, StackFrame::SameLocals1StackItem { stack, extended: true })
                    }
                    248..=250 => (read_u2(bytes, &mut ix)? as u32, StackFrame::Chop { k: 251 - tag }),
                    SAME_FRAME_EXTENDED => (read_u2(bytes, &mut ix)? as u32, StackFrame::Same { extended: true }),
                    252..=254 => {
                        let delta = read_u2(bytes, &mut ix)? as u32;
                        let locals = read_types(bytes, &mut ix, (tag - 251) as usize, new_site)?;
                        (delta, StackFrame::Append { locals })
                    }
                    FULL_FRAME => {
                        let delta = read_u2(bytes, &mut ix)? as u32;
                        let nlocals = read_u2(bytes, &mut ix)? as usize;
                        let locals = read_types(bytes, &mut ix, nlocals, new_site)?;
                        let nstack = read_u2(bytes, &mut ix)? as usize;
                        let stack = read_types(bytes, &mut ix, nstack, new_site)?;
                        (delta, StackFrame::Full { locals, stack })
                    }
                    _ => fail!("Reserved stack map frame type {}", tag),
                };
                let offset = match previous
                {
                    None => delta,
                    Some(p) => p + delta + 1,
                };
                previous = Some(offset);
                frames.push((offset, frame));
            }
        }
    }

    if ix != bytes.len()
    {
        fail!("{} trailing bytes in {}", bytes.len() - ix, kind.attribute_name());
    }
    Ok(frames)
}

/// Encodes frames, which must be in strictly increasing offset order
pub fn write_frames(frames: &[(u32, StackFrame)], kind: StackMapKind, offset_of: &dyn Fn(Label) -> Result<u32, ClassError>) -> Result<Vec<u8>, ClassError>
{
    let mut bytes = vec![];
    write_u2(&mut bytes, frames.len() as u16);
    let mut previous: Option<u32> = None;

    for (offset, frame) in frames
    {
        let delta = match previous
        {
            None => *offset,
            Some(p) if *offset > p => offset - p - 1,
            Some(p) => fail!("Stack map frames out of order: {} after {}", offset, p),
        };
        previous = Some(*offset);
        if delta > u16::MAX as u32
        {
            return Err(err!(Unsupported, "stack map offset delta {} does not fit", delta));
        }

        match kind
        {
            StackMapKind::Cldc => {
                let StackFrame::Full { locals, stack } = frame else {
                    fail!("CLDC stack maps only hold full frames, found {:?}", frame);
                };
                write_u2(&mut bytes, *offset as u16);
                write_u2(&mut bytes, locals.len() as u16);
                write_types(&mut bytes, locals, offset_of)?;
                write_u2(&mut bytes, stack.len() as u16);
                write_types(&mut bytes, stack, offset_of)?;
            }
            StackMapKind::Table => match frame
            {
                StackFrame::Same { extended } => {
                    if !extended && delta < 64
                    {
                        write_u1(&mut bytes, delta as u8);
                    }
                    else
                    {
                        write_u1(&mut bytes, SAME_FRAME_EXTENDED);
                        write_u2(&mut bytes, delta as u16);
                    }
                }
                StackFrame::SameLocals1StackItem { stack, extended } => {
                    if !extended && delta < 64
                    {
                        write_u1(&mut bytes, 64 + delta as u8);
                    }
                    else
                    {
                        write_u1(&mut bytes, SAME_LOCALS_1_STACK_ITEM_EXTENDED);
                        write_u2(&mut bytes, delta as u16);
                    }
                    stack.write(&mut bytes, offset_of)?;
                }
                StackFrame::Chop { k } => {
                    write_u1(&mut bytes, 251 - k);
                    write_u2(&mut bytes, delta as u16);
                }
                StackFrame::Append { locals } => {
                    write_u1(&mut bytes, 251 + locals.len() as u8);
                    write_u2(&mut bytes, delta as u16);
                    write_types(&mut bytes, locals, offset_of)?;
                }
                StackFrame::Full { locals, stack } => {
                    write_u1(&mut bytes, FULL_FRAME);
                    write_u2(&mut bytes, delta as u16);
                    write_u2(&mut bytes, locals.len() as u16);
                    write_types(&mut bytes, locals, offset_of)?;
                    write_u2(&mut bytes, stack.len() as u16);
                    write_types(&mut bytes, stack, offset_of)?;
                }
            },
        }
    }
    Ok(bytes)
}
