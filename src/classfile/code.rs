//! Decoding of the `Code` attribute into a symbolic op stream, and assembly back.
//!
//! Branch targets, exception ranges, local variable ranges and stack map frames
//! are all expressed through [`Label`]s, so instructions can be inserted
//! anywhere and every offset is recomputed on assembly.

use crate::classfile::constant_pool::{ConstantPool, CpInfo, MemberRef};
use crate::classfile::error::ClassError;
use crate::classfile::opcodes::{self, OperandFormat};
use crate::classfile::stack_map::{read_frames, write_frames, StackFrame, StackMapKind, CLDC_STACK_MAP, STACK_MAP_TABLE};
use crate::classfile::{read_i4, read_u1, read_u2, read_u4, read_x, write_i4, write_u1, write_u2, write_u4, write_x, RawAttribute};
use crate::types::MethodDescriptor;
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

pub const CODE: &str = "Code";
pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";

const MAX_CODE_LENGTH: usize = 65535;

/// A position in a method's code, bound by a [`CodeOp::Label`] event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "L{}", self.0)
    }
}

/// One JVM instruction with symbolic branch targets.
///
/// Instructions read from a class carry their original constant pool indices;
/// synthetic ones carry names and are interned when the method is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insn
{
    /// Any instruction without branch targets, operands kept verbatim. `wide` is
    /// stored with the widened opcode as its first operand byte.
    Plain { opcode: u8, operands: Vec<u8> },
    /// `new`, with a site label that `Uninitialized` frame entries refer to
    New { cp_index: u16, site: Option<Label> },
    Invoke { opcode: u8, cp_index: Option<u16>, method: MemberRef, interface: bool },
    Jump { opcode: u8, target: Label },
    TableSwitch { default: Label, low: i32, high: i32, targets: Vec<Label> },
    LookupSwitch { default: Label, pairs: Vec<(i32, Label)> },
    /// Synthetic string constant, assembled as `ldc` or `ldc_w`
    PushString(String),
    /// Synthetic int constant, assembled with the shortest encoding
    PushInt(i32),
}

impl Insn
{
    pub fn invoke_static(method: MemberRef) -> Insn
    {
        Insn::Invoke { opcode: opcodes::INVOKESTATIC, cp_index: None, method, interface: false }
    }

    pub fn load_reference(slot: u8) -> Insn
    {
        match slot
        {
            0..=3 => Insn::Plain { opcode: opcodes::ALOAD_0 + slot, operands: vec![] },
            _ => Insn::Plain { opcode: 0x19, operands: vec![slot] },
        }
    }

    pub fn opcode(&self) -> u8
    {
        match self
        {
            Insn::Plain { opcode, .. } | Insn::Invoke { opcode, .. } | Insn::Jump { opcode, .. } => *opcode,
            Insn::New { .. } => opcodes::NEW,
            Insn::TableSwitch { .. } => opcodes::TABLESWITCH,
            Insn::LookupSwitch { .. } => opcodes::LOOKUPSWITCH,
            Insn::PushString(_) => opcodes::LDC,
            Insn::PushInt(_) => opcodes::SIPUSH,
        }
    }

    pub fn is_return(&self) -> bool
    {
        matches!(self, Insn::Plain { opcode, .. } if (opcodes::IRETURN..=opcodes::RETURN).contains(opcode))
    }

    /// True for instructions made up by a stage rather than read from a class
    pub fn is_synthetic(&self) -> bool
    {
        matches!(self, Insn::PushString(_) | Insn::PushInt(_) | Insn::Invoke { cp_index: None, .. })
    }
}

impl fmt::Display for Insn
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Insn::Plain { opcode, operands } if operands.is_empty() => write!(f, "{}", opcodes::name(*opcode)),
            Insn::Plain { opcode, operands } => write!(f, "{} {:02x?}", opcodes::name(*opcode), operands),
            Insn::New { cp_index, .. } => write!(f, "new #{}", cp_index),
            Insn::Invoke { opcode, method, .. } => write!(f, "{} {}", opcodes::name(*opcode), method),
            Insn::Jump { opcode, target } => write!(f, "{} {}", opcodes::name(*opcode), target),
            Insn::TableSwitch { low, high, .. } => write!(f, "tableswitch {}..{}", low, high),
            Insn::LookupSwitch { pairs, .. } => write!(f, "lookupswitch [{}]", pairs.len()),
            Insn::PushString(s) => write!(f, "ldc {:?}", s),
            Insn::PushInt(i) => write!(f, "push {}", i),
        }
    }
}

/// The events that make up a method body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOp
{
    Label(Label),
    Line(u16),
    Frame(StackFrame),
    Insn(Insn),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock
{
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// Class entry of the caught type, 0 for finally blocks
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable
{
    pub start: Label,
    pub end: Label,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

/// Code attributes in their original order, each with the pool index of its
/// name. The contents of line number and stack map tables travel in the op
/// stream instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAttributeSlot
{
    LineNumbers { name_index: u16 },
    StackMap { name_index: u16, kind: StackMapKind },
    LocalVariables { name_index: u16, entries: Vec<LocalVariable> },
    Other(RawAttribute),
}

/// Everything about a method body that is not an op
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTrailer
{
    pub max_stack: u16,
    pub max_locals: u16,
    pub try_catch: Vec<TryCatchBlock>,
    pub attributes: Vec<CodeAttributeSlot>,
    /// Length of the code as read, None for synthetic code
    pub original_length: Option<u32>,
}

impl CodeTrailer
{
    pub fn new(max_stack: u16, max_locals: u16) -> CodeTrailer
    {
        CodeTrailer { max_stack, max_locals, try_catch: vec![], attributes: vec![], original_length: None }
    }
}

/// A decoded method body: its ops plus the trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCode
{
    pub ops: Vec<CodeOp>,
    pub trailer: CodeTrailer,
}

struct Decoded
{
    pc: u32,
    opcode: u8,
    operands: Vec<u8>,
    targets: Vec<u32>,
}

fn switch_padding(pc: u32) -> u32
{
    (4 - (pc + 1) % 4) % 4
}

fn decode_instructions(code: &[u8]) -> Result<Vec<Decoded>, ClassError>
{
    let mut out = vec![];
    let mut ix = 0usize;
    while ix < code.len()
    {
        let pc = ix as u32;
        let opcode = read_u1(code, &mut ix)?;
        let Some(op) = opcodes::opcode(opcode) else {
            fail!("Invalid opcode 0x{:02x} at pc {}", opcode, pc);
        };
        let mut targets = vec![];
        let operands = match op.format
        {
            OperandFormat::TableSwitch => {
                let start = ix;
                ix += switch_padding(pc) as usize;
                let default = read_i4(code, &mut ix)?;
                let low = read_i4(code, &mut ix)?;
                let high = read_i4(code, &mut ix)?;
                if high < low
                {
                    fail!("tableswitch at pc {} has high {} below low {}", pc, high, low);
                }
                targets.push(pc.wrapping_add(default as u32));
                for _ in low..=high { targets.push(pc.wrapping_add(read_i4(code, &mut ix)? as u32)); }
                code[start..ix].to_vec()
            }
            OperandFormat::LookupSwitch => {
                let start = ix;
                ix += switch_padding(pc) as usize;
                let default = read_i4(code, &mut ix)?;
                let npairs = read_i4(code, &mut ix)?;
                if npairs < 0
                {
                    fail!("lookupswitch at pc {} has negative npairs", pc);
                }
                targets.push(pc.wrapping_add(default as u32));
                for _ in 0..npairs
                {
                    read_i4(code, &mut ix)?;
                    targets.push(pc.wrapping_add(read_i4(code, &mut ix)? as u32));
                }
                code[start..ix].to_vec()
            }
            OperandFormat::Wide => {
                let widened = read_u1(code, &mut ix)?;
                let len = match opcodes::opcode(widened).map(|o| o.format)
                {
                    Some(OperandFormat::Local) => 2,
                    Some(OperandFormat::Iinc) => 4,
                    _ => fail!("wide applied to 0x{:02x} at pc {}", widened, pc),
                };
                let mut v = vec![widened];
                v.extend(read_x(code, &mut ix, len)?);
                v
            }
            OperandFormat::Branch2 => {
                let v = read_x(code, &mut ix, 2)?;
                let offset = i16::from_be_bytes([v[0], v[1]]) as i32;
                targets.push(pc.wrapping_add(offset as u32));
                v
            }
            OperandFormat::Branch4 => {
                let v = read_x(code, &mut ix, 4)?;
                let offset = i32::from_be_bytes([v[0], v[1], v[2], v[3]]);
                targets.push(pc.wrapping_add(offset as u32));
                v
            }
            format => {
                let len = format.fixed_len().unwrap_or(0);
                read_x(code, &mut ix, len)?
            }
        };
        out.push(Decoded { pc, opcode, operands, targets });
    }
    Ok(out)
}

fn cp_operand(operands: &[u8]) -> u16
{
    ((operands[0] as u16) << 8) | operands[1] as u16
}

/// Decodes a `Code` attribute body.
pub fn decode(info: &[u8], pool: &ConstantPool) -> Result<MethodCode, ClassError>
{
    let mut ix = 0;
    let bytes = info;
    let max_stack = read_u2(bytes, &mut ix)?;
    let max_locals = read_u2(bytes, &mut ix)?;
    let code_length = read_u4(bytes, &mut ix)? as usize;
    if code_length == 0 || code_length > MAX_CODE_LENGTH
    {
        fail!("Invalid code length {}", code_length);
    }
    let code = read_x(bytes, &mut ix, code_length)?;
    let end_pc = code_length as u32;

    let mut raw_try_catch = vec![];
    let exception_table_length = read_u2(bytes, &mut ix)?;
    for _ in 0..exception_table_length
    {
        raw_try_catch.push((read_u2(bytes, &mut ix)? as u32, read_u2(bytes, &mut ix)? as u32, read_u2(bytes, &mut ix)? as u32, read_u2(bytes, &mut ix)?));
    }
    let raw_attributes = RawAttribute::read_list(bytes, &mut ix)?;
    if ix != bytes.len()
    {
        fail!("{} trailing bytes in Code attribute", bytes.len() - ix);
    }

    let instructions = decode_instructions(&code)?;
    let boundaries: BTreeSet<u32> = instructions.iter().map(|i| i.pc).collect();
    let is_boundary = |pc: u32| boundaries.contains(&pc);
    let is_boundary_or_end = |pc: u32| pc == end_pc || boundaries.contains(&pc);

    // Every pc that something points at gets a label
    let mut label_pcs: BTreeSet<u32> = BTreeSet::new();
    for i in &instructions
    {
        for t in &i.targets
        {
            if !is_boundary(*t)
            {
                fail!("Branch at pc {} targets {} which is not an instruction", i.pc, t);
            }
            label_pcs.insert(*t);
        }
    }
    for (start, end, handler, _) in &raw_try_catch
    {
        if !is_boundary(*start) || !is_boundary_or_end(*end) || !is_boundary(*handler) || start >= end
        {
            fail!("Exception table entry [{}, {}) -> {} is out of bounds", start, end, handler);
        }
        label_pcs.extend([*start, *end, *handler]);
    }

    let mut lines: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
    let mut frames: Vec<(u32, StackFrame)> = vec![];
    let mut slots = vec![];
    let mut local_tables = vec![];
    let mut has_lines = false;
    let mut has_stack_map = false;
    let new_pcs: BTreeSet<u32> = instructions.iter().filter(|i| i.opcode == opcodes::NEW).map(|i| i.pc).collect();
    let mut new_sites: BTreeSet<u32> = BTreeSet::new();

    for a in raw_attributes
    {
        let name = pool.utf8(a.name_index)?;
        match name
        {
            LINE_NUMBER_TABLE => {
                let mut j = 0;
                let count = read_u2(&a.info, &mut j)?;
                for _ in 0..count
                {
                    let pc = read_u2(&a.info, &mut j)? as u32;
                    let line = read_u2(&a.info, &mut j)?;
                    if !is_boundary(pc)
                    {
                        fail!("Line number entry at pc {} is not an instruction", pc);
                    }
                    lines.entry(pc).or_default().push(line);
                }
                if !has_lines
                {
                    slots.push(Some(CodeAttributeSlot::LineNumbers { name_index: a.name_index }));
                    has_lines = true;
                }
            }
            STACK_MAP_TABLE | CLDC_STACK_MAP => {
                if has_stack_map
                {
                    fail!("More than one stack map attribute");
                }
                has_stack_map = true;
                let kind = if name == STACK_MAP_TABLE { StackMapKind::Table } else { StackMapKind::Cldc };
                let mut site = |offset: u16| {
                    let pc = offset as u32;
                    if !new_pcs.contains(&pc)
                    {
                        fail!("Uninitialized entry refers to pc {} which is not a new instruction", pc);
                    }
                    new_sites.insert(pc);
                    Ok(Label(pc))
                };
                frames = read_frames(&a.info, kind, &mut site)
                    .map_err(|e| ClassError::with_context(e, kind.attribute_name().to_string()))?;
                for (pc, _) in &frames
                {
                    if !is_boundary(*pc)
                    {
                        fail!("Stack map frame at pc {} is not an instruction", pc);
                    }
                }
                slots.push(Some(CodeAttributeSlot::StackMap { name_index: a.name_index, kind }));
            }
            LOCAL_VARIABLE_TABLE | LOCAL_VARIABLE_TYPE_TABLE => {
                let mut j = 0;
                let count = read_u2(&a.info, &mut j)?;
                let mut entries = vec![];
                for _ in 0..count
                {
                    let start = read_u2(&a.info, &mut j)? as u32;
                    let length = read_u2(&a.info, &mut j)? as u32;
                    let name_index = read_u2(&a.info, &mut j)?;
                    let descriptor_index = read_u2(&a.info, &mut j)?;
                    let index = read_u2(&a.info, &mut j)?;
                    if !is_boundary(start) || !is_boundary_or_end(start + length)
                    {
                        fail!("Local variable range [{}, {}) is out of bounds", start, start + length);
                    }
                    label_pcs.insert(start);
                    label_pcs.insert(start + length);
                    entries.push((start, start + length, name_index, descriptor_index, index));
                }
                local_tables.push((slots.len(), a.name_index, entries));
                slots.push(None);
            }
            _ => slots.push(Some(CodeAttributeSlot::Other(a))),
        }
    }

    // Labels are numbered by pc; new sites reuse their pc in a separate range
    let labels: HashMap<u32, Label> = label_pcs.iter().enumerate().map(|(i, pc)| (*pc, Label(i as u32))).collect();
    let site_base = labels.len() as u32;
    let site_labels: HashMap<u32, Label> = new_sites.iter().enumerate().map(|(i, pc)| (*pc, Label(site_base + i as u32))).collect();
    let label_at = |pc: u32| labels[&pc];
    for (_, frame) in frames.iter_mut()
    {
        relabel_sites(frame, &site_labels);
    }

    // Local variable slots were left empty until labels existed
    let mut local_tables: HashMap<usize, (u16, Vec<(u32, u32, u16, u16, u16)>)> =
        local_tables.into_iter().map(|(position, name_index, entries)| (position, (name_index, entries))).collect();
    let mut attributes = vec![];
    for (i, slot) in slots.into_iter().enumerate()
    {
        if let Some(s) = slot
        {
            attributes.push(s);
        }
        else if let Some((name_index, entries)) = local_tables.remove(&i)
        {
            let entries = entries.into_iter().map(|(s, e, name_index, descriptor_index, index)| LocalVariable {
                start: label_at(s),
                end: label_at(e),
                name_index,
                descriptor_index,
                index,
            }).collect();
            attributes.push(CodeAttributeSlot::LocalVariables { name_index, entries });
        }
    }

    let try_catch = raw_try_catch.into_iter().map(|(start, end, handler, catch_type)| TryCatchBlock {
        start: label_at(start),
        end: label_at(end),
        handler: label_at(handler),
        catch_type,
    }).collect();

    let mut frames_at: HashMap<u32, StackFrame> = HashMap::new();
    for (pc, frame) in frames
    {
        if frames_at.insert(pc, frame).is_some()
        {
            fail!("Two stack map frames at pc {}", pc);
        }
    }

    let mut ops = Vec::with_capacity(instructions.len() * 2);
    for i in instructions
    {
        if let Some(l) = labels.get(&i.pc)
        {
            ops.push(CodeOp::Label(*l));
        }
        if let Some(ls) = lines.get(&i.pc)
        {
            for line in ls { ops.push(CodeOp::Line(*line)); }
        }
        if let Some(frame) = frames_at.remove(&i.pc)
        {
            ops.push(CodeOp::Frame(frame));
        }
        ops.push(CodeOp::Insn(to_insn(i, pool, &labels, &site_labels)?));
    }
    if let Some(l) = labels.get(&end_pc)
    {
        ops.push(CodeOp::Label(*l));
    }

    Ok(MethodCode {
        ops,
        trailer: CodeTrailer { max_stack, max_locals, try_catch, attributes, original_length: Some(end_pc) },
    })
}

fn relabel_sites(frame: &mut StackFrame, sites: &HashMap<u32, Label>)
{
    use crate::classfile::stack_map::VerificationType;
    let fix = |t: &mut VerificationType| {
        if let VerificationType::Uninitialized(l) = t
        {
            *l = sites[&l.0];
        }
    };
    match frame
    {
        StackFrame::SameLocals1StackItem { stack, .. } => fix(stack),
        StackFrame::Append { locals } => locals.iter_mut().for_each(fix),
        StackFrame::Full { locals, stack } => locals.iter_mut().chain(stack.iter_mut()).for_each(fix),
        StackFrame::Same { .. } | StackFrame::Chop { .. } => {}
    }
}

fn to_insn(i: Decoded, pool: &ConstantPool, labels: &HashMap<u32, Label>, sites: &HashMap<u32, Label>) -> Result<Insn, ClassError>
{
    let op = opcodes::opcode(i.opcode).ok_or_else(|| err!("Invalid opcode 0x{:02x}", i.opcode))?;
    Ok(match op.format
    {
        OperandFormat::TableSwitch => {
            let mut ix = switch_padding(i.pc) as usize + 4;
            let low = read_i4(&i.operands, &mut ix)?;
            let high = read_i4(&i.operands, &mut ix)?;
            let default = labels[&i.targets[0]];
            let targets = i.targets[1..].iter().map(|t| labels[t]).collect();
            Insn::TableSwitch { default, low, high, targets }
        }
        OperandFormat::LookupSwitch => {
            let mut ix = switch_padding(i.pc) as usize + 8;
            let mut pairs = vec![];
            for t in &i.targets[1..]
            {
                let key = read_i4(&i.operands, &mut ix)?;
                ix += 4;
                pairs.push((key, labels[t]));
            }
            Insn::LookupSwitch { default: labels[&i.targets[0]], pairs }
        }
        OperandFormat::Branch2 | OperandFormat::Branch4 => Insn::Jump { opcode: i.opcode, target: labels[&i.targets[0]] },
        _ if i.opcode == opcodes::NEW => Insn::New { cp_index: cp_operand(&i.operands), site: sites.get(&i.pc).copied() },
        _ if op.is_invoke() => {
            let cp_index = cp_operand(&i.operands);
            let interface = matches!(pool.get(cp_index)?, CpInfo::InterfaceMethodref { .. });
            let method = pool.member_ref(cp_index)
                .map_err(|e| ClassError::with_context(e, format!("{} at pc {}", op.name, i.pc)))?;
            Insn::Invoke { opcode: i.opcode, cp_index: Some(cp_index), method, interface }
        }
        _ => Insn::Plain { opcode: i.opcode, operands: i.operands },
    })
}

struct Layout
{
    labels: HashMap<Label, u32>,
    offsets: Vec<u32>,
    length: u32,
}

fn insn_size(insn: &Insn, pc: u32, pool: &mut ConstantPool) -> Result<u32, ClassError>
{
    Ok(match insn
    {
        Insn::Plain { operands, .. } => 1 + operands.len() as u32,
        Insn::New { .. } => 3,
        Insn::Invoke { opcode, .. } if *opcode == opcodes::INVOKEINTERFACE => 5,
        Insn::Invoke { .. } => 3,
        Insn::Jump { opcode, .. } => match opcodes::opcode(*opcode).map(|o| o.format)
        {
            Some(OperandFormat::Branch4) => 5,
            _ => 3,
        },
        Insn::TableSwitch { targets, .. } => 1 + switch_padding(pc) + 12 + 4 * targets.len() as u32,
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len() as u32,
        Insn::PushString(s) => if pool.add_string(s)? <= u8::MAX as u16 { 2 } else { 3 },
        Insn::PushInt(v) => match *v
        {
            -1..=5 => 1,
            -128..=127 => 2,
            -32768..=32767 => 3,
            _ => if pool.add_integer(*v)? <= u8::MAX as u16 { 2 } else { 3 },
        },
    })
}

fn layout(ops: &[CodeOp], pool: &mut ConstantPool) -> Result<Layout, ClassError>
{
    let mut labels = HashMap::new();
    let mut offsets = vec![];
    let mut pc = 0u32;
    for op in ops
    {
        match op
        {
            CodeOp::Label(l) => {
                if labels.insert(*l, pc).is_some()
                {
                    fail!("Label {} bound twice", l);
                }
            }
            CodeOp::Insn(insn) => {
                if let Insn::New { site: Some(site), .. } = insn
                {
                    labels.insert(*site, pc);
                }
                offsets.push(pc);
                pc += insn_size(insn, pc, pool)?;
            }
            CodeOp::Line(_) | CodeOp::Frame(_) => {}
        }
    }
    if pc as usize > MAX_CODE_LENGTH
    {
        return Err(err!(Unsupported, "method code grew to {} bytes", pc));
    }
    Ok(Layout { labels, offsets, length: pc })
}

fn label_offset(labels: &HashMap<Label, u32>, label: Label) -> Result<u32, ClassError>
{
    labels.get(&label).copied().ok_or_else(|| err!("Label {} is never bound", label))
}

fn branch_offset2(pc: u32, target: u32) -> Result<[u8; 2], ClassError>
{
    let delta = target as i64 - pc as i64;
    if delta < i16::MIN as i64 || delta > i16::MAX as i64
    {
        return Err(err!(Unsupported, "branch at pc {} to {} no longer fits in 16 bits", pc, target));
    }
    Ok((delta as i16).to_be_bytes())
}

fn encode_insn(insn: &Insn, pc: u32, labels: &HashMap<Label, u32>, pool: &mut ConstantPool, out: &mut Vec<u8>) -> Result<(), ClassError>
{
    let target = |l: &Label| label_offset(labels, *l);
    match insn
    {
        Insn::Plain { opcode, operands } => {
            write_u1(out, *opcode);
            write_x(out, operands);
        }
        Insn::New { cp_index, .. } => {
            write_u1(out, opcodes::NEW);
            write_u2(out, *cp_index);
        }
        Insn::Invoke { opcode, cp_index, method, interface } => {
            let index = match cp_index
            {
                Some(i) => *i,
                None => pool.add_method_ref(method, *interface)?,
            };
            write_u1(out, *opcode);
            write_u2(out, index);
            if *opcode == opcodes::INVOKEINTERFACE
            {
                let descriptor = MethodDescriptor::from_descriptor(&method.descriptor)?;
                write_u1(out, descriptor.argument_slots() as u8 + 1);
                write_u1(out, 0);
            }
        }
        Insn::Jump { opcode, target: l } => {
            let t = target(l)?;
            write_u1(out, *opcode);
            match opcodes::opcode(*opcode).map(|o| o.format)
            {
                Some(OperandFormat::Branch4) => { write_i4(out, t as i32 - pc as i32); }
                _ => { write_x(out, &branch_offset2(pc, t)?); }
            }
        }
        Insn::TableSwitch { default, low, high, targets } => {
            write_u1(out, opcodes::TABLESWITCH);
            for _ in 0..switch_padding(pc) { write_u1(out, 0); }
            write_i4(out, target(default)? as i32 - pc as i32);
            write_i4(out, *low);
            write_i4(out, *high);
            for l in targets { write_i4(out, target(l)? as i32 - pc as i32); }
        }
        Insn::LookupSwitch { default, pairs } => {
            write_u1(out, opcodes::LOOKUPSWITCH);
            for _ in 0..switch_padding(pc) { write_u1(out, 0); }
            write_i4(out, target(default)? as i32 - pc as i32);
            write_i4(out, pairs.len() as i32);
            for (key, l) in pairs
            {
                write_i4(out, *key);
                write_i4(out, target(l)? as i32 - pc as i32);
            }
        }
        Insn::PushString(s) => {
            let index = pool.add_string(s)?;
            push_constant(out, index);
        }
        Insn::PushInt(v) => match *v
        {
            -1..=5 => { write_u1(out, (opcodes::ICONST_0 as i32 + *v) as u8); }
            -128..=127 => {
                write_u1(out, opcodes::BIPUSH);
                write_u1(out, *v as i8 as u8);
            }
            -32768..=32767 => {
                write_u1(out, opcodes::SIPUSH);
                write_x(out, &(*v as i16).to_be_bytes());
            }
            _ => {
                let index = pool.add_integer(*v)?;
                push_constant(out, index);
            }
        },
    }
    Ok(())
}

fn push_constant(out: &mut Vec<u8>, index: u16)
{
    if index <= u8::MAX as u16
    {
        write_u1(out, opcodes::LDC);
        write_u1(out, index as u8);
    }
    else
    {
        write_u1(out, opcodes::LDC_W);
        write_u2(out, index);
    }
}

/// Assembles ops and trailer into a `Code` attribute body, interning any
/// constants the synthetic instructions need.
pub fn assemble(ops: &[CodeOp], trailer: &CodeTrailer, pool: &mut ConstantPool) -> Result<Vec<u8>, ClassError>
{
    let layout = layout(ops, pool)?;
    let labels = &layout.labels;

    let mut code = Vec::with_capacity(layout.length as usize);
    let mut lines: Vec<(u32, u16)> = vec![];
    let mut frames: Vec<(u32, StackFrame)> = vec![];
    let mut insn_ix = 0;
    let mut pc = 0u32;
    for op in ops
    {
        match op
        {
            CodeOp::Label(_) => {}
            CodeOp::Line(line) => lines.push((pc, *line)),
            CodeOp::Frame(frame) => frames.push((pc, frame.clone())),
            CodeOp::Insn(insn) => {
                pc = layout.offsets[insn_ix];
                insn_ix += 1;
                encode_insn(insn, pc, labels, pool, &mut code)?;
                pc = code.len() as u32;
            }
        }
    }
    if code.len() as u32 != layout.length
    {
        fail!("Assembled {} bytes but laid out {}", code.len(), layout.length);
    }

    if let Some(original) = trailer.original_length
    {
        if original != layout.length && trailer.attributes.iter().any(|a| matches!(a, CodeAttributeSlot::Other(_)))
        {
            warn!("code attribute copied verbatim although code moved from {} to {} bytes", original, layout.length);
        }
    }

    let mut slots = trailer.attributes.clone();
    if !lines.is_empty() && !slots.iter().any(|s| matches!(s, CodeAttributeSlot::LineNumbers { .. }))
    {
        slots.push(CodeAttributeSlot::LineNumbers { name_index: pool.add_utf8(LINE_NUMBER_TABLE)? });
    }
    if !frames.is_empty() && !slots.iter().any(|s| matches!(s, CodeAttributeSlot::StackMap { .. }))
    {
        let kind = StackMapKind::Table;
        slots.push(CodeAttributeSlot::StackMap { name_index: pool.add_utf8(kind.attribute_name())?, kind });
    }

    let mut attributes = vec![];
    for slot in &slots
    {
        match slot
        {
            CodeAttributeSlot::LineNumbers { name_index } => {
                let mut info = vec![];
                write_u2(&mut info, lines.len() as u16);
                for (pc, line) in &lines
                {
                    write_u2(&mut info, *pc as u16);
                    write_u2(&mut info, *line);
                }
                attributes.push(RawAttribute { name_index: *name_index, info });
            }
            CodeAttributeSlot::StackMap { name_index, kind } => {
                let info = write_frames(&frames, *kind, &|l| label_offset(labels, l))?;
                attributes.push(RawAttribute { name_index: *name_index, info });
            }
            CodeAttributeSlot::LocalVariables { name_index, entries } => {
                let mut info = vec![];
                write_u2(&mut info, entries.len() as u16);
                for e in entries
                {
                    let start = label_offset(labels, e.start)?;
                    let end = label_offset(labels, e.end)?;
                    write_u2(&mut info, start as u16);
                    write_u2(&mut info, (end - start) as u16);
                    write_u2(&mut info, e.name_index);
                    write_u2(&mut info, e.descriptor_index);
                    write_u2(&mut info, e.index);
                }
                attributes.push(RawAttribute { name_index: *name_index, info });
            }
            CodeAttributeSlot::Other(raw) => attributes.push(raw.clone()),
        }
    }

    let mut info = vec![];
    write_u2(&mut info, trailer.max_stack);
    write_u2(&mut info, trailer.max_locals);
    write_u4(&mut info, code.len() as u32);
    write_x(&mut info, &code);
    write_u2(&mut info, trailer.try_catch.len() as u16);
    for t in &trailer.try_catch
    {
        write_u2(&mut info, label_offset(labels, t.start)? as u16);
        write_u2(&mut info, label_offset(labels, t.end)? as u16);
        write_u2(&mut info, label_offset(labels, t.handler)? as u16);
        write_u2(&mut info, t.catch_type);
    }
    RawAttribute::write_list(&attributes, &mut info);
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::error::ErrorKind;

    // iconst_0; ifeq L; iconst_1; ireturn; L: iconst_2; ireturn
    fn branchy_method(pool: &mut ConstantPool) -> Vec<u8> {
        let lnt = pool.add_utf8(LINE_NUMBER_TABLE).unwrap();
        let mut info = vec![];
        write_u2(&mut info, 1);
        write_u2(&mut info, 1);
        let code = [0x03, 0x99, 0x00, 0x05, 0x04, 0xac, 0x05, 0xac];
        write_u4(&mut info, code.len() as u32);
        write_x(&mut info, &code);
        write_u2(&mut info, 0);
        write_u2(&mut info, 1);
        write_u2(&mut info, lnt);
        write_u4(&mut info, 10);
        write_x(&mut info, &[0, 2, 0, 0, 0, 10, 0, 6, 0, 12]);
        info
    }

    #[test]
    fn decode_assemble_is_identity() {
        let mut pool = ConstantPool::new();
        let info = branchy_method(&mut pool);
        let code = decode(&info, &pool).unwrap();
        assert_eq!(code.ops[0], CodeOp::Line(10));
        assert!(code.ops.contains(&CodeOp::Label(Label(0))));
        let count = pool.count();
        let again = assemble(&code.ops, &code.trailer, &mut pool).unwrap();
        assert_eq!(again, info);
        assert_eq!(pool.count(), count);
    }

    #[test]
    fn insertion_moves_branch_targets_and_lines() {
        let mut pool = ConstantPool::new();
        let info = branchy_method(&mut pool);
        let mut code = decode(&info, &pool).unwrap();
        let at = code.ops.iter().position(|op| *op == CodeOp::Insn(Insn::Plain { opcode: 0x04, operands: vec![] })).unwrap();
        code.ops.insert(at, CodeOp::Insn(Insn::Plain { opcode: 0x57, operands: vec![] }));
        code.ops.insert(at, CodeOp::Insn(Insn::PushInt(300)));
        let out = assemble(&code.ops, &code.trailer, &mut pool).unwrap();
        let again = decode(&out, &pool).unwrap();
        let mut ix = 4;
        assert_eq!(read_u4(&out, &mut ix).unwrap(), 12);
        assert_eq!(&out[8..12], &[0x03, 0x99, 0x00, 0x09]);
        assert_eq!(&out[12..16], &[0x11, 0x01, 0x2c, 0x57]);
        let lines: Vec<_> = again.ops.iter().filter(|op| matches!(op, CodeOp::Line(_))).collect();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn overflowing_short_branch_is_unsupported() {
        let mut pool = ConstantPool::new();
        let info = branchy_method(&mut pool);
        let mut code = decode(&info, &pool).unwrap();
        let at = code.ops.iter().position(|op| *op == CodeOp::Insn(Insn::Plain { opcode: 0x04, operands: vec![] })).unwrap();
        let nops = std::iter::repeat(CodeOp::Insn(Insn::Plain { opcode: 0x00, operands: vec![] })).take(33000);
        code.ops.splice(at..at, nops);
        let e = assemble(&code.ops, &code.trailer, &mut pool).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn branch_into_operand_is_malformed() {
        let pool = ConstantPool::new();
        let mut info = vec![];
        write_u2(&mut info, 1);
        write_u2(&mut info, 1);
        let code = [0x03, 0x99, 0x00, 0x01, 0xb1];
        write_u4(&mut info, code.len() as u32);
        write_x(&mut info, &code);
        write_u2(&mut info, 0);
        write_u2(&mut info, 0);
        assert_eq!(decode(&info, &pool).unwrap_err().kind(), ErrorKind::Malformed);
    }

    #[test]
    fn small_constants_pick_short_encodings() {
        let mut pool = ConstantPool::new();
        let ops = vec![
            CodeOp::Insn(Insn::PushInt(-1)),
            CodeOp::Insn(Insn::PushInt(100)),
            CodeOp::Insn(Insn::PushString("run".to_string())),
            CodeOp::Insn(Insn::Plain { opcode: opcodes::RETURN, operands: vec![] }),
        ];
        let out = assemble(&ops, &CodeTrailer::new(3, 0), &mut pool).unwrap();
        let string = pool.add_string("run").unwrap() as u8;
        assert_eq!(&out[8..15], &[0x02, 0x10, 100, 0x12, string, 0xb1, 0x00]);
    }
}
