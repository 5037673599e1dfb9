/* Class file constant pool */

use crate::classfile::error::ClassError;
use crate::classfile::{read_u1, read_u2, read_u4, read_x, write_u1, write_u2, write_u4, write_x};
use cesu8::{from_java_cesu8, to_java_cesu8};

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_INTEGER: u8 = 3;
pub const CONSTANT_FLOAT: u8 = 4;
pub const CONSTANT_LONG: u8 = 5;
pub const CONSTANT_DOUBLE: u8 = 6;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELDREF: u8 = 9;
pub const CONSTANT_METHODREF: u8 = 10;
pub const CONSTANT_INTERFACE_METHODREF: u8 = 11;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub const CONSTANT_METHOD_HANDLE: u8 = 15;
pub const CONSTANT_METHOD_TYPE: u8 = 16;
pub const CONSTANT_DYNAMIC: u8 = 17;
pub const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub const CONSTANT_MODULE: u8 = 19;
pub const CONSTANT_PACKAGE: u8 = 20;

/// A modified UTF-8 string as stored in a `CONSTANT_Utf8` entry.
///
/// Strings that do not decode are kept as raw bytes so they can be written back untouched.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum JavaString
{
    Decoded(String),
    Raw(Vec<u8>),
}

impl JavaString
{
    pub fn from_string(s: &str) -> JavaString
    {
        JavaString::Decoded(s.to_string())
    }

    pub fn as_str(&self) -> Result<&str, ClassError>
    {
        match self
        {
            JavaString::Decoded(s) => Ok(s),
            JavaString::Raw(_) => Err(ClassError::new("JavaString failed conversion")),
        }
    }

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<JavaString, ClassError>
    {
        let length = read_u2(bytes, ix)? as usize;
        let v = read_x(bytes, ix, length)?;
        Ok(match from_java_cesu8(v.as_slice())
        {
            Ok(converted_str) => JavaString::Decoded(converted_str.to_string()),
            _ => JavaString::Raw(v),
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        match self
        {
            JavaString::Raw(v) => {
                c += write_u2(bytes, v.len() as u16);
                c += write_x(bytes, v);
            }
            JavaString::Decoded(s) => {
                let encoded = to_java_cesu8(s);
                c += write_u2(bytes, encoded.len() as u16);
                c += write_x(bytes, &encoded);
            }
        }
        c
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CpInfo
{
    /// Slot 0, and the second slot of every long and double
    Unusable,
    Utf8(JavaString),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl CpInfo
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<CpInfo, ClassError>
    {
        let tag = read_u1(bytes, ix)?;
        Ok(match tag
        {
            CONSTANT_UTF8 => CpInfo::Utf8(JavaString::read(bytes, ix)?),
            CONSTANT_INTEGER => CpInfo::Integer(read_u4(bytes, ix)?),
            CONSTANT_FLOAT => CpInfo::Float(read_u4(bytes, ix)?),
            CONSTANT_LONG | CONSTANT_DOUBLE => {
                let high = read_u4(bytes, ix)? as u64;
                let low = read_u4(bytes, ix)? as u64;
                let v = (high << 32) | low;
                if tag == CONSTANT_LONG { CpInfo::Long(v) } else { CpInfo::Double(v) }
            }
            CONSTANT_CLASS => CpInfo::Class { name_index: read_u2(bytes, ix)? },
            CONSTANT_STRING => CpInfo::String { string_index: read_u2(bytes, ix)? },
            CONSTANT_FIELDREF => CpInfo::Fieldref { class_index: read_u2(bytes, ix)?, name_and_type_index: read_u2(bytes, ix)? },
            CONSTANT_METHODREF => CpInfo::Methodref { class_index: read_u2(bytes, ix)?, name_and_type_index: read_u2(bytes, ix)? },
            CONSTANT_INTERFACE_METHODREF => CpInfo::InterfaceMethodref { class_index: read_u2(bytes, ix)?, name_and_type_index: read_u2(bytes, ix)? },
            CONSTANT_NAME_AND_TYPE => CpInfo::NameAndType { name_index: read_u2(bytes, ix)?, descriptor_index: read_u2(bytes, ix)? },
            CONSTANT_METHOD_HANDLE => CpInfo::MethodHandle { reference_kind: read_u1(bytes, ix)?, reference_index: read_u2(bytes, ix)? },
            CONSTANT_METHOD_TYPE => CpInfo::MethodType { descriptor_index: read_u2(bytes, ix)? },
            CONSTANT_DYNAMIC => CpInfo::Dynamic { bootstrap_method_attr_index: read_u2(bytes, ix)?, name_and_type_index: read_u2(bytes, ix)? },
            CONSTANT_INVOKE_DYNAMIC => CpInfo::InvokeDynamic { bootstrap_method_attr_index: read_u2(bytes, ix)?, name_and_type_index: read_u2(bytes, ix)? },
            CONSTANT_MODULE => CpInfo::Module { name_index: read_u2(bytes, ix)? },
            CONSTANT_PACKAGE => CpInfo::Package { name_index: read_u2(bytes, ix)? },
            _ => fail!("Unknown constant pool tag {} at index {}", tag, *ix - 1),
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        match self
        {
            CpInfo::Unusable => {}
            CpInfo::Utf8(s) => { c += write_u1(bytes, CONSTANT_UTF8); c += s.write(bytes); }
            CpInfo::Integer(v) => { c += write_u1(bytes, CONSTANT_INTEGER); c += write_u4(bytes, *v); }
            CpInfo::Float(v) => { c += write_u1(bytes, CONSTANT_FLOAT); c += write_u4(bytes, *v); }
            CpInfo::Long(v) | CpInfo::Double(v) => {
                let tag = if matches!(self, CpInfo::Long(_)) { CONSTANT_LONG } else { CONSTANT_DOUBLE };
                c += write_u1(bytes, tag);
                c += write_u4(bytes, (*v >> 32) as u32);
                c += write_u4(bytes, *v as u32);
            }
            CpInfo::Class { name_index } => { c += write_u1(bytes, CONSTANT_CLASS); c += write_u2(bytes, *name_index); }
            CpInfo::String { string_index } => { c += write_u1(bytes, CONSTANT_STRING); c += write_u2(bytes, *string_index); }
            CpInfo::Fieldref { class_index, name_and_type_index } => {
                c += write_u1(bytes, CONSTANT_FIELDREF);
                c += write_u2(bytes, *class_index);
                c += write_u2(bytes, *name_and_type_index);
            }
            CpInfo::Methodref { class_index, name_and_type_index } => {
                c += write_u1(bytes, CONSTANT_METHODREF);
                c += write_u2(bytes, *class_index);
                c += write_u2(bytes, *name_and_type_index);
            }
            CpInfo::InterfaceMethodref { class_index, name_and_type_index } => {
                c += write_u1(bytes, CONSTANT_INTERFACE_METHODREF);
                c += write_u2(bytes, *class_index);
                c += write_u2(bytes, *name_and_type_index);
            }
            CpInfo::NameAndType { name_index, descriptor_index } => {
                c += write_u1(bytes, CONSTANT_NAME_AND_TYPE);
                c += write_u2(bytes, *name_index);
                c += write_u2(bytes, *descriptor_index);
            }
            CpInfo::MethodHandle { reference_kind, reference_index } => {
                c += write_u1(bytes, CONSTANT_METHOD_HANDLE);
                c += write_u1(bytes, *reference_kind);
                c += write_u2(bytes, *reference_index);
            }
            CpInfo::MethodType { descriptor_index } => { c += write_u1(bytes, CONSTANT_METHOD_TYPE); c += write_u2(bytes, *descriptor_index); }
            CpInfo::Dynamic { bootstrap_method_attr_index, name_and_type_index } => {
                c += write_u1(bytes, CONSTANT_DYNAMIC);
                c += write_u2(bytes, *bootstrap_method_attr_index);
                c += write_u2(bytes, *name_and_type_index);
            }
            CpInfo::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
                c += write_u1(bytes, CONSTANT_INVOKE_DYNAMIC);
                c += write_u2(bytes, *bootstrap_method_attr_index);
                c += write_u2(bytes, *name_and_type_index);
            }
            CpInfo::Module { name_index } => { c += write_u1(bytes, CONSTANT_MODULE); c += write_u2(bytes, *name_index); }
            CpInfo::Package { name_index } => { c += write_u1(bytes, CONSTANT_PACKAGE); c += write_u2(bytes, *name_index); }
        }
        c
    }

    fn is_wide(&self) -> bool
    {
        matches!(self, CpInfo::Long(_) | CpInfo::Double(_))
    }
}

/// A resolved field or method reference: owner class, member name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef
{
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef
{
    pub fn new(owner: &str, name: &str, descriptor: &str) -> MemberRef
    {
        MemberRef { owner: owner.to_string(), name: name.to_string(), descriptor: descriptor.to_string() }
    }
}

impl std::fmt::Display for MemberRef
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// The constant pool of one class.
///
/// Entries keep their original indices; new entries are only ever appended, so
/// every index in the original class stays valid after instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool
{
    entries: Vec<CpInfo>,
}

impl Default for ConstantPool
{
    fn default() -> Self
    {
        ConstantPool::new()
    }
}

impl ConstantPool
{
    pub fn new() -> ConstantPool
    {
        ConstantPool { entries: vec![CpInfo::Unusable] }
    }

    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ConstantPool, ClassError>
    {
        let count = read_u2(bytes, ix)? as usize;
        if count == 0
        {
            fail!("constant_pool_count must be at least 1");
        }
        let mut entries = Vec::with_capacity(count);
        entries.push(CpInfo::Unusable);
        while entries.len() < count
        {
            let position = entries.len();
            let entry = CpInfo::read(bytes, ix)
                .map_err(|e| ClassError::with_context(e, format!("constant pool entry #{}", position)))?;
            let wide = entry.is_wide();
            entries.push(entry);
            if wide
            {
                if entries.len() >= count
                {
                    fail!("8-byte constant at #{} overruns the pool", position);
                }
                entries.push(CpInfo::Unusable);
            }
        }
        Ok(ConstantPool { entries })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = write_u2(bytes, self.entries.len() as u16);
        for e in &self.entries[1..]
        {
            c += e.write(bytes);
        }
        c
    }

    /// The `constant_pool_count` value: one more than the highest index
    pub fn count(&self) -> usize
    {
        self.entries.len()
    }

    pub fn get(&self, index: u16) -> Result<&CpInfo, ClassError>
    {
        match self.entries.get(index as usize)
        {
            Some(CpInfo::Unusable) | None => fail!("Invalid constant pool index {}", index),
            Some(e) => Ok(e),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassError>
    {
        match self.get(index)?
        {
            CpInfo::Utf8(s) => s.as_str(),
            other => fail!("Expected Utf8 at #{}, found {:?}", index, other),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str, ClassError>
    {
        match self.get(index)?
        {
            CpInfo::Class { name_index } => self.utf8(*name_index),
            other => fail!("Expected Class at #{}, found {:?}", index, other),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassError>
    {
        match self.get(index)?
        {
            CpInfo::NameAndType { name_index, descriptor_index } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => fail!("Expected NameAndType at #{}, found {:?}", index, other),
        }
    }

    /// Resolves a Fieldref, Methodref or InterfaceMethodref entry
    pub fn member_ref(&self, index: u16) -> Result<MemberRef, ClassError>
    {
        match self.get(index)?
        {
            CpInfo::Fieldref { class_index, name_and_type_index }
            | CpInfo::Methodref { class_index, name_and_type_index }
            | CpInfo::InterfaceMethodref { class_index, name_and_type_index } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef::new(self.class_name(*class_index)?, name, descriptor))
            }
            other => fail!("Expected a member reference at #{}, found {:?}", index, other),
        }
    }

    fn find(&self, wanted: &CpInfo) -> Option<u16>
    {
        self.entries.iter().position(|e| e == wanted).map(|i| i as u16)
    }

    fn push(&mut self, entry: CpInfo) -> Result<u16, ClassError>
    {
        let wide = entry.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize
        {
            return Err(err!(Unsupported, "constant pool is full, cannot add {:?}", entry));
        }
        self.entries.push(entry);
        let index = (self.entries.len() - 1) as u16;
        if wide
        {
            self.entries.push(CpInfo::Unusable);
        }
        Ok(index)
    }

    fn intern(&mut self, entry: CpInfo) -> Result<u16, ClassError>
    {
        match self.find(&entry)
        {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16, ClassError>
    {
        self.intern(CpInfo::Utf8(JavaString::from_string(value)))
    }

    pub fn add_class(&mut self, name: &str) -> Result<u16, ClassError>
    {
        let name_index = self.add_utf8(name)?;
        self.intern(CpInfo::Class { name_index })
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16, ClassError>
    {
        let string_index = self.add_utf8(value)?;
        self.intern(CpInfo::String { string_index })
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16, ClassError>
    {
        self.intern(CpInfo::Integer(value as u32))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassError>
    {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(CpInfo::NameAndType { name_index, descriptor_index })
    }

    pub fn add_method_ref(&mut self, method: &MemberRef, interface: bool) -> Result<u16, ClassError>
    {
        let class_index = self.add_class(&method.owner)?;
        let name_and_type_index = self.add_name_and_type(&method.name, &method.descriptor)?;
        if interface
        {
            self.intern(CpInfo::InterfaceMethodref { class_index, name_and_type_index })
        }
        else
        {
            self.intern(CpInfo::Methodref { class_index, name_and_type_index })
        }
    }
}
