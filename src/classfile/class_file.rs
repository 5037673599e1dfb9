/* Class file format structures */

use crate::classfile::constant_pool::ConstantPool;
use crate::classfile::error::ClassError;
use crate::classfile::{read_u2, read_u4, read_x, write_u2, write_u4, write_x};
use bitflags::bitflags;
use std::fs;
use std::path::Path;

/* Constants */
pub const CLASS_FILE_MAGIC: u32 = 0xcafebabe;

bitflags! {
    /// Access flags shared by classes, fields and methods
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

/// An attribute kept as its undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute
{
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl RawAttribute
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<RawAttribute, ClassError>
    {
        let name_index = read_u2(bytes, ix)?;
        let length = read_u4(bytes, ix)? as usize;
        let info = read_x(bytes, ix, length)?;
        Ok(RawAttribute { name_index, info })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.name_index);
        c += write_u4(bytes, self.info.len() as u32);
        c += write_x(bytes, &self.info);
        c
    }

    pub(crate) fn read_list(bytes: &[u8], ix: &mut usize) -> Result<Vec<RawAttribute>, ClassError>
    {
        let count = read_u2(bytes, ix)?;
        let mut v = Vec::with_capacity(count as usize);
        for _ in 0..count { v.push(RawAttribute::read(bytes, ix)?); }
        Ok(v)
    }

    pub(crate) fn write_list(attributes: &[RawAttribute], bytes: &mut Vec<u8>) -> usize
    {
        let mut c = write_u2(bytes, attributes.len() as u16);
        for a in attributes { c += a.write(bytes); }
        c
    }
}

/// A field_info or method_info structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo
{
    pub access_flags: ClassAccess,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<RawAttribute>,
}

impl MemberInfo
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<MemberInfo, ClassError>
    {
        Ok(MemberInfo {
            access_flags: ClassAccess::from_bits_retain(read_u2(bytes, ix)?),
            name_index: read_u2(bytes, ix)?,
            descriptor_index: read_u2(bytes, ix)?,
            attributes: RawAttribute::read_list(bytes, ix)?,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u2(bytes, self.access_flags.bits());
        c += write_u2(bytes, self.name_index);
        c += write_u2(bytes, self.descriptor_index);
        c += RawAttribute::write_list(&self.attributes, bytes);
        c
    }

    /// Finds the first attribute with the given name
    pub fn attribute<'a>(&'a self, pool: &ConstantPool, name: &str) -> Option<&'a RawAttribute>
    {
        self.attributes.iter().find(|a| pool.utf8(a.name_index).map(|n| n == name).unwrap_or(false))
    }
}

/// A whole class file, with attributes left undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile
{
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: ClassAccess,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<RawAttribute>,
}

impl ClassFile
{
    pub fn read(bytes: &[u8], ix: &mut usize) -> Result<ClassFile, ClassError>
    {
        let magic = read_u4(bytes, ix)?;
        if magic != CLASS_FILE_MAGIC
        {
            fail!("Bad class file magic 0x{:08x}", magic);
        }
        let minor_version = read_u2(bytes, ix)?;
        let major_version = read_u2(bytes, ix)?;
        let constant_pool = ConstantPool::read(bytes, ix)?;
        let access_flags = ClassAccess::from_bits_retain(read_u2(bytes, ix)?);
        let this_class = read_u2(bytes, ix)?;
        let super_class = read_u2(bytes, ix)?;

        let interfaces_count = read_u2(bytes, ix)?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count { interfaces.push(read_u2(bytes, ix)?); }

        let fields_count = read_u2(bytes, ix)?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for i in 0..fields_count
        {
            fields.push(MemberInfo::read(bytes, ix).map_err(|e| ClassError::with_context(e, format!("field #{}", i)))?);
        }

        let methods_count = read_u2(bytes, ix)?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for i in 0..methods_count
        {
            methods.push(MemberInfo::read(bytes, ix).map_err(|e| ClassError::with_context(e, format!("method #{}", i)))?);
        }

        let attributes = RawAttribute::read_list(bytes, ix)?;
        if *ix != bytes.len()
        {
            fail!("{} trailing bytes after class file", bytes.len() - *ix);
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn write(&self, bytes: &mut Vec<u8>) -> usize
    {
        let mut c = 0;
        c += write_u4(bytes, CLASS_FILE_MAGIC);
        c += write_u2(bytes, self.minor_version);
        c += write_u2(bytes, self.major_version);
        c += self.constant_pool.write(bytes);
        c += write_u2(bytes, self.access_flags.bits());
        c += write_u2(bytes, self.this_class);
        c += write_u2(bytes, self.super_class);
        c += write_u2(bytes, self.interfaces.len() as u16);
        for i in &self.interfaces { c += write_u2(bytes, *i); }
        c += write_u2(bytes, self.fields.len() as u16);
        for f in &self.fields { c += f.write(bytes); }
        c += write_u2(bytes, self.methods.len() as u16);
        for m in &self.methods { c += m.write(bytes); }
        c += RawAttribute::write_list(&self.attributes, bytes);
        c
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ClassFile, ClassError>
    {
        let mut ix = 0;
        ClassFile::read(bytes, &mut ix)
    }

    pub fn from_file(path: &Path) -> Result<ClassFile, ClassError>
    {
        let bytes = fs::read(path)?;
        ClassFile::from_bytes(&bytes).map_err(|e| ClassError::with_context(e, path.display().to_string()))
    }

    pub fn to_bytes(&self) -> Vec<u8>
    {
        let mut bytes = vec![];
        self.write(&mut bytes);
        bytes
    }

    pub fn name(&self) -> Result<&str, ClassError>
    {
        self.constant_pool.class_name(self.this_class)
    }

    /// The superclass name, None only for java/lang/Object
    pub fn super_name(&self) -> Result<Option<&str>, ClassError>
    {
        if self.super_class == 0 { Ok(None) } else { Ok(Some(self.constant_pool.class_name(self.super_class)?)) }
    }

    pub fn interface_names(&self) -> Result<Vec<&str>, ClassError>
    {
        self.interfaces.iter().map(|i| self.constant_pool.class_name(*i)).collect()
    }

    pub fn is_interface(&self) -> bool
    {
        self.access_flags.contains(ClassAccess::INTERFACE)
    }
}
