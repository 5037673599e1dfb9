use crate::classfile::error::ClassError;
use crate::classfile::ClassFile;
use std::fmt;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// Where a descriptor's metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin
{
    /// Parsed from a class file on the target classpath or in the batch
    Embedded,
    /// Taken from the bundled table of standard classes
    HostEquivalent,
}

/// The structural facts about a class the resolver needs, nothing more
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor
{
    pub name: String,
    /// None only for java/lang/Object
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub origin: Origin,
}

impl ClassDescriptor
{
    pub fn from_class_file(class: &ClassFile) -> Result<ClassDescriptor, ClassError>
    {
        let name = class.name()?.to_string();
        let super_name = class.super_name()?.map(str::to_string);
        if super_name.is_none() && name != JAVA_LANG_OBJECT
        {
            fail!("Class {} has no superclass", name);
        }
        Ok(ClassDescriptor {
            name,
            super_name,
            interfaces: class.interface_names()?.into_iter().map(str::to_string).collect(),
            is_interface: class.is_interface(),
            origin: Origin::Embedded,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ClassDescriptor, ClassError>
    {
        ClassDescriptor::from_class_file(&ClassFile::from_bytes(bytes)?)
    }

    pub(crate) fn host(name: &str, super_name: Option<&str>, interfaces: &[&str], is_interface: bool) -> ClassDescriptor
    {
        ClassDescriptor {
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
            is_interface,
            origin: Origin::HostEquivalent,
        }
    }
}

impl fmt::Display for ClassDescriptor
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}{}", if self.is_interface { "interface " } else { "class " }, self.name)?;
        if let Some(s) = &self.super_name
        {
            write!(f, " extends {}", s)?;
        }
        if !self.interfaces.is_empty()
        {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        Ok(())
    }
}
