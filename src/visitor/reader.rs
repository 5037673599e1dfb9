use crate::classfile::code::{self, CODE};
use crate::classfile::error::ClassError;
use crate::classfile::ClassFile;
use crate::visitor::{ClassHeader, ClassVisitor, MethodHeader};

/// Replays a parsed class through a visitor chain
pub struct ClassReader
{
    class: ClassFile,
}

impl ClassReader
{
    pub fn new(class: ClassFile) -> ClassReader
    {
        ClassReader { class }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ClassReader, ClassError>
    {
        Ok(ClassReader { class: ClassFile::from_bytes(bytes)? })
    }

    pub fn class_file(&self) -> &ClassFile
    {
        &self.class
    }

    pub fn into_class_file(self) -> ClassFile
    {
        self.class
    }

    pub fn header(&self) -> Result<ClassHeader, ClassError>
    {
        Ok(ClassHeader {
            minor_version: self.class.minor_version,
            major_version: self.class.major_version,
            access: self.class.access_flags,
            name: self.class.name()?.to_string(),
            super_name: self.class.super_name()?.map(str::to_string),
            interfaces: self.class.interface_names()?.into_iter().map(str::to_string).collect(),
        })
    }

    /// Sends the whole class through `visitor`: class-start, one region per
    /// method in declaration order, class-end.
    pub fn accept(&self, visitor: &mut dyn ClassVisitor) -> Result<(), ClassError>
    {
        let header = self.header()?;
        visitor.visit(&header)?;

        let pool = &self.class.constant_pool;
        for (i, method) in self.class.methods.iter().enumerate()
        {
            let method_header = MethodHeader {
                access: method.access_flags,
                name: pool.utf8(method.name_index)?.to_string(),
                descriptor: pool.utf8(method.descriptor_index)?.to_string(),
                source: Some(i),
            };
            let describe = |e: ClassError| {
                ClassError::with_context(e, format!("{}.{}{}", header.name, method_header.name, method_header.descriptor))
            };

            let body = match method.attribute(pool, CODE)
            {
                Some(attribute) => Some(code::decode(&attribute.info, pool).map_err(describe)?),
                None => None,
            };
            let mut mv = visitor.visit_method(&method_header)?;
            match body
            {
                Some(body) => {
                    for op in body.ops
                    {
                        mv.visit_op(op).map_err(describe)?;
                    }
                    mv.visit_end(Some(body.trailer)).map_err(describe)?;
                }
                None => mv.visit_end(None)?,
            }
        }

        visitor.visit_end()
    }
}
