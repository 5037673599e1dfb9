use crate::classfile::code::{self, CodeOp, CodeTrailer, CODE};
use crate::classfile::error::ClassError;
use crate::classfile::{ClassAccess, ClassFile, ConstantPool, MemberInfo, RawAttribute};
use crate::visitor::{ClassHeader, ClassVisitor, MethodHeader, MethodVisitor};
use log::debug;

/// Version used for classes built from scratch, the CLDC 1.1 preverifier's
const DEFAULT_MAJOR_VERSION: u16 = 47;

/// Serializes the event stream back into a class file.
///
/// Built from a source class, the writer keeps that class's constant pool and
/// only appends to it, and copies fields, class attributes and every method
/// attribute other than `Code` from the source. Without instrumentation the
/// output is byte-identical to the source.
pub struct ClassWriter
{
    source: Option<ClassFile>,
    pool: ConstantPool,
    header: Option<ClassHeader>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    methods: Vec<MemberInfo>,
    synthetic_count: usize,
    output: Option<ClassFile>,
}

impl ClassWriter
{
    /// A writer for a class with no source to copy from
    pub fn new() -> ClassWriter
    {
        ClassWriter {
            source: None,
            pool: ConstantPool::new(),
            header: None,
            this_class: 0,
            super_class: 0,
            interfaces: vec![],
            methods: vec![],
            synthetic_count: 0,
            output: None,
        }
    }

    pub fn from_source(source: ClassFile) -> ClassWriter
    {
        let pool = source.constant_pool.clone();
        ClassWriter { source: Some(source), pool, ..ClassWriter::new() }
    }

    /// Number of synthetic instructions written so far
    pub fn synthetic_count(&self) -> usize
    {
        self.synthetic_count
    }

    /// The finished class, available once class-end has been seen
    pub fn class_file(&self) -> Result<&ClassFile, ClassError>
    {
        self.output.as_ref().ok_or_else(|| err!("Class writer used before class-end"))
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, ClassError>
    {
        match self.output
        {
            Some(class) => Ok(class.to_bytes()),
            None => Err(err!("Class writer used before class-end")),
        }
    }

    fn class_index(&mut self, original: Option<u16>, name: &str) -> Result<u16, ClassError>
    {
        if let Some(index) = original
        {
            if self.pool.class_name(index).map(|n| n == name).unwrap_or(false)
            {
                return Ok(index);
            }
        }
        self.pool.add_class(name)
    }

    fn utf8_index(&mut self, original: Option<u16>, value: &str) -> Result<u16, ClassError>
    {
        if let Some(index) = original
        {
            if self.pool.utf8(index).map(|v| v == value).unwrap_or(false)
            {
                return Ok(index);
            }
        }
        self.pool.add_utf8(value)
    }

    fn source_method(&self, header: &MethodHeader) -> Option<&MemberInfo>
    {
        let source = self.source.as_ref()?;
        source.methods.get(header.source?)
    }

    fn finish_method(&mut self, header: &MethodHeader, ops: &[CodeOp], trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        let original = self.source_method(header).cloned();
        let name_index = self.utf8_index(original.as_ref().map(|m| m.name_index), &header.name)?;
        let descriptor_index = self.utf8_index(original.as_ref().map(|m| m.descriptor_index), &header.descriptor)?;

        let code = match trailer
        {
            Some(trailer) => Some(code::assemble(ops, &trailer, &mut self.pool)?),
            None => {
                if !ops.is_empty()
                {
                    fail!("Method {}{} has ops but no code trailer", header.name, header.descriptor);
                }
                None
            }
        };

        let mut attributes = vec![];
        let mut code = code;
        if let Some(original) = &original
        {
            for a in &original.attributes
            {
                if self.pool.utf8(a.name_index).map(|n| n == CODE).unwrap_or(false)
                {
                    if let Some(info) = code.take()
                    {
                        attributes.push(RawAttribute { name_index: a.name_index, info });
                    }
                }
                else
                {
                    attributes.push(a.clone());
                }
            }
        }
        if let Some(info) = code
        {
            attributes.push(RawAttribute { name_index: self.pool.add_utf8(CODE)?, info });
        }

        self.methods.push(MemberInfo { access_flags: header.access, name_index, descriptor_index, attributes });
        Ok(())
    }
}

impl Default for ClassWriter
{
    fn default() -> Self
    {
        ClassWriter::new()
    }
}

impl ClassVisitor for ClassWriter
{
    fn visit(&mut self, header: &ClassHeader) -> Result<(), ClassError>
    {
        if self.header.is_some()
        {
            fail!("Class {} started twice", header.name);
        }
        let original = self.source.as_ref().map(|s| (s.this_class, s.super_class, s.interfaces.clone()));
        let (this_original, super_original, interfaces_original) = match original
        {
            Some((t, s, i)) => (Some(t), Some(s), i),
            None => (None, None, vec![]),
        };

        self.this_class = self.class_index(this_original, &header.name)?;
        self.super_class = match &header.super_name
        {
            Some(name) => self.class_index(super_original, name)?,
            None => 0,
        };
        self.interfaces = vec![];
        for (i, name) in header.interfaces.iter().enumerate()
        {
            let index = self.class_index(interfaces_original.get(i).copied(), name)?;
            self.interfaces.push(index);
        }
        self.header = Some(header.clone());
        Ok(())
    }

    fn visit_method<'a>(&'a mut self, header: &MethodHeader) -> Result<Box<dyn MethodVisitor + 'a>, ClassError>
    {
        if self.header.is_none() || self.output.is_some()
        {
            fail!("Method {} visited outside a class", header.name);
        }
        Ok(Box::new(MethodWriter { writer: self, header: header.clone(), ops: vec![] }))
    }

    fn visit_end(&mut self) -> Result<(), ClassError>
    {
        let Some(header) = self.header.as_ref() else {
            fail!("Class ended before it started");
        };
        if self.output.is_some()
        {
            fail!("Class {} ended twice", header.name);
        }
        let (fields, attributes) = match &self.source
        {
            Some(source) => (source.fields.clone(), source.attributes.clone()),
            None => (vec![], vec![]),
        };
        debug!("{}: wrote {} methods, {} synthetic instructions", header.name, self.methods.len(), self.synthetic_count);
        self.output = Some(ClassFile {
            minor_version: header.minor_version,
            major_version: if header.major_version == 0 { DEFAULT_MAJOR_VERSION } else { header.major_version },
            constant_pool: self.pool.clone(),
            access_flags: header.access,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces.clone(),
            fields,
            methods: std::mem::take(&mut self.methods),
            attributes,
        });
        Ok(())
    }
}

struct MethodWriter<'a>
{
    writer: &'a mut ClassWriter,
    header: MethodHeader,
    ops: Vec<CodeOp>,
}

impl MethodVisitor for MethodWriter<'_>
{
    fn visit_op(&mut self, op: CodeOp) -> Result<(), ClassError>
    {
        if let CodeOp::Insn(insn) = &op
        {
            if insn.is_synthetic()
            {
                self.writer.synthetic_count += 1;
            }
        }
        self.ops.push(op);
        Ok(())
    }

    fn visit_end(self: Box<Self>, trailer: Option<CodeTrailer>) -> Result<(), ClassError>
    {
        let MethodWriter { writer, header, ops } = *self;
        writer.finish_method(&header, &ops, trailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::code::Insn;
    use crate::classfile::opcodes;

    fn header(name: &str) -> ClassHeader {
        ClassHeader {
            minor_version: 0,
            major_version: 0,
            access: ClassAccess::PUBLIC | ClassAccess::SUPER,
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec!["java/lang/Runnable".to_string()],
        }
    }

    #[test]
    fn builds_a_class_from_events() {
        let mut w = ClassWriter::new();
        w.visit(&header("demo/Main")).unwrap();
        let m = MethodHeader { access: ClassAccess::PUBLIC, name: "run".to_string(), descriptor: "()V".to_string(), source: None };
        let mut mv = w.visit_method(&m).unwrap();
        mv.visit_op(CodeOp::Insn(Insn::Plain { opcode: opcodes::RETURN, operands: vec![] })).unwrap();
        mv.visit_end(Some(CodeTrailer::new(0, 1))).unwrap();
        w.visit_end().unwrap();

        let class = w.class_file().unwrap();
        assert_eq!(class.name().unwrap(), "demo/Main");
        assert_eq!(class.interface_names().unwrap(), vec!["java/lang/Runnable"]);
        assert_eq!(class.major_version, DEFAULT_MAJOR_VERSION);
        let bytes = w.into_bytes().unwrap();
        let again = ClassFile::from_bytes(&bytes).unwrap();
        assert_eq!(again.methods.len(), 1);
        assert!(again.methods[0].attribute(&again.constant_pool, CODE).is_some());
    }

    #[test]
    fn events_out_of_order_are_rejected() {
        let mut w = ClassWriter::new();
        let m = MethodHeader { access: ClassAccess::PUBLIC, name: "run".to_string(), descriptor: "()V".to_string(), source: None };
        assert!(w.visit_method(&m).is_err());
        assert!(w.visit_end().is_err());
        w.visit(&header("demo/Main")).unwrap();
        assert!(w.visit(&header("demo/Main")).is_err());
        w.visit_end().unwrap();
        assert!(w.visit_end().is_err());
    }

    #[test]
    fn abstract_method_with_ops_is_rejected() {
        let mut w = ClassWriter::new();
        w.visit(&header("demo/Main")).unwrap();
        let m = MethodHeader { access: ClassAccess::ABSTRACT, name: "run".to_string(), descriptor: "()V".to_string(), source: None };
        let mut mv = w.visit_method(&m).unwrap();
        mv.visit_op(CodeOp::Insn(Insn::PushInt(1))).unwrap();
        assert!(mv.visit_end(None).is_err());
        assert_eq!(w.synthetic_count(), 1);
    }
}
