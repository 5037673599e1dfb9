use bitflags::bitflags;
use once_cell::sync::Lazy;

pub const ICONST_0: u8 = 0x03;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const ALOAD_0: u8 = 0x2a;
pub const ALOAD_1: u8 = 0x2b;
pub const ALOAD_2: u8 = 0x2c;
pub const IRETURN: u8 = 0xac;
pub const RETURN: u8 = 0xb1;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const NEW: u8 = 0xbb;
pub const ATHROW: u8 = 0xbf;
pub const WIDE: u8 = 0xc4;
pub const IFNULL: u8 = 0xc6;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

/// Shape of the operand bytes that follow an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFormat {
    None,
    /// Signed or unsigned single byte immediate (bipush, newarray)
    Byte,
    /// Two byte immediate (sipush)
    Short,
    /// Local variable index, widened by a `wide` prefix
    Local,
    ConstantIndex1,
    ConstantIndex2,
    /// Local index plus signed increment, both widened by `wide`
    Iinc,
    Branch2,
    Branch4,
    InvokeInterface,
    InvokeDynamic,
    MultiANewArray,
    TableSwitch,
    LookupSwitch,
    Wide,
}

impl OperandFormat {
    /// Operand length in bytes for fixed size formats, None for switches and wide
    pub fn fixed_len(&self) -> Option<usize> {
        Some(match self {
            OperandFormat::None => 0,
            OperandFormat::Byte | OperandFormat::Local | OperandFormat::ConstantIndex1 => 1,
            OperandFormat::Short | OperandFormat::ConstantIndex2 | OperandFormat::Iinc | OperandFormat::Branch2 => 2,
            OperandFormat::MultiANewArray => 3,
            OperandFormat::Branch4 | OperandFormat::InvokeInterface | OperandFormat::InvokeDynamic => 4,
            OperandFormat::TableSwitch | OperandFormat::LookupSwitch | OperandFormat::Wide => return None,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u32 {
        const CAN_CONTINUE = 0x1;
        const CAN_THROW = 0x2;
        const BRANCH = 0x4;
        const UNCONDITIONAL = 0x8;
        const SWITCH = 0x10;
        const RETURN = 0x20;
        const INVOKE = 0x40;
        const FIELD = 0x80;
        const CONSTANT_POOL = 0x100;
    }
}

/// One JVM opcode and its static properties.
#[derive(Debug)]
pub struct Opcode {
    pub code: u8,
    pub name: &'static str,
    pub format: OperandFormat,
    pub flags: OpcodeFlags,
}

impl Opcode {
    const fn new(code: u8, name: &'static str, format: OperandFormat, flags: OpcodeFlags) -> Self {
        Opcode { code, name, format, flags }
    }

    pub fn is_return(&self) -> bool {
        self.flags.contains(OpcodeFlags::RETURN)
    }

    pub fn is_invoke(&self) -> bool {
        self.flags.contains(OpcodeFlags::INVOKE)
    }
}

static OPCODES: Lazy<Vec<Opcode>> = Lazy::new(|| {
    vec![
        Opcode::new(0x00, "nop", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x01, "aconst_null", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x02, "iconst_m1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x03, "iconst_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x04, "iconst_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x05, "iconst_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x06, "iconst_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x07, "iconst_4", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x08, "iconst_5", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x09, "lconst_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0a, "lconst_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0b, "fconst_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0c, "fconst_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0d, "fconst_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0e, "dconst_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x0f, "dconst_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x10, "bipush", OperandFormat::Byte, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x11, "sipush", OperandFormat::Short, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x12, "ldc", OperandFormat::ConstantIndex1, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0x13, "ldc_w", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0x14, "ldc2_w", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0x15, "iload", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x16, "lload", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x17, "fload", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x18, "dload", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x19, "aload", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1a, "iload_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1b, "iload_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1c, "iload_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1d, "iload_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1e, "lload_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x1f, "lload_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x20, "lload_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x21, "lload_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x22, "fload_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x23, "fload_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x24, "fload_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x25, "fload_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x26, "dload_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x27, "dload_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x28, "dload_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x29, "dload_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x2a, "aload_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x2b, "aload_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x2c, "aload_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x2d, "aload_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x2e, "iaload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x2f, "laload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x30, "faload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x31, "daload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x32, "aaload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x33, "baload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x34, "caload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x35, "saload", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x36, "istore", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x37, "lstore", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x38, "fstore", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x39, "dstore", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3a, "astore", OperandFormat::Local, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3b, "istore_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3c, "istore_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3d, "istore_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3e, "istore_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x3f, "lstore_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x40, "lstore_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x41, "lstore_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x42, "lstore_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x43, "fstore_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x44, "fstore_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x45, "fstore_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x46, "fstore_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x47, "dstore_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x48, "dstore_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x49, "dstore_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4a, "dstore_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4b, "astore_0", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4c, "astore_1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4d, "astore_2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4e, "astore_3", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x4f, "iastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x50, "lastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x51, "fastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x52, "dastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x53, "aastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x54, "bastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x55, "castore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x56, "sastore", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x57, "pop", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x58, "pop2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x59, "dup", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5a, "dup_x1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5b, "dup_x2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5c, "dup2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5d, "dup2_x1", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5e, "dup2_x2", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x5f, "swap", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x60, "iadd", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x61, "ladd", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x62, "fadd", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x63, "dadd", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x64, "isub", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x65, "lsub", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x66, "fsub", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x67, "dsub", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x68, "imul", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x69, "lmul", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x6a, "fmul", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x6b, "dmul", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x6c, "idiv", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x6d, "ldiv", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x6e, "fdiv", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x6f, "ddiv", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x70, "irem", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x71, "lrem", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0x72, "frem", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x73, "drem", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x74, "ineg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x75, "lneg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x76, "fneg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x77, "dneg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x78, "ishl", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x79, "lshl", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7a, "ishr", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7b, "lshr", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7c, "iushr", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7d, "lushr", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7e, "iand", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x7f, "land", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x80, "ior", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x81, "lor", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x82, "ixor", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x83, "lxor", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x84, "iinc", OperandFormat::Iinc, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x85, "i2l", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x86, "i2f", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x87, "i2d", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x88, "l2i", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x89, "l2f", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8a, "l2d", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8b, "f2i", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8c, "f2l", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8d, "f2d", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8e, "d2i", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x8f, "d2l", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x90, "d2f", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x91, "i2b", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x92, "i2c", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x93, "i2s", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x94, "lcmp", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x95, "fcmpl", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x96, "fcmpg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x97, "dcmpl", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x98, "dcmpg", OperandFormat::None, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0x99, "ifeq", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9a, "ifne", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9b, "iflt", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9c, "ifge", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9d, "ifgt", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9e, "ifle", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0x9f, "if_icmpeq", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa0, "if_icmpne", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa1, "if_icmplt", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa2, "if_icmpge", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa3, "if_icmpgt", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa4, "if_icmple", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa5, "if_acmpeq", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa6, "if_acmpne", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa7, "goto", OperandFormat::Branch2, OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL),
        Opcode::new(0xa8, "jsr", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xa9, "ret", OperandFormat::Local, OpcodeFlags::UNCONDITIONAL),
        Opcode::new(0xaa, "tableswitch", OperandFormat::TableSwitch, OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::SWITCH),
        Opcode::new(0xab, "lookupswitch", OperandFormat::LookupSwitch, OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::SWITCH),
        Opcode::new(0xac, "ireturn", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xad, "lreturn", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xae, "freturn", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xaf, "dreturn", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xb0, "areturn", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xb1, "return", OperandFormat::None, OpcodeFlags::RETURN | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xb2, "getstatic", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::FIELD),
        Opcode::new(0xb3, "putstatic", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::FIELD),
        Opcode::new(0xb4, "getfield", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::FIELD),
        Opcode::new(0xb5, "putfield", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::FIELD),
        Opcode::new(0xb6, "invokevirtual", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::INVOKE),
        Opcode::new(0xb7, "invokespecial", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::INVOKE),
        Opcode::new(0xb8, "invokestatic", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::INVOKE),
        Opcode::new(0xb9, "invokeinterface", OperandFormat::InvokeInterface, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL | OpcodeFlags::INVOKE),
        Opcode::new(0xba, "invokedynamic", OperandFormat::InvokeDynamic, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xbb, "new", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xbc, "newarray", OperandFormat::Byte, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0xbd, "anewarray", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xbe, "arraylength", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0xbf, "athrow", OperandFormat::None, OpcodeFlags::UNCONDITIONAL | OpcodeFlags::CAN_THROW),
        Opcode::new(0xc0, "checkcast", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xc1, "instanceof", OperandFormat::ConstantIndex2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xc2, "monitorenter", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0xc3, "monitorexit", OperandFormat::None, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW),
        Opcode::new(0xc4, "wide", OperandFormat::Wide, OpcodeFlags::CAN_CONTINUE),
        Opcode::new(0xc5, "multianewarray", OperandFormat::MultiANewArray, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::CAN_THROW | OpcodeFlags::CONSTANT_POOL),
        Opcode::new(0xc6, "ifnull", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xc7, "ifnonnull", OperandFormat::Branch2, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),
        Opcode::new(0xc8, "goto_w", OperandFormat::Branch4, OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL),
        Opcode::new(0xc9, "jsr_w", OperandFormat::Branch4, OpcodeFlags::CAN_CONTINUE | OpcodeFlags::BRANCH),    ]
});

// Indexed by opcode value, holes for the reserved range
static OPCODE_INDEX: Lazy<[Option<usize>; 256]> = Lazy::new(|| {
    let mut index = [None; 256];
    for (i, o) in OPCODES.iter().enumerate() {
        index[o.code as usize] = Some(i);
    }
    index
});

/// Looks up the static description of an opcode, None for unassigned values
pub fn opcode(code: u8) -> Option<&'static Opcode> {
    OPCODE_INDEX[code as usize].map(|i| &OPCODES[i])
}

pub fn name(code: u8) -> &'static str {
    opcode(code).map(|o| o.name).unwrap_or("<invalid>")
}
