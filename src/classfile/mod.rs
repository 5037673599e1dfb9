#[macro_use]
pub mod error;

pub mod class_file;
pub mod constant_pool;
pub mod opcodes;
pub mod stack_map;
pub mod code;

pub use class_file::{ClassAccess, ClassFile, MemberInfo, RawAttribute};
pub use constant_pool::{ConstantPool, CpInfo, JavaString};

use crate::classfile::error::ClassError;

// Basic type reading and writing, class files are big-endian throughout
pub(crate) fn read_u1(bytes: &[u8], ix: &mut usize) -> Result<u8, ClassError>
{
    if bytes.len() < *ix + 1
    {
        fail!("Unexpected end of stream reading u1 at index {}", *ix);
    }
    let result = bytes[*ix];
    *ix += 1;
    Ok(result)
}

pub(crate) fn read_u2(bytes: &[u8], ix: &mut usize) -> Result<u16, ClassError>
{
    if bytes.len() < *ix + 2
    {
        fail!("Unexpected end of stream reading u2 at index {}", *ix);
    }
    let result = ((bytes[*ix] as u16) << 8) | (bytes[*ix + 1] as u16);
    *ix += 2;
    Ok(result)
}

pub(crate) fn read_u4(bytes: &[u8], ix: &mut usize) -> Result<u32, ClassError>
{
    if bytes.len() < *ix + 4
    {
        fail!("Unexpected end of stream reading u4 at index {}", *ix);
    }
    let result =
        ((bytes[*ix] as u32) << 24) | ((bytes[*ix + 1] as u32) << 16) | ((bytes[*ix + 2] as u32) << 8) | (bytes[*ix + 3] as u32);
    *ix += 4;
    Ok(result)
}

pub(crate) fn read_i4(bytes: &[u8], ix: &mut usize) -> Result<i32, ClassError>
{
    Ok(read_u4(bytes, ix)? as i32)
}

pub(crate) fn read_x(bytes: &[u8], ix: &mut usize, length: usize) -> Result<Vec<u8>, ClassError>
{
    if bytes.len().saturating_sub(*ix) >= length
    {
        let mut v = Vec::with_capacity(length);
        v.extend_from_slice(&bytes[*ix..*ix + length]);
        *ix += length;
        Ok(v)
    }
    else
    {
        Err(ClassError::new(&format!(
            "buffer too short for {} byte read at index {}", length, *ix
        )))
    }
}

pub(crate) fn write_u1(buffer: &mut Vec<u8>, val: u8) -> usize
{
    buffer.push(val);
    1
}

pub(crate) fn write_u2(buffer: &mut Vec<u8>, val: u16) -> usize
{
    buffer.extend_from_slice(&val.to_be_bytes());
    2
}

pub(crate) fn write_u4(buffer: &mut Vec<u8>, val: u32) -> usize
{
    buffer.extend_from_slice(&val.to_be_bytes());
    4
}

pub(crate) fn write_i4(buffer: &mut Vec<u8>, val: i32) -> usize
{
    write_u4(buffer, val as u32)
}

pub(crate) fn write_x(buffer: &mut Vec<u8>, val: &[u8]) -> usize
{
    let len = val.len();
    buffer.extend(val);
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_readers() {
        let bytes = [0xca, 0xfe, 0xba, 0xbe, 0x00, 0x32];
        let mut ix = 0;
        assert_eq!(read_u4(&bytes, &mut ix).unwrap(), 0xcafebabe);
        assert_eq!(read_u2(&bytes, &mut ix).unwrap(), 0x32);
        assert_eq!(ix, 6);
        assert!(read_u1(&bytes, &mut ix).is_err());
    }

    #[test]
    fn short_read_x_is_an_error() {
        let bytes = [1u8, 2, 3];
        let mut ix = 1;
        assert!(read_x(&bytes, &mut ix, 3).is_err());
        assert_eq!(read_x(&bytes, &mut ix, 2).unwrap(), vec![2, 3]);
    }

    #[test]
    fn writers_are_big_endian() {
        let mut buf = vec![];
        write_u2(&mut buf, 0x0102);
        write_i4(&mut buf, -2);
        assert_eq!(buf, vec![0x01, 0x02, 0xff, 0xff, 0xff, 0xfe]);
    }
}
