/* Field and method descriptors, e.g. [Ljava/lang/String; and (ILjava/lang/Object;)V */
/* Class names are kept in internal form throughout: java/lang/Object */

use crate::classfile::error::ClassError;
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, one_of};
use nom::combinator::{all_consuming, map};
use nom::multi::many0;
use nom::sequence::{delimited, preceded, terminated};
use nom::{IResult, Parser};
use std::fmt;

/// Converts a dotted Java name to internal form, `a.b.C` to `a/b/C`
pub fn internal_name(java_name: &str) -> String
{
    java_name.replace('.', "/")
}

/// Represents a JVM field type
///
/// # Examples
///
/// ```
///  use cldc_instrument::types::FieldType;
///
///  let t = FieldType::from_descriptor("[Ljava/lang/String;").unwrap();
///  assert_eq!(t.slots(), 1);
///  assert_eq!(t.to_descriptor(), "[Ljava/lang/String;");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType
{
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType
{
    pub fn from_descriptor(s: &str) -> Result<FieldType, ClassError>
    {
        all_consuming(parse_field_type)(s)
            .map(|(_, t)| t)
            .map_err(|_| err!("Invalid field descriptor {}", s))
    }

    pub fn to_descriptor(&self) -> String
    {
        match self
        {
            FieldType::Boolean => "Z".to_string(),
            FieldType::Byte => "B".to_string(),
            FieldType::Char => "C".to_string(),
            FieldType::Short => "S".to_string(),
            FieldType::Int => "I".to_string(),
            FieldType::Long => "J".to_string(),
            FieldType::Float => "F".to_string(),
            FieldType::Double => "D".to_string(),
            FieldType::Object(name) => format!("L{};", name),
            FieldType::Array(t) => format!("[{}", t.to_descriptor()),
        }
    }

    /// Number of local variable or operand stack slots a value of this type takes
    pub fn slots(&self) -> usize
    {
        match self
        {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for FieldType
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "{}", self.to_descriptor())
    }
}

/// A method descriptor: argument types plus return type, None for void
///
/// # Examples
///
/// ```
///  use cldc_instrument::types::MethodDescriptor;
///
///  let m = MethodDescriptor::from_descriptor("(IJLjava/lang/Object;)V").unwrap();
///  assert_eq!(m.argument_slots(), 4);
///  assert!(m.result.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor
{
    pub args: Vec<FieldType>,
    pub result: Option<FieldType>,
}

impl MethodDescriptor
{
    pub fn from_descriptor(s: &str) -> Result<MethodDescriptor, ClassError>
    {
        all_consuming(parse_method_descriptor)(s)
            .map(|(_, m)| m)
            .map_err(|_| err!("Invalid method descriptor {}", s))
    }

    pub fn to_descriptor(&self) -> String
    {
        let mut s = String::from("(");
        for a in &self.args
        {
            s.push_str(&a.to_descriptor());
        }
        s.push(')');
        match &self.result
        {
            Some(t) => s.push_str(&t.to_descriptor()),
            None => s.push('V'),
        }
        s
    }

    /// Slots taken by the arguments, not counting `this`
    pub fn argument_slots(&self) -> usize
    {
        self.args.iter().map(FieldType::slots).sum()
    }
}

impl fmt::Display for MethodDescriptor
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "{}", self.to_descriptor())
    }
}

pub(crate) fn parse_field_type(input: &str) -> IResult<&str, FieldType>
{
    // Object
    let object: IResult<&str, &str> = delimited(char('L'), take_while1(|c: char| c != ';'), char(';')).parse(input);
    if let Ok((o, name)) = object
    {
        return Ok((o, FieldType::Object(name.to_string())));
    }

    // Array
    let array: IResult<&str, FieldType> = preceded(char('['), parse_field_type).parse(input);
    if let Ok((o, t)) = array
    {
        return Ok((o, FieldType::Array(Box::new(t))));
    }

    // Primitive type
    map(one_of("ZBCSIJFD"), |c: char| match c
    {
        'Z' => FieldType::Boolean,
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'S' => FieldType::Short,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'F' => FieldType::Float,
        _ => FieldType::Double,
    })
    .parse(input)
}

fn parse_return_type(input: &str) -> IResult<&str, Option<FieldType>>
{
    alt((map(char('V'), |_| None), map(parse_field_type, Some))).parse(input)
}

pub(crate) fn parse_method_descriptor(input: &str) -> IResult<&str, MethodDescriptor>
{
    let (o, args) = preceded(char('('), terminated(many0(parse_field_type), char(')'))).parse(input)?;
    let (o, result) = parse_return_type(o)?;
    Ok((o, MethodDescriptor { args, result }))
}
