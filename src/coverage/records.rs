use crate::classfile::error::ClassError;
use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, i64 as signed, one_of, space0, space1};
use nom::combinator::all_consuming;
use nom::sequence::{preceded, terminated};
use nom::{IResult, Parser};

/// One line of the coverage log an instrumented application writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageRecord
{
    /// `M <class> <method> <0|1>`
    Method
    {
        class: String, method: String, covered: bool
    },
    /// `L <class> <method> <covered> <total>`
    Lines
    {
        class: String, method: String, covered: i64, total: i64
    },
}

impl CoverageRecord
{
    pub fn class(&self) -> &str
    {
        match self
        {
            CoverageRecord::Method { class, .. } | CoverageRecord::Lines { class, .. } => class,
        }
    }
}

fn token(input: &str) -> IResult<&str, &str>
{
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

fn method_record(input: &str) -> IResult<&str, CoverageRecord>
{
    let (o, _) = char('M').parse(input)?;
    let (o, class) = preceded(space1, token).parse(o)?;
    let (o, method) = preceded(space1, token).parse(o)?;
    let (o, flag) = preceded(space1, one_of("01")).parse(o)?;
    Ok((o, CoverageRecord::Method { class: class.to_string(), method: method.to_string(), covered: flag == '1' }))
}

fn lines_record(input: &str) -> IResult<&str, CoverageRecord>
{
    let (o, _) = char('L').parse(input)?;
    let (o, class) = preceded(space1, token).parse(o)?;
    let (o, method) = preceded(space1, token).parse(o)?;
    let (o, covered) = preceded(space1, signed).parse(o)?;
    let (o, total) = preceded(space1, signed).parse(o)?;
    Ok((o, CoverageRecord::Lines { class: class.to_string(), method: method.to_string(), covered, total }))
}

pub fn parse_record(line: &str) -> Result<CoverageRecord, ClassError>
{
    match all_consuming(terminated(alt((method_record, lines_record)), space0)).parse(line.trim_start())
    {
        Ok((_, record)) => Ok(record),
        Err(_) => Err(err!(InvalidArgument, "Bad coverage record '{}'", line)),
    }
}

/// Parses a whole coverage log, skipping blank lines and `#` comments
pub fn parse_records(text: &str) -> Result<Vec<CoverageRecord>, ClassError>
{
    let mut records = vec![];
    for (n, line) in text.lines().enumerate()
    {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#')
        {
            continue;
        }
        records.push(parse_record(trimmed).map_err(|e| ClassError::with_context(e, format!("line {}", n + 1)))?);
    }
    Ok(records)
}
