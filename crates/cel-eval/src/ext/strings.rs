//! The strings extension.
//!
//! - `charAt(index)`
//! - `indexOf(substring[, offset])`, `lastIndexOf(substring[, offset])`
//! - `lowerAscii()`, `upperAscii()`
//! - `replace(old, new[, limit])`
//! - `split(separator[, limit])`
//! - `substring(start[, end])`
//! - `trim()`, `reverse()`
//! - `format(args)`, a printf-style subset: `%s %d %f %e %b %o %x %X` and `%%`
//! - `join([separator])` on a list of strings
//! - `strings.quote(string)`
//!
//! Indexes and offsets count Unicode code points, not bytes.

use std::cmp::Ordering;
use std::sync::Arc;

use cel_eval_common::CelType;

use crate::adapter::{CelAdapter, ValueAdapter};
use crate::func::{Function, Overload};
use crate::stdlib::no_overload;
use crate::value::time::{format_duration, format_timestamp};
use crate::value::{CelError, CelResult, CelUint, CelVal, Fault};

// ==================== Unicode Helpers ====================

fn codepoint_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of code point `cp`; `cp == len` is the end of the string.
fn byte_offset(s: &str, cp: usize) -> Option<usize> {
    s.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(s.len()))
        .nth(cp)
}

fn codepoints_before(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

/// Validate `idx` as a code point position in `[0, len]`.
fn position(id: i64, s: &str, idx: i64) -> CelResult<usize> {
    let len = codepoint_len(s);
    usize::try_from(idx)
        .ok()
        .filter(|i| *i <= len)
        .ok_or_else(|| CelError::index_out_of_bounds(id, idx, len + 1).into())
}

fn mismatch(id: i64, name: &str, args: &[CelVal]) -> Fault {
    let args: Vec<&CelVal> = args.iter().collect();
    no_overload(id, name, &args)
}

fn string(s: impl Into<Arc<str>>) -> CelResult {
    Ok(CelVal::String(s.into()))
}

// ==================== Functions ====================

/// Every function of the strings extension.
pub fn functions() -> Vec<Function> {
    use CelType::{Int, String as Str};
    vec![
        Function::new("charAt").with_overload(Overload::strict(
            "string_char_at_int",
            vec![Str, Int],
            |id, args| match args {
                [CelVal::String(s), CelVal::Int(i)] => {
                    let at = position(id, s, *i)?;
                    string(s.chars().nth(at).map(String::from).unwrap_or_default())
                }
                _ => Err(mismatch(id, "charAt", args)),
            },
        )),
        Function::new("indexOf")
            .with_overload(Overload::strict(
                "string_index_of_string",
                vec![Str, Str],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sub)] => Ok(CelVal::Int(index_of(s, sub, 0))),
                    _ => Err(mismatch(id, "indexOf", args)),
                },
            ))
            .with_overload(Overload::strict(
                "string_index_of_string_int",
                vec![Str, Str, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sub), CelVal::Int(offset)] => {
                        let start = position(id, s, *offset)?;
                        Ok(CelVal::Int(index_of(s, sub, start)))
                    }
                    _ => Err(mismatch(id, "indexOf", args)),
                },
            )),
        Function::new("lastIndexOf")
            .with_overload(Overload::strict(
                "string_last_index_of_string",
                vec![Str, Str],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sub)] => {
                        Ok(CelVal::Int(last_index_of(s, sub, codepoint_len(s))))
                    }
                    _ => Err(mismatch(id, "lastIndexOf", args)),
                },
            ))
            .with_overload(Overload::strict(
                "string_last_index_of_string_int",
                vec![Str, Str, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sub), CelVal::Int(offset)] => {
                        let last = position(id, s, *offset)?;
                        Ok(CelVal::Int(last_index_of(s, sub, last)))
                    }
                    _ => Err(mismatch(id, "lastIndexOf", args)),
                },
            )),
        Function::new("lowerAscii").with_overload(Overload::unary("string_lower_ascii", Str, |id, x| {
            match x {
                CelVal::String(s) => string(s.to_ascii_lowercase()),
                other => Err(no_overload(id, "lowerAscii", &[other])),
            }
        })),
        Function::new("upperAscii").with_overload(Overload::unary("string_upper_ascii", Str, |id, x| {
            match x {
                CelVal::String(s) => string(s.to_ascii_uppercase()),
                other => Err(no_overload(id, "upperAscii", &[other])),
            }
        })),
        Function::new("replace")
            .with_overload(Overload::strict(
                "string_replace_string_string",
                vec![Str, Str, Str],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(old), CelVal::String(new)] => {
                        string(s.replace(&**old, new))
                    }
                    _ => Err(mismatch(id, "replace", args)),
                },
            ))
            .with_overload(Overload::strict(
                "string_replace_string_string_int",
                vec![Str, Str, Str, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(old), CelVal::String(new), CelVal::Int(limit)] => {
                        // A negative limit replaces every occurrence.
                        match usize::try_from(*limit) {
                            Ok(n) => string(s.replacen(&**old, new, n)),
                            Err(_) => string(s.replace(&**old, new)),
                        }
                    }
                    _ => Err(mismatch(id, "replace", args)),
                },
            )),
        Function::new("split")
            .with_overload(Overload::strict(
                "string_split_string",
                vec![Str, Str],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sep)] => Ok(split(s, sep, -1)),
                    _ => Err(mismatch(id, "split", args)),
                },
            ))
            .with_overload(Overload::strict(
                "string_split_string_int",
                vec![Str, Str, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::String(sep), CelVal::Int(limit)] => {
                        Ok(split(s, sep, *limit))
                    }
                    _ => Err(mismatch(id, "split", args)),
                },
            )),
        Function::new("substring")
            .with_overload(Overload::strict(
                "string_substring_int",
                vec![Str, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::Int(start)] => {
                        substring(id, s, *start, codepoint_len(s) as i64)
                    }
                    _ => Err(mismatch(id, "substring", args)),
                },
            ))
            .with_overload(Overload::strict(
                "string_substring_int_int",
                vec![Str, Int, Int],
                |id, args| match args {
                    [CelVal::String(s), CelVal::Int(start), CelVal::Int(end)] => {
                        substring(id, s, *start, *end)
                    }
                    _ => Err(mismatch(id, "substring", args)),
                },
            )),
        Function::new("trim").with_overload(Overload::unary("string_trim", Str, |id, x| match x {
            CelVal::String(s) => string(s.trim()),
            other => Err(no_overload(id, "trim", &[other])),
        })),
        Function::new("reverse").with_overload(Overload::unary("string_reverse", Str, |id, x| {
            match x {
                CelVal::String(s) => string(s.chars().rev().collect::<String>()),
                other => Err(no_overload(id, "reverse", &[other])),
            }
        })),
        Function::new("format").with_overload(Overload::binary(
            "string_format",
            Str,
            CelType::dyn_list(),
            |id, fmt, args| match (fmt, args) {
                (CelVal::String(fmt), CelVal::List(list)) => {
                    let values = list.values(id)?;
                    format(fmt, &values)
                        .map(CelVal::from)
                        .map_err(|issue| CelError::invalid_argument(id, "format", issue).into())
                }
                _ => Err(no_overload(id, "format", &[fmt, args])),
            },
        )),
        Function::new("join")
            .with_overload(Overload::unary("list_string_join", CelType::dyn_list(), |id, x| {
                join(id, x, "")
            }))
            .with_overload(Overload::binary(
                "list_string_join_string",
                CelType::dyn_list(),
                Str,
                |id, x, sep| match sep {
                    CelVal::String(sep) => join(id, x, sep),
                    other => Err(no_overload(id, "join", &[x, other])),
                },
            )),
        Function::new("strings.quote").with_overload(Overload::unary(
            "strings_quote_string",
            Str,
            |id, x| match x {
                CelVal::String(s) => string(quote(s)),
                other => Err(no_overload(id, "strings.quote", &[other])),
            },
        )),
    ]
}

fn index_of(s: &str, sub: &str, start: usize) -> i64 {
    let Some(from) = byte_offset(s, start) else {
        return -1;
    };
    match s[from..].find(sub) {
        Some(b) => codepoints_before(s, from + b),
        None => -1,
    }
}

/// The last match starting at or before code point `last`.
fn last_index_of(s: &str, sub: &str, last: usize) -> i64 {
    if sub.is_empty() {
        return last as i64;
    }
    let end = byte_offset(s, last + codepoint_len(sub)).unwrap_or(s.len());
    match s[..end].rfind(sub) {
        Some(b) => codepoints_before(s, b),
        None => -1,
    }
}

fn split(s: &str, sep: &str, limit: i64) -> CelVal {
    let parts: Vec<CelVal> = match usize::try_from(limit) {
        Ok(0) => Vec::new(),
        Ok(n) => s.splitn(n, sep).map(CelVal::from).collect(),
        Err(_) => s.split(sep).map(CelVal::from).collect(),
    };
    CelVal::list(parts)
}

fn substring(id: i64, s: &str, start: i64, end: i64) -> CelResult {
    let from = position(id, s, start)?;
    let to = position(id, s, end)?;
    if from > to {
        return Err(CelError::invalid_argument(
            id,
            "substring",
            format!("invalid substring range. start: {}, end: {}", start, end),
        )
        .into());
    }
    let b_from = byte_offset(s, from).unwrap_or(s.len());
    let b_to = byte_offset(s, to).unwrap_or(s.len());
    string(&s[b_from..b_to])
}

fn join(id: i64, list: &CelVal, sep: &str) -> CelResult {
    let CelVal::List(list) = list else {
        return Err(no_overload(id, "join", &[list]));
    };
    let mut parts = Vec::with_capacity(list.len());
    for item in list.iter(id) {
        match item? {
            CelVal::String(s) => parts.push(s),
            other => {
                return Err(CelError::invalid_argument(
                    id,
                    "join",
                    format!("list element is {}, not string", other.cel_type().name()),
                )
                .into())
            }
        }
    }
    string(parts.join(sep))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0B' => out.push_str("\\v"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ==================== format() ====================

enum Clause {
    Literal(String),
    Verb { verb: char, precision: Option<usize> },
}

fn parse_clauses(fmt: &str) -> Result<Vec<Clause>, String> {
    let mut clauses = Vec::new();
    let mut literal = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }
        if !literal.is_empty() {
            clauses.push(Clause::Literal(std::mem::take(&mut literal)));
        }
        let precision = if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            Some(digits.parse::<usize>().map_err(|_| "invalid precision".to_string())?)
        } else {
            None
        };
        match chars.next() {
            Some(verb @ ('s' | 'd' | 'f' | 'e' | 'b' | 'o' | 'x' | 'X')) => {
                clauses.push(Clause::Verb { verb, precision })
            }
            Some(other) => return Err(format!("unrecognized formatting clause \"{}\"", other)),
            None => return Err("unexpected end of format string".to_string()),
        }
    }
    if !literal.is_empty() {
        clauses.push(Clause::Literal(literal));
    }
    Ok(clauses)
}

fn format(fmt: &str, args: &[CelVal]) -> Result<String, String> {
    let mut out = String::new();
    let mut next = args.iter();
    for clause in parse_clauses(fmt)? {
        match clause {
            Clause::Literal(s) => out.push_str(&s),
            Clause::Verb { verb, precision } => {
                let arg = next
                    .next()
                    .ok_or_else(|| format!("index {} out of range", args.len()))?;
                let arg = arg.clone().unwrapped();
                out.push_str(&format_arg(&arg, verb, precision)?);
            }
        }
    }
    Ok(out)
}

fn non_finite(d: f64) -> Option<String> {
    if d.is_nan() {
        Some("NaN".to_string())
    } else if d.is_infinite() {
        Some(if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string())
    } else {
        None
    }
}

fn as_f64(v: &CelVal) -> Option<f64> {
    match v {
        CelVal::Double(d) => Some(*d),
        CelVal::Int(i) => Some(*i as f64),
        CelVal::UInt(CelUint(u)) => Some(*u as f64),
        _ => None,
    }
}

fn format_arg(v: &CelVal, verb: char, precision: Option<usize>) -> Result<String, String> {
    let type_name = || v.cel_type().name();
    match verb {
        's' => format_as_string(v),
        'd' => match v {
            CelVal::Int(i) => Ok(i.to_string()),
            CelVal::UInt(CelUint(u)) => Ok(u.to_string()),
            CelVal::Double(d) if !d.is_finite() => Ok(non_finite(*d).unwrap_or_default()),
            _ => Err(format!("decimal clause can only be used on integers, was given {}", type_name())),
        },
        'f' | 'e' => {
            let d = as_f64(v).ok_or_else(|| {
                format!("{} clause can only be used on doubles, was given {}", verb, type_name())
            })?;
            let precision = precision.unwrap_or(6);
            Ok(non_finite(d).unwrap_or_else(|| {
                if verb == 'f' {
                    format!("{:.*}", precision, d)
                } else {
                    scientific(d, precision)
                }
            }))
        }
        'b' => match v {
            CelVal::Int(i) => Ok(format!("{:b}", i)),
            CelVal::UInt(CelUint(u)) => Ok(format!("{:b}", u)),
            CelVal::Bool(b) => Ok(u8::from(*b).to_string()),
            _ => Err(format!(
                "only integers and bools can be formatted as binary, was given {}",
                type_name()
            )),
        },
        'o' => match v {
            CelVal::Int(i) => Ok(format!("{:o}", i)),
            CelVal::UInt(CelUint(u)) => Ok(format!("{:o}", u)),
            _ => Err(format!("octal clause can only be used on integers, was given {}", type_name())),
        },
        _ => {
            let hex = match v {
                CelVal::Int(i) => format!("{:x}", i),
                CelVal::UInt(CelUint(u)) => format!("{:x}", u),
                CelVal::String(s) => s.bytes().map(|b| format!("{:02x}", b)).collect(),
                CelVal::Bytes(b) => b.iter().map(|b| format!("{:02x}", b)).collect(),
                _ => {
                    return Err(format!(
                        "only integers, byte buffers, and strings can be formatted as hex, was given {}",
                        type_name()
                    ))
                }
            };
            Ok(if verb == 'X' { hex.to_uppercase() } else { hex })
        }
    }
}

/// `%e` in the printf style: one leading digit and a two-digit exponent.
fn scientific(d: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, d);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

fn format_as_string(v: &CelVal) -> Result<String, String> {
    Ok(match v {
        CelVal::Null => "null".to_string(),
        CelVal::Bool(b) => b.to_string(),
        CelVal::Int(i) => i.to_string(),
        CelVal::UInt(CelUint(u)) => u.to_string(),
        CelVal::Double(d) => non_finite(*d).unwrap_or_else(|| d.to_string()),
        CelVal::String(s) => s.to_string(),
        CelVal::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        CelVal::Timestamp(t) => format_timestamp(t),
        CelVal::Duration(d) => format_duration(d),
        CelVal::Type(t) => t.fullname(),
        CelVal::Wrapped(w) => format_as_string(&w.clone().into_inner())?,
        CelVal::List(list) => {
            let items = list.values(0).map_err(|_| "list element could not be read".to_string())?;
            let parts = items.iter().map(format_as_string).collect::<Result<Vec<_>, _>>()?;
            format!("[{}]", parts.join(", "))
        }
        CelVal::Map(map) => {
            let mut entries = map.entries(0).map_err(|_| "map entry could not be read".to_string())?;
            entries.sort_by(|(a, _), (b, _)| key_order(a, b));
            let parts = entries
                .iter()
                .map(|(k, v)| Ok(format!("{}: {}", format_as_string(k)?, format_as_string(v)?)))
                .collect::<Result<Vec<_>, String>>()?;
            format!("{{{}}}", parts.join(", "))
        }
        other => {
            return Err(format!(
                "string clause can only be used on strings, bools, bytes, ints, doubles, maps, lists, types, durations, and timestamps, was given {}",
                other.cel_type().name()
            ))
        }
    })
}

/// Numbers first, then strings, then bools; natural order within a group.
fn key_order(a: &CelVal, b: &CelVal) -> Ordering {
    fn group(v: &CelVal) -> u8 {
        match v {
            CelVal::Int(_) | CelVal::UInt(_) | CelVal::Double(_) => 0,
            CelVal::String(_) => 1,
            CelVal::Bool(_) => 2,
            _ => 3,
        }
    }
    group(a)
        .cmp(&group(b))
        .then_with(|| CelAdapter.compare(a, b).unwrap_or(Ordering::Equal))
}
