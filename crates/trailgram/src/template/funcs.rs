//! Built-in template functions.
//!
//! `and` and `or` short-circuit, so the executor evaluates them itself; the
//! eager versions here are used when they appear as a bare pipeline stage.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use super::value::Value;

const BUILTINS: &[&str] = &[
    "and", "or", "not", "len", "index", "eq", "ne", "lt", "le", "gt", "ge", "print", "println",
    "printf", "html", "urlquery", "js",
];

type FuncResult = Result<Value, String>;

/// Whether `name` is a function templates may call.
pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Call a built-in with already evaluated arguments.
pub(crate) fn call(name: &str, args: &[Value]) -> FuncResult {
    match name {
        "and" => Ok(truth_chain(args, false)),
        "or" => Ok(truth_chain(args, true)),
        "not" => {
            let [arg] = args else {
                return Err(arg_count("not", 1, args.len()));
            };
            Ok(Value::Bool(!arg.is_truthy()))
        },
        "len" => {
            let [arg] = args else {
                return Err(arg_count("len", 1, args.len()));
            };
            length(arg)
        },
        "index" => {
            let Some((item, indices)) = args.split_first() else {
                return Err(arg_count("index", 1, 0));
            };
            indices.iter().try_fold(item.clone(), |current, idx| index(&current, idx))
        },
        "eq" => {
            let Some((first, rest)) = args.split_first() else {
                return Err("missing argument for comparison".to_string());
            };
            if rest.is_empty() {
                return Err("missing argument for comparison".to_string());
            }
            for other in rest {
                if equal(first, other)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        },
        "ne" => binary(name, args, |a, b| equal(a, b).map(|eq| !eq)),
        "lt" => binary(name, args, |a, b| order(a, b).map(Ordering::is_lt)),
        "le" => binary(name, args, |a, b| order(a, b).map(Ordering::is_le)),
        "gt" => binary(name, args, |a, b| order(a, b).map(Ordering::is_gt)),
        "ge" => binary(name, args, |a, b| order(a, b).map(Ordering::is_ge)),
        "print" => Ok(Value::Str(sprint(args))),
        "println" => Ok(Value::Str(sprintln(args))),
        "printf" => {
            let Some((Value::Str(format), rest)) = args.split_first() else {
                return Err("printf: format must be a string".to_string());
            };
            Ok(Value::Str(sprintf(format, rest)))
        },
        "html" => Ok(Value::Str(html_escape(&sprint(args)))),
        "urlquery" => Ok(Value::Str(query_escape(&sprint(args)))),
        "js" => Ok(Value::Str(js_escape(&sprint(args)))),
        other => Err(format!("function {other:?} not defined")),
    }
}

fn arg_count(name: &str, want: usize, got: usize) -> String {
    format!("wrong number of args for {name}: want {want} got {got}")
}

/// `and` returns the first falsy argument (or the last); `or` the first
/// truthy one (or the last).
fn truth_chain(args: &[Value], stop_on: bool) -> Value {
    args.iter()
        .find(|arg| arg.is_truthy() == stop_on)
        .or_else(|| args.last())
        .cloned()
        .unwrap_or(Value::Nil)
}

fn binary<F>(name: &str, args: &[Value], cmp: F) -> FuncResult
where
    F: Fn(&Value, &Value) -> Result<bool, String>,
{
    let [a, b] = args else {
        return Err(arg_count(name, 2, args.len()));
    };
    cmp(a, b).map(Value::Bool)
}

fn length(value: &Value) -> FuncResult {
    let n = match value {
        Value::Str(s) => s.len(),
        Value::List(items) => items.len(),
        Value::Nil => return Err("len of nil pointer".to_string()),
        other => return Err(format!("len of type {}", other.kind())),
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| "len overflows int".to_string())
}

fn index(item: &Value, idx: &Value) -> FuncResult {
    let Value::Int(i) = idx else {
        return Err(format!("cannot index slice/array with type {}", idx.kind()));
    };
    let position = usize::try_from(*i).map_err(|_| format!("index out of range: {i}"))?;
    match item {
        Value::List(items) => items
            .get(position)
            .cloned()
            .ok_or_else(|| format!("index out of range: {i}")),
        Value::Str(s) => s
            .as_bytes()
            .get(position)
            .map(|b| Value::Int(i64::from(*b)))
            .ok_or_else(|| format!("index out of range: {i}")),
        Value::Nil => Err("index of untyped nil".to_string()),
        other => Err(format!("can't index item of type {}", other.kind())),
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::List(_) | Value::Struct { .. }, _) | (_, Value::List(_) | Value::Struct { .. }) => {
            Err("non-comparable type".to_string())
        },
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        _ => Err("incompatible types for comparison".to_string()),
    }
}

fn order(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Int(_), Value::Str(_)) | (Value::Str(_), Value::Int(_)) => {
            Err("incompatible types for comparison".to_string())
        },
        _ => Err("invalid type for comparison".to_string()),
    }
}

/// Space operands apart when neither side is a string.
pub(crate) fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    let mut prev_is_str = true;
    for (i, arg) in args.iter().enumerate() {
        let is_str = matches!(arg, Value::Str(_));
        if i > 0 && !is_str && !prev_is_str {
            out.push(' ');
        }
        let _ = write!(out, "{arg}");
        prev_is_str = is_str;
    }
    out
}

fn sprintln(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

fn bad_verb(verb: char, arg: &Value) -> String {
    match arg {
        Value::Nil => format!("%!{verb}(<nil>)"),
        other => format!("%!{verb}({}={other})", other.kind()),
    }
}

fn format_arg(out: &mut String, verb: char, plus: bool, arg: &Value) {
    let _ = match (verb, arg) {
        ('v', _) if plus => write!(out, "{}", arg.to_verbose_string()),
        ('v', _) => write!(out, "{arg}"),
        ('s', Value::Str(_) | Value::List(_) | Value::Struct { .. }) => write!(out, "{arg}"),
        ('d', Value::Int(n)) => write!(out, "{n}"),
        ('t', Value::Bool(b)) => write!(out, "{b}"),
        ('q', Value::Str(s)) => write!(out, "{s:?}"),
        ('q', Value::Int(n)) => match u32::try_from(*n).ok().and_then(char::from_u32) {
            Some(c) => write!(out, "'{c}'"),
            None => write!(out, "'\u{FFFD}'"),
        },
        ('x', Value::Int(n)) if *n < 0 => write!(out, "-{:x}", n.unsigned_abs()),
        ('x', Value::Int(n)) => write!(out, "{n:x}"),
        ('x', Value::Str(s)) => s.bytes().try_for_each(|b| write!(out, "{b:02x}")),
        _ => {
            out.push_str(&bad_verb(verb, arg));
            Ok(())
        },
    };
}

/// Flags and width between `%` and the verb.
#[derive(Default)]
#[allow(clippy::struct_excessive_bools)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: usize,
}

impl Spec {
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Self {
        let mut spec = Self::default();
        while let Some(flag) = chars.next_if(|c| matches!(c, '-' | '+' | ' ' | '0' | '#')) {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                _ => spec.sharp = true,
            }
        }
        while let Some(digit) = chars
            .next_if(char::is_ascii_digit)
            .and_then(|c| c.to_digit(10))
            .and_then(|d| usize::try_from(d).ok())
        {
            spec.width = spec.width.saturating_mul(10).saturating_add(digit);
        }
        spec
    }

    /// Format `arg`, then apply sign, `0x` prefix and padding.
    fn write(&self, out: &mut String, verb: char, arg: &Value) {
        let mut body = String::new();
        format_arg(&mut body, verb, self.plus, arg);

        let numeric = matches!(arg, Value::Int(_)) && matches!(verb, 'd' | 'v' | 'x');
        let (sign, digits) = match body.strip_prefix('-') {
            Some(rest) if numeric => ("-", rest),
            _ if numeric && self.plus => ("+", body.as_str()),
            _ if numeric && self.space => (" ", body.as_str()),
            _ => ("", body.as_str()),
        };
        let prefix = if self.sharp && verb == 'x' && matches!(arg, Value::Int(_) | Value::Str(_)) {
            "0x"
        } else {
            ""
        };

        let len = sign
            .len()
            .saturating_add(prefix.len())
            .saturating_add(digits.chars().count());
        let pad = self.width.saturating_sub(len);

        if self.minus {
            let _ = write!(out, "{sign}{prefix}{digits}{}", " ".repeat(pad));
        } else if self.zero && numeric {
            let _ = write!(out, "{sign}{prefix}{}{digits}", "0".repeat(pad));
        } else {
            let fill = if self.zero { "0" } else { " " };
            let _ = write!(out, "{}{sign}{prefix}{digits}", fill.repeat(pad));
        }
    }
}

/// `fmt.Sprintf` for the verbs templates commonly use.
pub(crate) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut remaining = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let spec = Spec::parse(&mut chars);
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        match remaining.next() {
            None => {
                let _ = write!(out, "%!{verb}(MISSING)");
            },
            Some(arg) if matches!(verb, 'v' | 's' | 'd' | 't' | 'q' | 'x') => {
                spec.write(&mut out, verb, arg);
            },
            Some(arg) => out.push_str(&bad_verb(verb, arg)),
        }
    }

    let extra: Vec<String> = remaining
        .map(|arg| match arg {
            Value::Nil => "<nil>".to_string(),
            other => format!("{}={other}", other.kind()),
        })
        .collect();
    if !extra.is_empty() {
        let _ = write!(out, "%!(EXTRA {})", extra.join(", "));
    }
    out
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

/// Query-string escaping: spaces become `+`, unreserved bytes pass through.
fn query_escape(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' | '>' | '&' | '=' => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            },
            c if c < ' ' || c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            },
            c => out.push(c),
        }
    }
    out
}
