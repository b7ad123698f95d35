//! Builtin functions available to the evaluator.
//!
//! Only pure functions whose result depends on their arguments alone are
//! provided. Callers must not pass unknown arguments; the evaluator
//! short-circuits those to an unknown result.

use crate::value::{format_number, Value};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `format` verbs: `%%`, or `%s`, `%d`, `%v`, `%q`, `%t`, `%f` with optional precision.
static FORMAT_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(%|(?:\.(\d+))?([sdvqft]))").expect("Invalid regex"));

/// Names of the supported builtins.
pub const BUILTINS: &[&str] = &[
    "lower", "upper", "trimspace", "title", "join", "split", "concat", "length", "coalesce",
    "contains", "lookup", "keys", "values", "tostring", "tonumber", "tobool", "format", "min",
    "max",
];

/// Returns true if `name` is a supported builtin.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Call a builtin. Returns `None` for unsupported functions.
#[must_use]
pub fn call(name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    let result = match name {
        "lower" => unary_string(args).map(|s| Value::String(s.to_lowercase())),
        "upper" => unary_string(args).map(|s| Value::String(s.to_uppercase())),
        "trimspace" => unary_string(args).map(|s| Value::String(s.trim().to_string())),
        "title" => unary_string(args).map(|s| Value::String(title(&s))),
        "join" => join(args),
        "split" => split(args),
        "concat" => concat(args),
        "length" => length(args),
        "coalesce" => coalesce(args),
        "contains" => contains(args),
        "lookup" => lookup(args),
        "keys" => map_arg(args).map(|m| Value::List(m.keys().cloned().map(Value::String).collect())),
        "values" => map_arg(args).map(|m| Value::List(m.values().cloned().collect())),
        "tostring" => tostring(args),
        "tonumber" => arity(args, 1).and_then(|()| scalar::<f64>(&args[0])).map(Value::Number),
        "tobool" => arity(args, 1).and_then(|()| scalar::<bool>(&args[0])).map(Value::Bool),
        "format" => format(args),
        "min" => numbers(args).map(|ns| Value::Number(ns.into_iter().fold(f64::INFINITY, f64::min))),
        "max" => numbers(args).map(|ns| Value::Number(ns.into_iter().fold(f64::NEG_INFINITY, f64::max))),
        _ => return None,
    };
    Some(result)
}

fn arity(args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} argument(s), got {}", args.len()))
    }
}

fn scalar<T: crate::value::FromValue>(value: &Value) -> Result<T, String> {
    value.to_native::<T>().map_err(|e| e.to_string())
}

fn unary_string(args: &[Value]) -> Result<String, String> {
    arity(args, 1)?;
    scalar::<String>(&args[0])
}

fn list_arg(value: &Value) -> Result<&[Value], String> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(format!("list required, but got {}", other.type_name())),
    }
}

fn map_arg(args: &[Value]) -> Result<&BTreeMap<String, Value>, String> {
    arity(args, 1)?;
    match &args[0] {
        Value::Map(map) => Ok(map),
        other => Err(format!("map required, but got {}", other.type_name())),
    }
}

fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

fn join(args: &[Value]) -> Result<Value, String> {
    if args.len() < 2 {
        return Err("expected a separator and at least one list".to_string());
    }
    let sep = scalar::<String>(&args[0])?;
    let mut parts = Vec::new();
    for list in &args[1..] {
        for item in list_arg(list)? {
            parts.push(scalar::<String>(item)?);
        }
    }
    Ok(Value::String(parts.join(&sep)))
}

fn split(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    let sep = scalar::<String>(&args[0])?;
    let s = scalar::<String>(&args[1])?;
    if s.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    Ok(Value::List(s.split(sep.as_str()).map(Value::from).collect()))
}

fn concat(args: &[Value]) -> Result<Value, String> {
    let mut out = Vec::new();
    for list in args {
        out.extend(list_arg(list)?.iter().cloned());
    }
    Ok(Value::List(out))
}

fn length(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    #[allow(clippy::cast_precision_loss)]
    let n = match &args[0] {
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => return Err(format!("cannot take the length of {}", other.type_name())),
    } as f64;
    Ok(Value::Number(n))
}

fn coalesce(args: &[Value]) -> Result<Value, String> {
    args.iter()
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
        .cloned()
        .ok_or_else(|| "no non-null, non-empty-string arguments".to_string())
}

fn contains(args: &[Value]) -> Result<Value, String> {
    arity(args, 2)?;
    Ok(Value::Bool(list_arg(&args[0])?.contains(&args[1])))
}

fn lookup(args: &[Value]) -> Result<Value, String> {
    if !(2..=3).contains(&args.len()) {
        return Err(format!("expected 2 or 3 arguments, got {}", args.len()));
    }
    let map = map_arg(&args[..1])?;
    let key = scalar::<String>(&args[1])?;
    match (map.get(&key), args.get(2)) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(format!("the given key \"{key}\" does not exist in the map")),
    }
}

fn tostring(args: &[Value]) -> Result<Value, String> {
    arity(args, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => scalar::<String>(other).map(Value::String),
    }
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, String> {
    if args.is_empty() {
        return Err("expected at least one number".to_string());
    }
    args.iter().map(scalar::<f64>).collect()
}

fn format(args: &[Value]) -> Result<Value, String> {
    let (spec, rest) = args
        .split_first()
        .ok_or_else(|| "expected a format string".to_string())?;
    let spec = scalar::<String>(spec)?;
    let mut out = String::with_capacity(spec.len());
    let mut next = rest.iter();
    let mut last = 0;
    for caps in FORMAT_VERB.captures_iter(&spec) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&spec[last..whole.start()]);
        last = whole.end();
        if &caps[1] == "%" {
            out.push('%');
            continue;
        }
        let arg = next
            .next()
            .ok_or_else(|| format!("not enough arguments for {}", whole.as_str()))?;
        match &caps[3] {
            "d" => out.push_str(&scalar::<i64>(arg)?.to_string()),
            "f" => {
                let precision: usize = caps.get(2).and_then(|p| p.as_str().parse().ok()).unwrap_or(6);
                out.push_str(&format!("{:.*}", precision, scalar::<f64>(arg)?));
            }
            "t" => out.push_str(&scalar::<bool>(arg)?.to_string()),
            "q" => out.push_str(&format!("{:?}", scalar::<String>(arg)?)),
            "v" => match arg {
                Value::List(_) | Value::Map(_) => out.push_str(&arg.to_string()),
                Value::Number(n) => out.push_str(&format_number(*n)),
                other => out.push_str(&scalar::<String>(other)?),
            },
            _ => out.push_str(&scalar::<String>(arg)?),
        }
    }
    out.push_str(&spec[last..]);
    if next.next().is_some() {
        return Err("too many arguments for the format string".to_string());
    }
    Ok(Value::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|i| s(i)).collect())
    }

    fn ok(name: &str, args: &[Value]) -> Value {
        call(name, args).unwrap().unwrap()
    }

    #[test_case("lower", "App-Server", "app-server")]
    #[test_case("upper", "db", "DB")]
    #[test_case("trimspace", "  pg  \n", "pg")]
    #[test_case("title", "hello big world", "Hello Big World")]
    fn test_string_functions(name: &str, input: &str, expected: &str) {
        assert_eq!(ok(name, &[s(input)]), s(expected));
    }

    #[test]
    fn test_collection_functions() {
        assert_eq!(ok("join", &[s("-"), list(&["a", "b"])]), s("a-b"));
        assert_eq!(ok("split", &[s(","), s("a,b")]), list(&["a", "b"]));
        assert_eq!(ok("split", &[s(","), s("")]), Value::List(vec![]));
        assert_eq!(ok("concat", &[list(&["a"]), list(&["b"])]), list(&["a", "b"]));
        assert_eq!(ok("length", &[list(&["a", "b"])]), Value::Number(2.0));
        assert_eq!(ok("contains", &[list(&["a", "b"]), s("b")]), Value::Bool(true));
        assert_eq!(ok("coalesce", &[Value::Null, s(""), s("x")]), s("x"));
    }

    #[test]
    fn test_map_functions() {
        let mut m = BTreeMap::new();
        m.insert("b".to_string(), s("2"));
        m.insert("a".to_string(), s("1"));
        let map = Value::Map(m);
        assert_eq!(ok("keys", &[map.clone()]), list(&["a", "b"]));
        assert_eq!(ok("values", &[map.clone()]), list(&["1", "2"]));
        assert_eq!(ok("lookup", &[map.clone(), s("a")]), s("1"));
        assert_eq!(ok("lookup", &[map.clone(), s("z"), s("d")]), s("d"));
        assert!(call("lookup", &[map, s("z")]).unwrap().is_err());
    }

    #[test]
    fn test_conversions_and_numbers() {
        assert_eq!(ok("tonumber", &[s("42")]), Value::Number(42.0));
        assert_eq!(ok("tobool", &[s("true")]), Value::Bool(true));
        assert_eq!(ok("tostring", &[Value::Number(3.0)]), s("3"));
        assert_eq!(ok("min", &[Value::Number(3.0), s("1")]), Value::Number(1.0));
        assert_eq!(ok("max", &[Value::Number(3.0), Value::Number(7.5)]), Value::Number(7.5));
        assert!(call("tonumber", &[s("abc")]).unwrap().is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(
            ok("format", &[s("%s-%d-%%-%q"), s("db"), Value::Number(3.0), s("x")]),
            s("db-3-%-\"x\"")
        );
        assert_eq!(ok("format", &[s("%.2f"), Value::Number(1.0)]), s("1.00"));
        assert!(call("format", &[s("%s %s"), s("one")]).unwrap().is_err());
        assert!(call("format", &[s("%s"), s("one"), s("two")]).unwrap().is_err());
    }

    #[test]
    fn test_unsupported_function() {
        assert!(call("file", &[s("x")]).is_none());
        assert!(!is_builtin("timestamp"));
        assert!(is_builtin("lookup"));
    }
}
