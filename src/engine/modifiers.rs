//! Standard template modifiers.
//!
//! | modifier            | arity  | effect                                                  |
//! |---------------------|--------|---------------------------------------------------------|
//! | `upper`, `lower`    | 0      | case change (per item on lists)                         |
//! | `default(x)`        | 1      | `x` when the value is absent or empty                   |
//! | `format(spec)`      | 1      | printf-style `%s %d %f %x %X` with flags/width/precision |
//! | `replace(a, b)`     | 2      | literal substring replacement                           |
//! | `short`             | 0      | IRI to CURIE                                            |
//! | `prefix`, `suffix`  | 0      | prefix name / local name of an IRI                      |
//! | `list_item(n)`      | 1      | n-th list item, 1-based                                 |
//! | `flatten(s, l, r)`  | 0 to 3 | join list items with `s`, wrapped in `l` and `r`        |

use super::format::{ModifierFn, Value};
use super::registry::Signature;
use crate::prefix::PrefixManager;
use std::rc::Rc;
use tracing::warn;

pub(crate) fn standard() -> Vec<(&'static str, Signature, ModifierFn)> {
    vec![
        ("upper", signature!(""), modifier(|v, _, _| v.map_text(|s| s.to_uppercase()))),
        ("lower", signature!(""), modifier(|v, _, _| v.map_text(|s| s.to_lowercase()))),
        ("default", signature!("S"), modifier(default_value)),
        ("format", signature!("S"), modifier(printf_format)),
        ("replace", signature!("SS"), modifier(replace)),
        ("short", signature!(""), modifier(|v, _, p| v.map_text(|s| p.shorten(&s)))),
        ("prefix", signature!(""), modifier(|v, _, p| v.map_text(|s| p.prefix_name(&s)))),
        ("suffix", signature!(""), modifier(|v, _, p| v.map_text(|s| p.local_name(&s)))),
        ("list_item", signature!("S"), modifier(list_item)),
        ("flatten", signature!("S?S?S?"), modifier(flatten)),
    ]
}

fn modifier(f: impl Fn(Value, &[String], &PrefixManager) -> Value + 'static) -> ModifierFn {
    Rc::new(f)
}

fn default_value(value: Value, args: &[String], _: &PrefixManager) -> Value {
    if value.is_empty() { Value::Text(args[0].clone()) } else { value }
}

fn replace(value: Value, args: &[String], _: &PrefixManager) -> Value {
    let (find, with) = (&args[0], &args[1]);
    if find.is_empty() {
        return value;
    }
    value.map_text(|s| s.replace(find.as_str(), with))
}

fn list_item(value: Value, args: &[String], _: &PrefixManager) -> Value {
    let Value::List(items) = value else {
        return value;
    };
    match args[0].trim().parse::<usize>() {
        Ok(n) if n >= 1 => items.get(n - 1).map_or(Value::Null, |item| Value::Text(item.clone())),
        Ok(_) => Value::Null,
        Err(_) => Value::List(items),
    }
}

fn flatten(value: Value, args: &[String], _: &PrefixManager) -> Value {
    let separator = args.first().map_or(", ", String::as_str);
    let start = args.get(1).map_or("", String::as_str);
    let end = args.get(2).map_or("", String::as_str);
    match value {
        Value::List(items) => Value::Text(format!("{start}{}{end}", items.join(separator))),
        other => other,
    }
}

fn printf_format(value: Value, args: &[String], _: &PrefixManager) -> Value {
    let spec = &args[0];
    let apply = |s: String| match printf(spec, &s) {
        Some(out) => out,
        None => {
            warn!(format = %spec, value = %s, "format modifier does not apply, value left unchanged");
            s
        }
    };
    value.map_text(apply)
}

/// Render `value` through a format string with exactly one conversion.
fn printf(spec: &str, value: &str) -> Option<String> {
    let re = regex!(r"%(?:%|([-0+ #]*)(\d*)(?:\.(\d+))?([sdfxX]))");
    let mut out = String::new();
    let mut last = 0;
    let mut converted = false;
    for caps in re.captures_iter(spec) {
        let whole = caps.get(0)?;
        out.push_str(&spec[last..whole.start()]);
        last = whole.end();
        let Some(conversion) = caps.get(4) else {
            out.push('%');
            continue;
        };
        if converted {
            return None;
        }
        converted = true;
        let flags = caps.get(1).map_or("", |m| m.as_str());
        let width = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()).unwrap_or(0);
        let precision = caps.get(3).and_then(|m| m.as_str().parse::<usize>().ok());
        out.push_str(&convert(flags, width, precision, conversion.as_str(), value)?);
    }
    out.push_str(&spec[last..]);
    converted.then_some(out)
}

fn convert(flags: &str, width: usize, precision: Option<usize>, conversion: &str, value: &str) -> Option<String> {
    let value = value.trim();
    let (sign, digits, numeric) = match conversion {
        "s" => {
            let text: String = match precision {
                Some(p) => value.chars().take(p).collect(),
                None => value.to_string(),
            };
            (String::new(), text, false)
        }
        "d" => {
            let n: i64 = value.parse().ok()?;
            (sign_of(n < 0, flags), n.unsigned_abs().to_string(), true)
        }
        "f" => {
            let n: f64 = value.parse().ok()?;
            (sign_of(n.is_sign_negative(), flags), format!("{:.*}", precision.unwrap_or(6), n.abs()), true)
        }
        _ => {
            let n: i64 = value.parse().ok()?;
            let magnitude = n.unsigned_abs();
            let hex = if conversion == "X" { format!("{magnitude:X}") } else { format!("{magnitude:x}") };
            let alt = if flags.contains('#') { if conversion == "X" { "0X" } else { "0x" } } else { "" };
            (format!("{}{alt}", sign_of(n < 0, flags)), hex, true)
        }
    };

    let len = sign.chars().count() + digits.chars().count();
    let pad = width.saturating_sub(len);
    Some(if flags.contains('-') {
        format!("{sign}{digits}{}", " ".repeat(pad))
    } else if flags.contains('0') && numeric {
        format!("{sign}{}{digits}", "0".repeat(pad))
    } else {
        format!("{}{sign}{digits}", " ".repeat(pad))
    })
}

fn sign_of(negative: bool, flags: &str) -> String {
    if negative {
        "-".into()
    } else if flags.contains('+') {
        "+".into()
    } else if flags.contains(' ') {
        " ".into()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: Value, args: &[&str]) -> Value {
        let mut pm = PrefixManager::new();
        pm.add("ORGENT", "https://example.org/entities/");
        let (_, signature, f) = standard().into_iter().find(|(n, _, _)| *n == name).unwrap();
        assert!(signature.accepts(args.len()));
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        f(value, &args, &pm)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn case_modifiers_distribute_over_lists() {
        assert_eq!(apply("upper", list(&["a", "b"]), &[]), list(&["A", "B"]));
        assert_eq!(apply("lower", text("MiXed"), &[]), text("mixed"));
        assert_eq!(apply("upper", Value::Null, &[]), Value::Null);
    }

    #[test]
    fn default_replaces_empty_values_only() {
        assert_eq!(apply("default", Value::Null, &["x"]), text("x"));
        assert_eq!(apply("default", text(""), &["x"]), text("x"));
        assert_eq!(apply("default", list(&[]), &["x"]), text("x"));
        assert_eq!(apply("default", text("set"), &["x"]), text("set"));
    }

    #[test]
    fn printf_subset() {
        assert_eq!(printf("%05.2f", "3.14159"), Some("03.14".into()));
        assert_eq!(printf("[%-6s]", "ab"), Some("[ab    ]".into()));
        assert_eq!(printf("%+d", "42"), Some("+42".into()));
        assert_eq!(printf("%04d", "-7"), Some("-007".into()));
        assert_eq!(printf("%#x", "255"), Some("0xff".into()));
        assert_eq!(printf("%X%%", "255"), Some("FF%".into()));
        assert_eq!(printf("%.3s", "abcdef"), Some("abc".into()));
        assert_eq!(printf("%d", "abc"), None);
        assert_eq!(printf("no conversion", "abc"), None);
        assert_eq!(printf("%s %s", "abc"), None);

        assert_eq!(apply("format", text("0.5"), &["%.2f"]), text("0.50"));
        assert_eq!(apply("format", text("n/a"), &["%d"]), text("n/a"));
    }

    #[test]
    fn replace_is_literal() {
        assert_eq!(apply("replace", text("a.b.c"), &[".", "/"]), text("a/b/c"));
        assert_eq!(apply("replace", list(&["x-1", "y-2"]), &["-", ""]), list(&["x1", "y2"]));
        assert_eq!(apply("replace", text("abc"), &["", "z"]), text("abc"));
    }

    #[test]
    fn iri_modifiers_use_prefixes() {
        assert_eq!(apply("short", text("https://example.org/entities/1"), &[]), text("ORGENT:1"));
        assert_eq!(apply("prefix", text("https://example.org/entities/1"), &[]), text("ORGENT"));
        let iris = list(&["https://example.org/entities/1", "http://x.org/a#b"]);
        assert_eq!(apply("suffix", iris, &[]), list(&["1", "b"]));
    }

    #[test]
    fn list_item_is_one_based() {
        let items = list(&["a", "b", "c"]);
        assert_eq!(apply("list_item", items.clone(), &["1"]), text("a"));
        assert_eq!(apply("list_item", items.clone(), &["3"]), text("c"));
        assert_eq!(apply("list_item", items.clone(), &["4"]), Value::Null);
        assert_eq!(apply("list_item", items.clone(), &["0"]), Value::Null);
        assert_eq!(apply("list_item", items.clone(), &["two"]), items);
        assert_eq!(apply("list_item", text("a"), &["1"]), text("a"));
    }

    #[test]
    fn flatten_joins_lists() {
        let items = list(&["a", "b"]);
        assert_eq!(apply("flatten", items.clone(), &[]), text("a, b"));
        assert_eq!(apply("flatten", items.clone(), &["|"]), text("a|b"));
        assert_eq!(apply("flatten", items, &[";", "(", ")"]), text("(a;b)"));
        assert_eq!(apply("flatten", text("a"), &[]), text("a"));
    }
}
