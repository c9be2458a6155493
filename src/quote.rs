//! Quoting of names and values in messages, compatible with existing tooling
//! output (Go's `%q` verb).

/// Double-quote `s`, escaping control characters as `\n`, `\x1b`, `\u0085`.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote every value, space separated inside brackets: `["a" "b"]`.
pub(crate) fn quote_list<S: AsRef<str>>(values: &[S]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v.as_ref())).collect();
    format!("[{}]", quoted.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("a-test"), "\"a-test\"");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("héllo"), "\"héllo\"");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("say \"hi\"\\"), r#""say \"hi\"\\""#);
        assert_eq!(quote("a\tb\nc"), r#""a\tb\nc""#);
        assert_eq!(quote("\x1b[0m"), r#""\x1b[0m""#);
        assert_eq!(quote("\x7f"), r#""\x7f""#);
        assert_eq!(quote("\u{85}"), r#""\u0085""#);
        assert_eq!(quote("\x07\x08\x0b\x0c\r"), r#""\a\b\v\f\r""#);
    }

    #[test]
    fn test_quote_list() {
        assert_eq!(quote_list(&["x", "y"]), r#"["x" "y"]"#);
        assert_eq!(quote_list::<&str>(&[]), "[]");
        assert_eq!(quote_list(&["e\x1b".to_string()]), r#"["e\x1b"]"#);
    }
}
