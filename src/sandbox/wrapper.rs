//! Turns a submitted snippet into a self-contained program that calls `run`

use serde_json::Value;

/// Entry point every snippet is expected to define
pub const ENTRY_FUNCTION: &str = "run";

/// A snippet plus the footer that invokes its entry function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedUnit {
    source: String,
}

impl WrappedUnit {
    /// Full program text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Append the invocation footer to `code`.
///
/// `args` travel as a JSON document inside a Python string literal and are
/// decoded with `json.loads`, so `true`, `false`, `null` and nested objects
/// arrive intact. A JSON string literal is also a valid Python string literal
/// (serde_json never emits `\/`, and non-ASCII text stays raw UTF-8).
/// `code` itself is not inspected: a snippet without `run` fails at runtime.
pub fn wrap(code: &str, args: &[Value]) -> WrappedUnit {
    let document = Value::Array(args.to_vec()).to_string();
    let literal = Value::String(document).to_string();

    let mut source = String::with_capacity(code.len() + literal.len() + 160);
    source.push_str(code);
    if !code.ends_with('\n') {
        source.push('\n');
    }
    source.push('\n');
    source.push_str("import json as _coderun_json\n");
    source.push_str(&format!("_coderun_args = _coderun_json.loads({})\n", literal));
    source.push_str(&format!("_coderun_result = {}(*_coderun_args)\n", ENTRY_FUNCTION));
    source.push_str("print(_coderun_result)\n");

    WrappedUnit { source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn literal_line(unit: &WrappedUnit) -> &str {
        unit.as_str()
            .lines()
            .find(|l| l.starts_with("_coderun_args = "))
            .unwrap()
    }

    #[test]
    fn test_code_is_preserved_verbatim() {
        let code = "def run(a, b):\n    return a + b";
        let unit = wrap(code, &[json!(2), json!(3)]);
        assert!(unit.as_str().starts_with(code));
        assert!(unit.as_str().contains("_coderun_result = run(*_coderun_args)\n"));
        assert!(unit.as_str().ends_with("print(_coderun_result)\n"));
    }

    #[test]
    fn test_footer_starts_on_a_fresh_line() {
        let unit = wrap("def run(): return 1", &[]);
        assert!(unit.as_str().starts_with("def run(): return 1\n\nimport json"));
    }

    #[test]
    fn test_args_are_embedded_as_json_string() {
        let unit = wrap("def run(*a): return a", &[json!(true), json!(null), json!({"k": [1, 2.5]})]);
        assert_eq!(
            literal_line(&unit),
            r#"_coderun_args = _coderun_json.loads("[true,null,{\"k\":[1,2.5]}]")"#
        );
    }

    #[test]
    fn test_quotes_and_newlines_stay_inside_the_literal() {
        let unit = wrap("def run(s): return s", &[json!("line\n\"quoted\" 'single' \\ end")]);
        let line = literal_line(&unit);
        // The literal never spans lines and every quote is escaped.
        assert!(!line.contains('\n'));
        assert!(line.contains(r#"\"line\\n\\\"quoted\\\" 'single' \\\\ end\""#));
    }

    #[test]
    fn test_large_integers_keep_every_digit() {
        let args: Vec<Value> =
            serde_json::from_str("[12345678901234567890123, 0.1]").unwrap();
        let unit = wrap("def run(*a): return a", &args);
        assert_eq!(
            literal_line(&unit),
            r#"_coderun_args = _coderun_json.loads("[12345678901234567890123,0.1]")"#
        );
    }

    #[test]
    fn test_empty_args() {
        let unit = wrap("def run(): return None", &[]);
        assert_eq!(literal_line(&unit), r#"_coderun_args = _coderun_json.loads("[]")"#);
    }
}
