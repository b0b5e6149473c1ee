//! Static discovery of the modules a snippet imports

use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::python::PythonRuntime;

/// Walks the whole syntax tree, nested scopes included, and prints the sorted
/// root names as a JSON list. A syntax error makes the script exit non-zero.
const EXTRACT_SCRIPT: &str = r#"
import ast, json, sys
tree = ast.parse(sys.stdin.read())
names = set()
for node in ast.walk(tree):
    if isinstance(node, ast.Import):
        for alias in node.names:
            names.add(alias.name.split(".")[0])
    elif isinstance(node, ast.ImportFrom) and node.module:
        names.add(node.module.split(".")[0])
print(json.dumps(sorted(names)))
"#;

/// List the top-level module names referenced by `code` without executing it.
///
/// Best effort: unparseable code, or an interpreter that cannot be launched,
/// yields an empty set. Unparseable code fails again at execution time, where
/// the caller gets the interpreter's own error text.
pub async fn extract_imports(runtime: &PythonRuntime, code: &str) -> BTreeSet<String> {
    let output = match runtime.run_script(EXTRACT_SCRIPT, &[], Some(code)).await {
        Ok(output) => output,
        Err(e) => {
            warn!("Failed to extract imports: {}", e);
            return BTreeSet::new();
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            "Failed to extract imports: {}",
            stderr.trim().lines().last().unwrap_or("parse error")
        );
        return BTreeSet::new();
    }

    match serde_json::from_slice::<BTreeSet<String>>(&output.stdout) {
        Ok(modules) => {
            debug!("Extracted imports: {:?}", modules);
            modules
        }
        Err(e) => {
            warn!("Unreadable import list from interpreter: {}", e);
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_top_level_and_dotted_imports() {
        let runtime = PythonRuntime::new("python3");
        let code = "import os\nimport xml.etree.ElementTree as ET, json\nfrom collections.abc import Mapping\n";
        assert_eq!(
            extract_imports(&runtime, code).await,
            set(&["collections", "json", "os", "xml"])
        );
    }

    #[tokio::test]
    async fn test_nested_scopes_and_duplicates() {
        let runtime = PythonRuntime::new("python3");
        let code = r#"
def run():
    import requests
    class Inner:
        def method(self):
            from requests.adapters import HTTPAdapter
            return HTTPAdapter
    try:
        import numpy as np
    except ImportError:
        np = None
    return np
"#;
        assert_eq!(extract_imports(&runtime, code).await, set(&["numpy", "requests"]));
    }

    #[tokio::test]
    async fn test_relative_imports() {
        let runtime = PythonRuntime::new("python3");
        let code = "from . import sibling\nfrom .helpers import tool\n";
        assert_eq!(extract_imports(&runtime, code).await, set(&["helpers"]));
    }

    #[tokio::test]
    async fn test_imports_are_not_executed() {
        let runtime = PythonRuntime::new("python3");
        let code = "raise SystemExit(3)\nimport json\n";
        assert_eq!(extract_imports(&runtime, code).await, set(&["json"]));
    }

    #[tokio::test]
    async fn test_syntax_error_yields_empty_set() {
        let runtime = PythonRuntime::new("python3");
        let code = "def run(:\n    import requests\n";
        assert!(extract_imports(&runtime, code).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_interpreter_yields_empty_set() {
        let runtime = PythonRuntime::new("/nonexistent/python-for-tests");
        assert!(extract_imports(&runtime, "import json").await.is_empty());
    }
}
