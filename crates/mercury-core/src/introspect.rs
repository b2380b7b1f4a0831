//! Interpreter snippets used to describe the kernel namespace.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Prints a JSON object describing every public, non-module name.
pub(crate) const VARIABLES_SNIPPET: &str = r#"
def _mercury_variables():
    import json, types
    described = {}
    for name, obj in list(globals().items()):
        if name.startswith('_') or isinstance(obj, (types.ModuleType, types.FunctionType, types.BuiltinFunctionType)):
            continue
        try:
            kind = type(obj).__name__
            if kind in ('int', 'float', 'str', 'bool', 'list', 'dict', 'tuple', 'set'):
                described[name] = {'type': kind, 'value': repr(obj)[:100]}
            elif hasattr(obj, 'shape'):
                described[name] = {'type': kind, 'shape': str(obj.shape)}
            elif hasattr(obj, '__len__'):
                described[name] = {'type': kind, 'length': len(obj)}
            else:
                described[name] = {'type': kind}
        except Exception:
            pass
    print(json.dumps(described))
_mercury_variables()
del _mercury_variables
"#;

const INSPECT_TEMPLATE: &str = r#"
def _mercury_inspect():
    import json
    try:
        obj = {NAME}
        info = {'name': '{NAME}', 'type': type(obj).__name__, 'repr': repr(obj)[:500]}
        if hasattr(obj, 'shape'):
            info['shape'] = str(obj.shape)
        if hasattr(obj, 'dtype'):
            info['dtype'] = str(obj.dtype)
        if hasattr(obj, '__len__'):
            info['length'] = len(obj)
        if hasattr(obj, 'columns'):
            info['columns'] = [str(c) for c in list(obj.columns)[:20]]
        if hasattr(obj, 'head'):
            info['head'] = obj.head().to_string()
        print(json.dumps(info, default=str))
    except Exception as e:
        print(json.dumps({'error': str(e)}))
_mercury_inspect()
del _mercury_inspect
"#;

/// What an introspection call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    /// JSON reported by the kernel.
    Value(Value),
    /// The kernel printed something that is not JSON.
    Text(String),
    /// The execution failed or the kernel reported an error.
    Failed(String),
}

/// Check that `name` is a dotted path of Python identifiers.
pub fn validate_variable_path(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        });

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("Invalid variable name: {}", name)))
    }
}

/// Inspection snippet for a validated variable path.
pub(crate) fn inspect_snippet(name: &str) -> Result<String> {
    validate_variable_path(name)?;
    Ok(INSPECT_TEMPLATE.replace("{NAME}", name))
}

/// Parse the variables listing; anything but a JSON object is an empty map.
pub(crate) fn parse_variables(output: &str) -> Map<String, Value> {
    match serde_json::from_str(output.trim()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Parse the inspection output.
pub(crate) fn parse_inspection(output: &str) -> Inspection {
    match serde_json::from_str::<Value>(output.trim()) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(error) => Inspection::Failed(match error {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            }),
            None => Inspection::Value(Value::Object(map)),
        },
        Ok(other) => Inspection::Value(other),
        Err(_) => Inspection::Text(output.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_paths() {
        for name in ["df", "_private", "model.weights", "x1.y_2"] {
            assert!(validate_variable_path(name).is_ok(), "{name}");
        }
        for name in ["", "1x", "a.", ".a", "a b", "x; import os", "x[0]", "f()", "a..b"] {
            assert!(validate_variable_path(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_inspect_snippet_embeds_name() {
        let code = inspect_snippet("df.columns").unwrap();
        assert!(code.contains("obj = df.columns\n"));
        assert!(code.contains("'name': 'df.columns'"));
        assert!(inspect_snippet("__import__('os').system('ls')").is_err());
    }

    #[test]
    fn test_parse_variables() {
        let map = parse_variables("{\"x\": {\"type\": \"int\", \"value\": \"1\"}}\n");
        assert_eq!(map["x"]["type"], "int");
        assert!(parse_variables("not json").is_empty());
        assert!(parse_variables("[1, 2]").is_empty());
    }

    #[test]
    fn test_parse_inspection() {
        assert_eq!(
            parse_inspection("{\"error\": \"name 'y' is not defined\"}"),
            Inspection::Failed("name 'y' is not defined".to_string())
        );
        assert!(matches!(
            parse_inspection("{\"name\": \"x\", \"type\": \"int\"}"),
            Inspection::Value(Value::Object(_))
        ));
        assert_eq!(parse_inspection("oops"), Inspection::Text("oops".to_string()));
    }
}
