//! Regular-expression operators (feature `regex`)
//!
//! Patterns are compiled through the resolver's bounded cache, so repeated
//! use of the same pattern across a blueprint compiles once. Oversized
//! patterns are rejected before compilation.

use serde_json::Value;

use super::{
    Operator, OperatorRegistry, args_as_array, check_arg_count, check_min_arg_count,
    get_index_arg, get_string_arg,
};
use crate::error::EvalResult;
use crate::resolve::Scope;

pub(crate) fn register(registry: &mut OperatorRegistry) {
    registry.register("$regexMatch", Operator::Eager(regex_match));
    registry.register("$regexExtract", Operator::Eager(regex_extract));
    registry.register("$regexReplace", Operator::Lazy(regex_replace));
}

/// Whether the text matches the pattern: `[text, pattern]`
pub fn regex_match(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$regexMatch", payload)?;
    check_arg_count("$regexMatch", args, 2)?;
    let text = get_string_arg("$regexMatch", args, 0, "text")?;
    let pattern = get_string_arg("$regexMatch", args, 1, "pattern")?;
    let regex = scope.compile_regex(pattern)?;
    Ok(Value::Bool(regex.is_match(text)))
}

/// Extract the first match: `[text, pattern, group?]`.
///
/// `group` selects a capture group (0, the default, is the whole match).
/// No match, or an unmatched group, yields null.
pub fn regex_extract(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$regexExtract", payload)?;
    check_min_arg_count("$regexExtract", args, 2)?;
    let text = get_string_arg("$regexExtract", args, 0, "text")?;
    let pattern = get_string_arg("$regexExtract", args, 1, "pattern")?;
    let group = if args.len() >= 3 {
        get_index_arg("$regexExtract", args, 2, "group")?
    } else {
        0
    };
    let regex = scope.compile_regex(pattern)?;
    let extracted = regex
        .captures(text)
        .and_then(|captures| captures.get(group))
        .map(|m| Value::String(m.as_str().to_string()));
    Ok(extracted.unwrap_or(Value::Null))
}

/// Replace every match: `[text, pattern, replacement]`.
///
/// `text` and `pattern` resolve like any other arguments; `replacement` is
/// taken verbatim so capture-group references (`$1`, `$2`, `${name}`) reach
/// the regex engine instead of being read as record paths. It must be a
/// literal string.
pub fn regex_replace(scope: &Scope<'_>, payload: &Value) -> EvalResult<Value> {
    let args = args_as_array("$regexReplace", payload)?;
    check_arg_count("$regexReplace", args, 3)?;
    let resolved = [scope.resolve(&args[0])?, scope.resolve(&args[1])?];
    let text = get_string_arg("$regexReplace", &resolved, 0, "text")?;
    let pattern = get_string_arg("$regexReplace", &resolved, 1, "pattern")?;
    let replacement = get_string_arg("$regexReplace", args, 2, "replacement")?;
    let regex = scope.compile_regex(pattern)?;
    Ok(Value::String(regex.replace_all(text, replacement).into_owned()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::EvalError;
    use crate::resolve::Resolver;

    fn call(name: &str, payload: Value) -> EvalResult<Value> {
        call_with(json!({}), name, payload)
    }

    fn call_with(source: Value, name: &str, payload: Value) -> EvalResult<Value> {
        let resolver = Resolver::new(Arc::new(OperatorRegistry::new()));
        resolver.call_operator(&source, name, &payload, None)
    }

    #[test]
    fn test_regex_match() {
        assert_eq!(
            call("$regexMatch", json!(["order-123", r"^order-\d+$"])).unwrap(),
            json!(true)
        );
        assert_eq!(
            call("$regexMatch", json!(["order-abc", r"^order-\d+$"])).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_regex_extract() {
        assert_eq!(
            call("$regexExtract", json!(["order-123", r"\d+"])).unwrap(),
            json!("123")
        );
        assert_eq!(
            call("$regexExtract", json!(["ab-12", r"([a-z]+)-(\d+)", 1])).unwrap(),
            json!("ab")
        );
        assert_eq!(
            call("$regexExtract", json!(["no digits", r"\d+"])).unwrap(),
            json!(null)
        );
        assert_eq!(
            call("$regexExtract", json!(["ab", r"(x)?ab", 1])).unwrap(),
            json!(null)
        );
    }

    #[test]
    fn test_regex_replace() {
        assert_eq!(
            call("$regexReplace", json!(["a1b2", r"\d", "#"])).unwrap(),
            json!("a#b#")
        );
        assert_eq!(
            call("$regexReplace", json!(["john smith", r"(\w+) (\w+)", "$2 $1"])).unwrap(),
            json!("smith john")
        );
    }

    #[test]
    fn test_regex_replace_resolves_text_but_not_replacement() {
        // "$author" is a record path; "$2 $1" stays a capture-group template.
        let source = json!({"author": "john smith"});
        assert_eq!(
            call_with(source, "$regexReplace", json!(["$author", r"(\w+) (\w+)", "$2 $1"]))
                .unwrap(),
            json!("smith john")
        );
    }

    #[test]
    fn test_regex_replace_requires_literal_replacement() {
        let err = call("$regexReplace", json!(["a1", r"\d", 7])).unwrap_err();
        assert_eq!(
            err,
            EvalError::invalid_argument(
                "$regexReplace",
                "argument 'replacement' must be a string, got number"
            )
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = call("$regexMatch", json!(["x", "("])).unwrap_err();
        assert_eq!(err.code(), "BLUEPRINT:REGEX");
    }
}
