//! Stable serializer for tool-call arguments
//!
//! Produces a deterministic textual form of an argument bag so that
//! argument patterns match the same call identically regardless of key
//! order. Object keys are emitted sorted; array order is preserved.
//!
//! The traversal uses an explicit work stack rather than native recursion,
//! so adversarially deep argument structures cannot exhaust the call
//! stack. A depth guard backstops the walk and replaces anything beyond it
//! with a `[Circular]` sentinel.

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;

/// Sentinel emitted in place of a subtree the walk refuses to enter.
const CIRCULAR_SENTINEL: &str = "\"[Circular]\"";

/// Depth beyond which a subtree is replaced with the sentinel. Far deeper
/// than any legitimate argument bag; bounds termination on hostile input.
const MAX_DEPTH: usize = 100_000;

/// Error raised by a [`SerializeHook`]. Never propagates out of the
/// serializer: the failing node falls back to structural traversal.
#[derive(Error, Debug, Clone)]
#[error("serialize hook failed: {0}")]
pub struct HookError(pub String);

impl HookError {
    /// Create a hook error from a message
    pub fn new(msg: impl Into<String>) -> Self {
        HookError(msg.into())
    }
}

/// Custom per-node substitution applied before structural traversal.
///
/// `Ok(Some(v))` replaces the node with `v` (the replacement is emitted
/// structurally, without re-invoking the hook, so a hook cannot send the
/// walk into infinite regress). `Ok(None)` leaves the node untouched.
/// `Err(_)` falls back to structural traversal of that node only; its
/// descendants are still offered to the hook.
pub trait SerializeHook {
    /// Optionally substitute a value before it is serialized
    fn transform(&self, value: &Value) -> Result<Option<Value>, HookError>;
}

/// Work items for the explicit traversal stack.
enum Task<'a> {
    /// Serialize a node. `hook` is false inside hook-substituted subtrees.
    Node {
        value: Cow<'a, Value>,
        depth: usize,
        hook: bool,
    },
    /// Emit a literal separator or closer
    Text(&'static str),
    /// Emit an object key followed by `:`
    Key(String),
}

/// Serialize a value into its canonical textual form.
pub fn stable_stringify(value: &Value) -> String {
    stringify_inner(value, None)
}

/// Serialize a value, consulting `hook` at each node.
pub fn stable_stringify_with_hook(value: &Value, hook: &dyn SerializeHook) -> String {
    stringify_inner(value, Some(hook))
}

fn stringify_inner(value: &Value, hook: Option<&dyn SerializeHook>) -> String {
    let mut out = String::new();
    let mut stack: Vec<Task<'_>> = vec![Task::Node {
        value: Cow::Borrowed(value),
        depth: 0,
        hook: hook.is_some(),
    }];

    while let Some(task) = stack.pop() {
        match task {
            Task::Text(text) => out.push_str(text),
            Task::Key(key) => {
                out.push_str(&scalar_to_string(&Value::String(key)));
                out.push(':');
            }
            Task::Node {
                mut value,
                depth,
                hook: apply_hook,
            } => {
                if depth > MAX_DEPTH {
                    out.push_str(CIRCULAR_SENTINEL);
                    continue;
                }

                let mut hook_children = apply_hook;
                if apply_hook {
                    if let Some(hook) = hook {
                        match hook.transform(&value) {
                            Ok(Some(replacement)) => {
                                value = Cow::Owned(replacement);
                                hook_children = false;
                            }
                            Ok(None) => {}
                            Err(err) => {
                                tracing::debug!(
                                    "serialize hook failed, serializing node structurally: {}",
                                    err
                                );
                            }
                        }
                    }
                }

                match value {
                    Cow::Borrowed(Value::Array(items)) => {
                        push_array(&mut out, &mut stack, items.iter().map(Cow::Borrowed), depth, hook_children);
                    }
                    Cow::Owned(Value::Array(items)) => {
                        push_array(&mut out, &mut stack, items.into_iter().map(Cow::Owned), depth, hook_children);
                    }
                    Cow::Borrowed(Value::Object(map)) => {
                        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                        entries.sort_by(|a, b| a.0.cmp(b.0));
                        push_object(
                            &mut out,
                            &mut stack,
                            entries.into_iter().map(|(k, v)| (k.clone(), Cow::Borrowed(v))),
                            depth,
                            hook_children,
                        );
                    }
                    Cow::Owned(Value::Object(map)) => {
                        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
                        entries.sort_by(|a, b| a.0.cmp(&b.0));
                        push_object(
                            &mut out,
                            &mut stack,
                            entries.into_iter().map(|(k, v)| (k, Cow::Owned(v))),
                            depth,
                            hook_children,
                        );
                    }
                    scalar => out.push_str(&scalar_to_string(scalar.as_ref())),
                }
            }
        }
    }

    out
}

fn push_array<'a>(
    out: &mut String,
    stack: &mut Vec<Task<'a>>,
    items: impl Iterator<Item = Cow<'a, Value>>,
    depth: usize,
    hook: bool,
) {
    out.push('[');
    let mut tasks: Vec<Task<'a>> = Vec::new();
    for (idx, item) in items.enumerate() {
        if idx > 0 {
            tasks.push(Task::Text(","));
        }
        tasks.push(Task::Node {
            value: item,
            depth: depth + 1,
            hook,
        });
    }
    tasks.push(Task::Text("]"));
    stack.extend(tasks.into_iter().rev());
}

fn push_object<'a>(
    out: &mut String,
    stack: &mut Vec<Task<'a>>,
    entries: impl Iterator<Item = (String, Cow<'a, Value>)>,
    depth: usize,
    hook: bool,
) {
    out.push('{');
    let mut tasks: Vec<Task<'a>> = Vec::new();
    for (idx, (key, value)) in entries.enumerate() {
        if idx > 0 {
            tasks.push(Task::Text(","));
        }
        tasks.push(Task::Key(key));
        tasks.push(Task::Node {
            value,
            depth: depth + 1,
            hook,
        });
    }
    tasks.push(Task::Text("}"));
    stack.extend(tasks.into_iter().rev());
}

/// Render a leaf value. Scalar serialization through serde_json cannot
/// fail; the null fallback keeps this path total anyway.
fn scalar_to_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("null"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_invariance() {
        let a = json!({"b": 1, "a": {"d": 4, "c": 3}});
        let b = json!({"a": {"c": 3, "d": 4}, "b": 1});
        assert_eq!(stable_stringify(&a), stable_stringify(&b));
        assert_eq!(stable_stringify(&a), r#"{"a":{"c":3,"d":4},"b":1}"#);
    }

    #[test]
    fn test_array_order_preserved() {
        let v = json!({"list": [3, 1, 2]});
        assert_eq!(stable_stringify(&v), r#"{"list":[3,1,2]}"#);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(stable_stringify(&json!(null)), "null");
        assert_eq!(stable_stringify(&json!(true)), "true");
        assert_eq!(stable_stringify(&json!(1.5)), "1.5");
        assert_eq!(stable_stringify(&json!("a\"b")), r#""a\"b""#);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(stable_stringify(&json!({})), "{}");
        assert_eq!(stable_stringify(&json!([])), "[]");
    }

    /// Nested objects built iteratively; the `json!` macro would recurse
    /// through `to_value` and overflow before the serializer even ran.
    /// Callers must leak the result: dropping it recurses the same way.
    fn deep_object(depth: usize) -> Value {
        let mut value = Value::from(0);
        for _ in 0..depth {
            let mut map = serde_json::Map::new();
            map.insert("next".to_string(), value);
            value = Value::Object(map);
        }
        value
    }

    #[test]
    fn test_deep_nesting_terminates() {
        // 2000 levels deep: must neither overflow the call stack nor panic
        let value = deep_object(2000);
        let text = stable_stringify(&value);
        assert!(text.starts_with(r#"{"next":{"next":"#));
        assert!(text.contains(":0"));
        assert!(text.ends_with("}}"));
        std::mem::forget(value);
    }

    #[test]
    fn test_depth_guard_emits_sentinel() {
        let value = deep_object(MAX_DEPTH + 10);
        let text = stable_stringify(&value);
        assert!(text.contains("[Circular]"));
        assert!(!text.contains(":0"));
        std::mem::forget(value);
    }

    struct RedactSecrets;

    impl SerializeHook for RedactSecrets {
        fn transform(&self, value: &Value) -> Result<Option<Value>, HookError> {
            match value {
                Value::String(s) if s.starts_with("secret:") => {
                    Ok(Some(Value::String("[redacted]".into())))
                }
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_hook_substitution() {
        let v = json!({"token": "secret:abc", "user": "alice"});
        let text = stable_stringify_with_hook(&v, &RedactSecrets);
        assert_eq!(text, r#"{"token":"[redacted]","user":"alice"}"#);
    }

    struct FailingHook;

    impl SerializeHook for FailingHook {
        fn transform(&self, _value: &Value) -> Result<Option<Value>, HookError> {
            Err(HookError::new("boom"))
        }
    }

    #[test]
    fn test_failing_hook_falls_back() {
        let v = json!({"b": 1, "a": 2});
        let text = stable_stringify_with_hook(&v, &FailingHook);
        assert_eq!(text, r#"{"a":2,"b":1}"#);
    }

    struct ObjectAverseHook;

    impl SerializeHook for ObjectAverseHook {
        fn transform(&self, value: &Value) -> Result<Option<Value>, HookError> {
            match value {
                Value::Object(_) => Err(HookError::new("no objects")),
                Value::String(s) if s.starts_with("secret:") => {
                    Ok(Some(Value::String("[redacted]".into())))
                }
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_hook_failure_is_per_node() {
        // The failing containers serialize structurally, but their
        // descendants are still offered to the hook
        let v = json!({"outer": {"token": "secret:abc"}});
        let text = stable_stringify_with_hook(&v, &ObjectAverseHook);
        assert_eq!(text, r#"{"outer":{"token":"[redacted]"}}"#);
    }

    struct ExpandingHook;

    impl SerializeHook for ExpandingHook {
        fn transform(&self, value: &Value) -> Result<Option<Value>, HookError> {
            // Wraps every node in another object; without the re-hook guard
            // this would regress forever.
            Ok(Some(json!({ "wrapped": value.clone() })))
        }
    }

    #[test]
    fn test_hook_substitution_is_not_rehooked() {
        let text = stable_stringify_with_hook(&json!(1), &ExpandingHook);
        assert_eq!(text, r#"{"wrapped":1}"#);
    }

    #[test]
    fn test_repeated_subtree_serializes_fully_each_time() {
        // The same structure reachable twice via non-cyclic paths is
        // emitted in full at both sites, never collapsed to a sentinel.
        let shared = json!({"x": 1});
        let v = json!({"first": shared, "second": shared});
        assert_eq!(
            stable_stringify(&v),
            r#"{"first":{"x":1},"second":{"x":1}}"#
        );
    }
}
