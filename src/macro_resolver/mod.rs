// src/macro_resolver/mod.rs

//! `${name}` / `${name:arg1,arg2}` expansion (spec.md §4.3).
//!
//! Realized as a plain recursive `async fn` rather than literal
//! continuation-passing style: spec.md §9 calls CPS "faithful to the
//! original control contract" but explicitly endorses "async/await,
//! callbacks, or channels" as equally valid target-language realizations.
//! Async/await is the idiomatic choice here — it gives the same
//! one-logical-control-flow guarantee without hand-rolled continuations,
//! and composes naturally with `Box::pin` for the recursive nesting case
//! (`${outer:${inner}}`).

pub mod builtins;
pub mod context;
pub mod parser;

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::errors::Result;
use crate::model::Task;

pub use context::{Interact, MacroContext, MacroFn};

/// Expand every `${...}` placeholder in `input`, recursing into nested
/// macros and `$$`-escaped literal dollars.
pub fn resolve_str<'a>(input: &'a str, ctx: &'a MacroContext) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
    Box::pin(async move {
        let chars: Vec<char> = input.chars().collect();
        let mut out = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c == '$' && i + 1 < chars.len() && chars[i + 1] == '$' {
                out.push('$');
                i += 2;
                continue;
            }
            if c == '$' && i + 1 < chars.len() && chars[i + 1] == '{' {
                let (body_raw, next_i) = parser::find_macro_body(&chars, i + 2)?;
                let body_expanded = resolve_str(&body_raw, ctx).await?;
                let (name_raw, rest) = parser::split_once_unescaped(&body_expanded, ':');
                let name = name_raw.trim().to_string();
                let args = match rest {
                    Some(blob) => parser::split_all_unescaped(&blob, ','),
                    None => Vec::new(),
                };
                let value = resolve_macro(&name, &args, ctx).await?;
                out.push_str(&value);
                i = next_i;
                continue;
            }
            out.push(c);
            i += 1;
        }

        Ok(out)
    })
}

async fn resolve_macro(name: &str, args: &[String], ctx: &MacroContext) -> Result<String> {
    if let Some(custom) = ctx.custom_macros.get(name) {
        return custom.call(args, ctx).await;
    }
    builtins::call(name, args, ctx).await
}

/// Deep-walk a JSON value, expanding every string leaf in place. Non-string
/// leaves (numbers, bools, null) are unchanged.
pub fn resolve_value<'a>(value: &'a Value, ctx: &'a MacroContext) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
    Box::pin(async move {
        match value {
            Value::String(s) => Ok(Value::String(resolve_str(s, ctx).await?)),
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(resolve_value(item, ctx).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(k.clone(), resolve_value(v, ctx).await?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    })
}

/// Resolve every string field of one task's payload, returning a new `Task`
/// with the original dependency/policy metadata and a macro-expanded
/// payload. Called by the Task Runner over the reduced task set only
/// (spec.md §4.2: "Only these tasks are macro-expanded").
pub async fn resolve_task(task: &Task, ctx: &MacroContext) -> Result<Task> {
    let resolved_payload = resolve_value(&Value::Object(task.payload.clone()), ctx).await?;
    let payload = match resolved_payload {
        Value::Object(map) => map,
        _ => unreachable!("resolve_value preserves the Object shape of its input"),
    };
    Ok(Task {
        name: task.name.clone(),
        kind: task.kind.clone(),
        deps: task.deps.clone(),
        depends_order: task.depends_order,
        concurrency: task.concurrency,
        save_buffers: task.save_buffers,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct NoInteract;
    impl Interact for NoInteract {
        fn prompt<'a>(
            &'a self,
            _text: &'a str,
            _default: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
            Box::pin(async { Ok(String::new()) })
        }
        fn select_pid<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
            Box::pin(async { Ok(String::new()) })
        }
    }

    fn ctx() -> MacroContext {
        let mut variables = BTreeMap::new();
        variables.insert("greeting".to_string(), "hello".to_string());
        MacroContext::new(std::path::PathBuf::from("/ws"), Arc::new(NoInteract)).with_variables(variables)
    }

    #[tokio::test]
    async fn resolves_simple_builtin() {
        let c = ctx();
        let out = resolve_str("${wsdir}", &c).await.unwrap();
        assert_eq!(out, "/ws");
    }

    #[tokio::test]
    async fn literal_dollar_is_preserved() {
        let c = ctx();
        let out = resolve_str("price: $$5", &c).await.unwrap();
        assert_eq!(out, "price: $5");
    }

    #[tokio::test]
    async fn resolves_nested_macro() {
        let c = ctx();
        let out = resolve_str("${var:greeting}", &c).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn unknown_macro_is_an_error() {
        let c = ctx();
        let err = resolve_str("${does-not-exist}", &c).await.unwrap_err();
        assert!(err.to_string().contains("unknown macro"));
    }

    #[tokio::test]
    async fn unterminated_macro_is_an_error() {
        let c = ctx();
        let err = resolve_str("${wsdir", &c).await.unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[tokio::test]
    async fn idempotent_on_macro_free_input() {
        let c = ctx();
        let once = resolve_str("plain text, no macros here", &c).await.unwrap();
        let twice = resolve_str(&once, &c).await.unwrap();
        assert_eq!(once, twice);
    }
}
