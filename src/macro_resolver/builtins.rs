// src/macro_resolver/builtins.rs

//! The built-in macro table from spec.md §4.3.

use chrono::Local;

use crate::errors::{EngineError, Result};
use crate::macro_resolver::context::MacroContext;

/// Dispatch a built-in macro. Returns `Err(MacroExpansionError)` for an
/// unknown name, matching the parser's contract ("Unknown name ⇒ fail").
pub async fn call(name: &str, args: &[String], ctx: &MacroContext) -> Result<String> {
    match name {
        "wsdir" => path_string(&ctx.wsdir),
        "cwd" => path_string(&ctx.cwd),
        "home" => path_string(&ctx.home),
        "tmpdir" => path_string(&ctx.tmpdir),

        "file" | "filename" | "fileroot" => current_file(name, args, ctx),
        "filedir" => current_file_part(ctx, |p| p.parent().map(|d| d.to_path_buf())),
        "fileext" => current_file_part(ctx, |p| {
            p.extension().map(|e| std::path::PathBuf::from(e.to_string_lossy().to_string()))
        }),
        "filetype" => current_file_part(ctx, |p| {
            p.extension().map(|e| std::path::PathBuf::from(e.to_string_lossy().to_string()))
        }),

        "date" => Ok(Local::now().format("%Y-%m-%d").to_string()),
        "time" => Ok(Local::now().format("%H:%M:%S").to_string()),
        "timestamp" => Ok(Local::now().to_rfc3339()),

        "env" => {
            let var = first_arg(name, args)?;
            std::env::var(var).map_err(|_| {
                EngineError::MacroExpansionError(format!("environment variable '{}' is not set", var))
            })
        }
        "var" => {
            let var = first_arg(name, args)?;
            ctx.variables.get(var).cloned().ok_or_else(|| {
                EngineError::MacroExpansionError(format!("workspace variable '{}' is not set", var))
            })
        }

        "prompt" => {
            let text = args.first().map(|s| s.as_str()).unwrap_or("");
            let default = args.get(1).map(|s| s.as_str());
            ctx.interact.prompt(text, default).await
        }
        "select-pid" => ctx.interact.select_pid().await,

        other => Err(EngineError::MacroExpansionError(format!("unknown macro '{}'", other))),
    }
}

fn path_string(path: &std::path::Path) -> Result<String> {
    Ok(path.to_string_lossy().into_owned())
}

fn first_arg<'a>(name: &str, args: &'a [String]) -> Result<&'a str> {
    args.first()
        .map(|s| s.as_str())
        .ok_or_else(|| EngineError::MacroExpansionError(format!("macro '{}' requires an argument", name)))
}

fn current_file(name: &str, args: &[String], ctx: &MacroContext) -> Result<String> {
    let path = ctx
        .current_file
        .as_ref()
        .ok_or_else(|| EngineError::MacroExpansionError("no current file is open".to_string()))?;

    if let Some(expected_type) = args.first() {
        let actual = path.extension().map(|e| e.to_string_lossy().into_owned());
        if actual.as_deref() != Some(expected_type.as_str()) {
            return Err(EngineError::MacroExpansionError(format!(
                "current file type does not match expected '{}'",
                expected_type
            )));
        }
    }

    match name {
        "file" => Ok(path.to_string_lossy().into_owned()),
        "filename" => Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()),
        "fileroot" => Ok(path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()),
        _ => unreachable!("current_file only handles file/filename/fileroot"),
    }
}

fn current_file_part(
    ctx: &MacroContext,
    extract: impl Fn(&std::path::Path) -> Option<std::path::PathBuf>,
) -> Result<String> {
    let path = ctx
        .current_file
        .as_ref()
        .ok_or_else(|| EngineError::MacroExpansionError("no current file is open".to_string()))?;
    extract(path)
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::MacroExpansionError("current file has no such component".to_string()))
}
