// src/macro_resolver/context.rs

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;

/// Interactive macros (`prompt`, `select-pid`) suspend the whole expansion
/// while they wait on the host. Implementations are free to actually show a
/// UI; tests use a scripted fake (see `taskloop-test-utils`).
pub trait Interact: Send + Sync {
    fn prompt<'a>(
        &'a self,
        text: &'a str,
        default: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

    fn select_pid<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// A caller-provided macro, checked before the built-in table (spec.md
/// §4.3: "`name` is looked up first in the caller-provided macro table").
pub trait MacroFn: Send + Sync {
    fn call<'a>(
        &'a self,
        args: &'a [String],
        ctx: &'a MacroContext,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Everything the built-in macro table and any caller-provided macros need
/// to resolve a value: editor/file state, workspace variables, and the
/// interactive host hooks.
pub struct MacroContext {
    pub wsdir: PathBuf,
    pub cwd: PathBuf,
    pub home: PathBuf,
    pub tmpdir: PathBuf,
    /// The host editor's notion of "current file", if any.
    pub current_file: Option<PathBuf>,
    pub variables: BTreeMap<String, String>,
    pub custom_macros: BTreeMap<String, Arc<dyn MacroFn>>,
    pub interact: Arc<dyn Interact>,
}

impl MacroContext {
    pub fn new(wsdir: PathBuf, interact: Arc<dyn Interact>) -> Self {
        Self {
            wsdir,
            cwd: std::env::current_dir().unwrap_or_default(),
            home: std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default(),
            tmpdir: std::env::temp_dir(),
            current_file: None,
            variables: BTreeMap::new(),
            custom_macros: BTreeMap::new(),
            interact,
        }
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_current_file(mut self, path: Option<PathBuf>) -> Self {
        self.current_file = path;
        self
    }
}
