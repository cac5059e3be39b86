//! Property tests for macro resolution: escaping and idempotence on
//! macro-free input should hold for arbitrary strings, not just the
//! hand-picked cases in the unit tests.

use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;
use taskloop::macro_resolver::{resolve_str, Interact, MacroContext};
use taskloop::NonInteractive;

fn ctx() -> MacroContext {
    MacroContext::new(PathBuf::from("/workspace"), Arc::new(NonInteractive) as Arc<dyn Interact>)
}

/// Strings with no `$` can't contain a macro placeholder, so resolution
/// must be the identity function on them.
fn macro_free_string() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._/-]{0,40}".prop_filter("no literal dollars", |s| !s.contains('$'))
}

proptest! {
    #[test]
    fn resolve_is_identity_on_macro_free_input(s in macro_free_string()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let resolved = rt.block_on(resolve_str(&s, &ctx())).unwrap();
        prop_assert_eq!(resolved, s);
    }

    #[test]
    fn doubled_dollar_survives_as_a_single_literal_dollar(prefix in "[a-zA-Z0-9 ]{0,10}", suffix in "[a-zA-Z0-9 ]{0,10}") {
        let input = format!("{prefix}$${suffix}");
        let rt = tokio::runtime::Runtime::new().unwrap();
        let resolved = rt.block_on(resolve_str(&input, &ctx())).unwrap();
        prop_assert_eq!(resolved, format!("{prefix}${suffix}"));
    }
}
