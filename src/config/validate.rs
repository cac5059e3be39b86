// src/config/validate.rs

use crate::config::model::VariablesFile;
use crate::errors::{EngineError, Result};

/// Ensure every variable name matches `[A-Za-z_][A-Za-z0-9_]*`, as required
/// by spec.md §6's `variables.json` schema.
pub fn validate_variables(file: &VariablesFile) -> Result<()> {
    for name in file.variables.keys() {
        if !is_valid_variable_name(name) {
            return Err(EngineError::ConfigError(format!(
                "invalid variable name '{}': expected [A-Za-z_][A-Za-z0-9_]*",
                name
            )));
        }
    }
    Ok(())
}

fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn accepts_valid_names() {
        let mut variables = BTreeMap::new();
        variables.insert("foo_bar".to_string(), "1".to_string());
        variables.insert("_private".to_string(), "2".to_string());
        let file = VariablesFile { variables };
        assert!(validate_variables(&file).is_ok());
    }

    #[test]
    fn rejects_leading_digit() {
        let mut variables = BTreeMap::new();
        variables.insert("1abc".to_string(), "x".to_string());
        let file = VariablesFile { variables };
        assert!(validate_variables(&file).is_err());
    }
}
