//! Secret reference resolver.
//!
//! Credential values in `config.toml` never need to hold the secret itself:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and takes the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as-is

use std::process::Command;

use crate::error::{ManagerError, ManagerResult};

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> ManagerResult<String> {
    if let Some(path) = value.strip_prefix("pass::") {
        resolve_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        resolve_env(var)
    } else {
        Ok(value.to_string())
    }
}

/// Resolves an optional value, treating an empty result as unset.
pub fn resolve_opt(value: Option<&str>, field: &str) -> ManagerResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let resolved = resolve(value)
        .map_err(|e| ManagerError::config(format!("failed to resolve {}: {}", field, e)))?;
    Ok(Some(resolved).filter(|v| !v.trim().is_empty()))
}

fn resolve_pass(path: &str) -> ManagerResult<String> {
    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| ManagerError::config(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ManagerError::config(format!(
            "`pass show {}` failed (exit {}): {}",
            path,
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ManagerError::config(format!("`pass show {}` produced no output", path)))
}

fn resolve_env(var: &str) -> ManagerResult<String> {
    std::env::var(var)
        .map_err(|_| ManagerError::config(format!("environment variable `{}` is not set", var)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passthrough() {
        assert_eq!(resolve("hello").unwrap(), "hello");
        assert_eq!(resolve("").unwrap(), "");
        assert_eq!(
            resolve("1234.apps.googleusercontent.com").unwrap(),
            "1234.apps.googleusercontent.com"
        );
    }

    #[test]
    fn env_prefix_resolves() {
        unsafe {
            std::env::set_var("_LIFEHUB_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(resolve("env::_LIFEHUB_TEST_SECRET").unwrap(), "my-secret-value");
        unsafe {
            std::env::remove_var("_LIFEHUB_TEST_SECRET");
        }
    }

    #[test]
    fn env_prefix_missing_var_errors() {
        let err = resolve("env::_LIFEHUB_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn pass_prefix_unknown_entry_errors() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::nonexistent/lifehub/entry/12345").is_err());
    }

    #[test]
    fn optional_values() {
        assert_eq!(resolve_opt(None, "api_key").unwrap(), None);
        assert_eq!(resolve_opt(Some("  "), "api_key").unwrap(), None);
        assert_eq!(resolve_opt(Some("abc"), "api_key").unwrap().as_deref(), Some("abc"));

        let err = resolve_opt(Some("env::_LIFEHUB_MISSING_KEY_98765"), "api_key").unwrap_err();
        assert!(err.to_string().contains("failed to resolve api_key"));
    }
}
