//! `${VAR}` and `${VAR:-default}` expansion for configuration strings.
//!
//! Bare `$VAR` is left as-is so URLs containing dollar signs survive untouched.

use crate::ConfigError;

/// Expand environment variable references in `value`.
///
/// `field` names the configuration key and is only used in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, lookup)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.cause.var_name),
        })
}

/// Expand an optional value in place.
pub(crate) fn expand_env_opt(
    value: &mut Option<String>,
    field: &str,
) -> Result<(), ConfigError> {
    if let Some(raw) = value.as_deref() {
        *value = Some(expand_env(raw, field)?);
    }
    Ok(())
}

fn lookup(var: &str) -> Result<Option<String>, UnsetVar> {
    std::env::var(var).map(Some).map_err(|_| UnsetVar {
        var_name: var.to_owned(),
    })
}

/// Variable referenced without a default and not present in the environment.
struct UnsetVar {
    var_name: String,
}
