//! Environment variable expansion for config strings

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern"));

/// Replace every `${NAME}` with the value of the environment variable `NAME`.
///
/// Unset variables are left as written. Values are not expanded again, so a
/// variable holding `${OTHER}` comes through literally.
pub fn expand_env_vars(input: &str) -> String {
    if !input.contains("${") {
        return input.to_string();
    }

    ENV_VAR
        .replace_all(input, |caps: &Captures| match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}
