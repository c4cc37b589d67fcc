//! Environment helpers shared by the service binaries.
//!
//! Every service reads its settings from environment variables, optionally
//! seeded from a `.env` file. Real environment variables win over the file.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Load a `.env` file into the process environment.
///
/// `ENV_FILE` names the file; otherwise `.env` in the working directory or a
/// parent. A missing file is not an error. Returns the path that was loaded.
pub fn load_env_file() -> Option<PathBuf> {
    match env::var("ENV_FILE") {
        Ok(path) => dotenvy::from_path(&path).ok().map(|()| PathBuf::from(path)),
        Err(_) => dotenvy::dotenv().ok(),
    }
}

/// Parse `name` from the environment, falling back to `default` when the
/// variable is unset or does not parse.
#[must_use]
pub fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_use_defaults() {
        assert_eq!(env_parse("QRT_TEST_UNSET_VARIABLE", 42_u32), 42);
        assert!(env_parse("QRT_TEST_UNSET_FLAG", true));
    }

    #[test]
    fn unparsable_values_use_defaults() {
        // PATH is always set and never a port number.
        assert_eq!(env_parse("PATH", 8080_u16), 8080);
    }
}
