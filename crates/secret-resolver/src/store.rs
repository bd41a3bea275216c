//! Secret stores
//!
//! A store is a flat key/value lookup. The process environment is the usual
//! backing, optionally layered under the entries of a dotenv-style file.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::SecretError;

pub trait SecretStore: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads secrets straight from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvSecrets;

impl SecretStore for ProcessEnvSecrets {
    fn lookup(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SecretStore for StaticSecrets {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Entries from an env file, falling back to the process environment.
///
/// File entries win over the environment. The process environment itself is
/// never modified.
#[derive(Debug, Clone)]
pub struct EnvFileSecrets {
    file: StaticSecrets,
}

impl EnvFileSecrets {
    pub fn load(path: &Path) -> Result<Self, SecretError> {
        let contents = fs::read_to_string(path).map_err(|err| SecretError::EnvFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let values = parse_env_file(&contents);
        debug!(path = %path.display(), entries = values.len(), "loaded env file");
        Ok(Self {
            file: StaticSecrets::new(values),
        })
    }

    pub fn from_static(file: StaticSecrets) -> Self {
        Self { file }
    }
}

impl SecretStore for EnvFileSecrets {
    fn lookup(&self, name: &str) -> Option<String> {
        self.file
            .lookup(name)
            .or_else(|| ProcessEnvSecrets.lookup(name))
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// optional `export ` prefix is accepted and double or single quotes are stripped.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = idx + 1, "invalid env file entry; skipping");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unescape_value(value.trim()));
    }
    values
}

fn unescape_value(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn parses_env_lines() {
        let parsed = parse_env_file(
            "# comment\nUSERNAME=alice\n\nexport PASSWORD=\"p\\\"w\"\nTOKEN='raw value'\nbroken line\n",
        );
        assert_eq!(parsed.get("USERNAME").map(String::as_str), Some("alice"));
        assert_eq!(parsed.get("PASSWORD").map(String::as_str), Some("p\"w"));
        assert_eq!(parsed.get("TOKEN").map(String::as_str), Some("raw value"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    #[serial]
    fn env_file_entries_override_process_env() {
        env::set_var("TESTAIR_SECRET_OVERRIDE", "from-env");
        env::set_var("TESTAIR_SECRET_FALLBACK", "fallback");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "TESTAIR_SECRET_OVERRIDE=from-file").unwrap();

        let secrets = EnvFileSecrets::load(file.path()).unwrap();
        assert_eq!(
            secrets.lookup("TESTAIR_SECRET_OVERRIDE").as_deref(),
            Some("from-file")
        );
        assert_eq!(
            secrets.lookup("TESTAIR_SECRET_FALLBACK").as_deref(),
            Some("fallback")
        );
        assert_eq!(env::var("TESTAIR_SECRET_OVERRIDE").unwrap(), "from-env");

        env::remove_var("TESTAIR_SECRET_OVERRIDE");
        env::remove_var("TESTAIR_SECRET_FALLBACK");
    }

    #[test]
    fn missing_env_file_reports_path() {
        let err = EnvFileSecrets::load(Path::new("/definitely/not/here.env")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.env"));
    }
}
