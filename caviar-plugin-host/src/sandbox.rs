//! Sandbox environment
//!
//! The sandbox is a separate process; the only channel from the parent
//! to the child is its environment. Plugins that need to hand state to
//! the child tap the `sandboxEnvironment` hook and mutate the
//! [`SandboxEnvironment`] it receives. Spawning the child is the
//! launcher's business.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Separator between entries of PATH-like variables
#[cfg(windows)]
pub const PATH_DELIMITER: char = ';';

/// Separator between entries of PATH-like variables
#[cfg(not(windows))]
pub const PATH_DELIMITER: char = ':';

/// Prepend `paths` to a PATH-like `base`, dropping empty entries of `base`
pub fn join_env_paths<I, S>(base: Option<&str>, paths: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut joined: Vec<String> = paths.into_iter().map(Into::into).collect();

    if let Some(base) = base {
        joined.extend(
            base.split(PATH_DELIMITER)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );
    }

    joined.join(&PATH_DELIMITER.to_string())
}

/// Environment variables the sandboxed child will be started with.
///
/// Clones share the same variables, so a clone handed to a hook tap
/// mutates the environment the host reads back afterwards.
#[derive(Debug, Clone, Default)]
pub struct SandboxEnvironment {
    vars: Arc<Mutex<BTreeMap<String, String>>>,
}

impl SandboxEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = Self::new();
        env.extend(vars);
        env
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.lock().unwrap().insert(key.into(), value.into());
    }

    pub fn get_env(&self, key: &str) -> Option<String> {
        self.vars.lock().unwrap().get(key).cloned()
    }

    pub fn remove_env(&self, key: &str) -> Option<String> {
        self.vars.lock().unwrap().remove(key)
    }

    pub fn extend<I, K, V>(&self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut guard = self.vars.lock().unwrap();
        for (k, v) in vars {
            guard.insert(k.into(), v.into());
        }
    }

    /// Prepend entries to a PATH-like variable
    pub fn prepend_path<I, S>(&self, key: &str, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.vars.lock().unwrap();
        let joined = join_env_paths(guard.get(key).map(String::as_str), paths);
        guard.insert(key.to_string(), joined);
    }

    /// Snapshot of the variables
    pub fn vars(&self) -> BTreeMap<String, String> {
        self.vars.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_env_paths() {
        let d = PATH_DELIMITER;
        let base = format!("/usr/bin{d}{d}/bin");

        assert_eq!(
            join_env_paths(Some(&base), ["/project/node_modules"]),
            format!("/project/node_modules{d}/usr/bin{d}/bin")
        );
        assert_eq!(join_env_paths(None, ["/a", "/b"]), format!("/a{d}/b"));
        assert_eq!(join_env_paths(Some(""), Vec::<String>::new()), "");
    }

    #[test]
    fn test_clones_share_variables() {
        let env = SandboxEnvironment::from_vars([("CAVIAR_PHASE", "default")]);
        let handle = env.clone();

        handle.set_env("SANDBOX_PLUGIN_ENV", "YES");
        assert_eq!(env.get_env("SANDBOX_PLUGIN_ENV").as_deref(), Some("YES"));
        assert_eq!(env.vars().len(), 2);

        assert_eq!(env.remove_env("CAVIAR_PHASE").as_deref(), Some("default"));
        assert!(handle.get_env("CAVIAR_PHASE").is_none());
    }

    #[test]
    fn test_prepend_path() {
        let env = SandboxEnvironment::new();
        env.prepend_path("NODE_PATH", ["/b"]);
        env.prepend_path("NODE_PATH", ["/a"]);

        assert_eq!(
            env.get_env("NODE_PATH").unwrap(),
            format!("/a{}/b", PATH_DELIMITER)
        );
    }
}
