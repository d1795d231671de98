use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::CString;

/// Environment variables owned by the shell session.
///
/// The session starts with a copy of the process environment. Only the
/// `setenv`, `unsetenv` and `cd` built-ins mutate it; every launched program
/// receives a [`snapshot`](Environment::snapshot) taken right before it is
/// forked, so nothing a child does is visible here.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment into a new `Environment` instance.
    ///
    /// `PWD` is filled in from the working directory when the parent did not
    /// export it.
    pub fn new() -> Self {
        let mut env: Self = stdenv::vars().collect();
        if env.get_var("PWD").is_none() {
            match stdenv::current_dir() {
                Ok(cwd) => env.set_var("PWD", cwd.to_string_lossy()),
                Err(e) => tracing::warn!("cannot determine working directory: {}", e),
            }
        }
        env
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override an environment variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Remove a variable. Returns whether it was present.
    pub fn unset_var(&mut self, key: &str) -> bool {
        self.vars.remove(key).is_some()
    }

    /// All variables ordered by name.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// `NAME=VALUE` strings for `execve`. Entries that cannot be represented
    /// as C strings are left out.
    pub fn snapshot(&self) -> Vec<CString> {
        self.vars
            .iter()
            .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
