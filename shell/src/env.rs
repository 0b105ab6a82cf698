use crate::error::LaunchError;
use std::collections::BTreeMap;
use std::env as stdenv;
use std::ffi::CString;

/// Environment handed to every launched program.
///
/// Captured once from the shell's own process environment. Entries are kept
/// sorted so the `envp` block passed to `execve` is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable for programs launched from now on.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Build the `KEY=VALUE` block for `execve`.
    ///
    /// Must be called before forking: the child may not allocate.
    pub fn to_envp(&self) -> Result<Vec<CString>, LaunchError> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let entry = format!("{k}={v}");
                CString::new(entry.clone()).map_err(|_| LaunchError::InvalidArgument(entry))
            })
            .collect()
    }
}
