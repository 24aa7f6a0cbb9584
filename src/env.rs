//! Launch environment for spawned children
//!
//! Children never inherit the host environment. They receive exactly the list
//! built here: fixed entries derived from the install layout, a preload shim
//! on old platforms, and a short allow-list forwarded from the ambient
//! environment.

use std::collections::HashMap;

use crate::paths::{join_search_path, InstallLayout};

/// Highest OS capability level that needs the syscall compatibility shim
pub const LEGACY_PRELOAD_MAX_LEVEL: u32 = 23;

/// Forwarded on every launch, empty when the host does not define them
const ALWAYS_FORWARDED: &[&str] = &["BOOTCLASSPATH", "ANDROID_ROOT", "ANDROID_DATA", "EXTERNAL_STORAGE"];

/// Forwarded only when the host defines them
const FORWARDED_IF_PRESENT: &[&str] = &["ANDROID_RUNTIME_ROOT", "ANDROID_TZDATA_ROOT"];

/// Lookup of host environment variables
pub trait AmbientEnv {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl AmbientEnv for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl AmbientEnv for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Ordered `NAME=value` list handed to a child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnvironment {
    entries: Vec<(String, String)>,
}

impl ChildEnvironment {
    fn push(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `NAME=value` strings, in build order
    pub fn to_strings(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }

    /// Replace the command's environment with exactly these entries
    pub fn apply_tokio(&self, command: &mut tokio::process::Command) {
        command.env_clear();
        command.envs(self.entries.iter().map(|(k, v)| (k, v)));
    }
}

/// Build the environment for a child of the runtime at `layout`.
///
/// `os_level` is the host's capability level; at or below
/// [`LEGACY_PRELOAD_MAX_LEVEL`] the compatibility shim is preloaded.
pub fn build_environment(
    layout: &InstallLayout,
    os_level: u32,
    ambient: &dyn AmbientEnv,
) -> ChildEnvironment {
    let root = layout.root().display().to_string();
    let mut env = ChildEnvironment::default();

    env.push("TERM", "xterm-256color");
    env.push("HOME", layout.home().display().to_string());
    env.push("LD_LIBRARY_PATH", join_search_path(&layout.lib_dirs()));
    if os_level <= LEGACY_PRELOAD_MAX_LEVEL {
        env.push("LD_PRELOAD", layout.legacy_shim().display().to_string());
    }
    env.push("PATH", join_search_path(&layout.bin_dirs()));
    env.push(
        "NODE_OPTIONS",
        format!("--require={}", layout.preload_module().display()),
    );

    for name in ALWAYS_FORWARDED {
        env.push(name, ambient.var(name).unwrap_or_default());
    }
    for name in FORWARDED_IF_PRESENT {
        if let Some(value) = ambient.var(name) {
            env.push(name, value);
        }
    }

    env.push("LANG", "en_US.UTF-8");
    env.push("TMPDIR", layout.tmp().display().to_string());
    env.push("PREFIX", root);
    env.push("SHELL", layout.shell().display().to_string());
    env.push("TERMUX_PKG_NO_MIRROR_SELECT", "1");

    tracing::debug!("child env = {:?}", env.to_strings());
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambient(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_preload_shim_only_on_legacy_levels() {
        let layout = InstallLayout::new("/data/app");
        let host = ambient(&[]);

        for level in [16, 21, LEGACY_PRELOAD_MAX_LEVEL] {
            let env = build_environment(&layout, level, &host);
            assert_eq!(
                env.get("LD_PRELOAD"),
                Some("/data/app/files/android_23.so"),
                "level {} should preload the shim",
                level
            );
        }
        for level in [LEGACY_PRELOAD_MAX_LEVEL + 1, 29, 34] {
            let env = build_environment(&layout, level, &host);
            assert!(!env.contains("LD_PRELOAD"), "level {} must not preload", level);
        }
    }

    #[test]
    fn test_fixed_entries() {
        let layout = InstallLayout::new("/data/app");
        let env = build_environment(&layout, 30, &ambient(&[]));

        assert_eq!(env.get("TERM"), Some("xterm-256color"));
        assert_eq!(env.get("HOME"), Some("/data/app/files/home"));
        assert_eq!(env.get("TMPDIR"), Some("/data/app/files/tmp"));
        assert_eq!(env.get("PREFIX"), Some("/data/app/files"));
        assert_eq!(env.get("LANG"), Some("en_US.UTF-8"));
        assert_eq!(env.get("SHELL"), Some("/data/app/files/usr/bin/bash"));
        assert_eq!(
            env.get("LD_LIBRARY_PATH"),
            Some("/data/app/files:/data/app/files/usr/lib")
        );
        assert_eq!(
            env.get("NODE_OPTIONS"),
            Some("--require=/data/app/files/globalinject.js")
        );
        assert!(env.get("PATH").unwrap().starts_with("/data/app/files/bin:"));
    }

    #[test]
    fn test_forwarding_rules() {
        let layout = InstallLayout::new("/data/app");
        let host = ambient(&[
            ("ANDROID_ROOT", "/system"),
            ("ANDROID_TZDATA_ROOT", "/apex/com.android.tzdata"),
            ("SECRET_TOKEN", "leak"),
        ]);
        let env = build_environment(&layout, 30, &host);

        assert_eq!(env.get("ANDROID_ROOT"), Some("/system"));
        // always-forwarded names appear even when the host lacks them
        assert_eq!(env.get("BOOTCLASSPATH"), Some(""));
        assert_eq!(env.get("EXTERNAL_STORAGE"), Some(""));
        assert_eq!(
            env.get("ANDROID_TZDATA_ROOT"),
            Some("/apex/com.android.tzdata")
        );
        assert!(!env.contains("ANDROID_RUNTIME_ROOT"));
        assert!(!env.contains("SECRET_TOKEN"));
    }

    #[test]
    fn test_to_strings_format() {
        let layout = InstallLayout::new("/r");
        let env = build_environment(&layout, 30, &ambient(&[]));
        let strings = env.to_strings();
        assert_eq!(strings[0], "TERM=xterm-256color");
        assert_eq!(strings.len(), env.len());
    }
}
