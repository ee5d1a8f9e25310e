//! Runtime registry mapping language identifiers to sandbox profiles.
//!
//! The table is built once and never mutated, so it can be shared between
//! concurrent executions without locking.

use std::collections::HashMap;

use crate::errors::ExecutionError;

/// Placeholder replaced with the sandbox working directory in file invocations.
const WORK_DIR_TOKEN: &str = "{work_dir}";

/// Runs source text passed directly as an interpreter argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineInvocation {
    pub program: &'static str,
    pub flag: &'static str,
}

/// How to execute code for one language inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    pub name: &'static str,
    pub image: &'static str,
    pub file_extension: &'static str,
    /// Present when the interpreter can evaluate source from the command line.
    pub inline_invocation: Option<InlineInvocation>,
    /// Command used when the source is staged as `main<ext>` in the work dir.
    pub file_invocation: &'static [&'static str],
    /// Extra `KEY=value` variables set inside the sandbox.
    pub env: &'static [&'static str],
}

impl RuntimeProfile {
    pub fn source_file_name(&self) -> String {
        format!("main{}", self.file_extension)
    }

    pub fn supports_inline(&self) -> bool {
        self.inline_invocation.is_some()
    }

    /// Command that runs `code` inline, if this runtime allows it.
    pub fn inline_command(&self, code: &str) -> Option<Vec<String>> {
        self.inline_invocation.map(|inline| {
            vec![
                inline.program.to_string(),
                inline.flag.to_string(),
                code.to_string(),
            ]
        })
    }

    pub fn file_command(&self, work_dir: &str) -> Vec<String> {
        self.file_invocation
            .iter()
            .map(|part| part.replace(WORK_DIR_TOKEN, work_dir))
            .collect()
    }
}

const PYTHON: RuntimeProfile = RuntimeProfile {
    name: "python",
    image: "python:3.11-slim",
    file_extension: ".py",
    inline_invocation: Some(InlineInvocation {
        program: "python",
        flag: "-c",
    }),
    file_invocation: &["python", "{work_dir}/main.py"],
    env: &["PYTHONUNBUFFERED=1"],
};

const NODEJS: RuntimeProfile = RuntimeProfile {
    name: "nodejs",
    image: "node:18-alpine",
    file_extension: ".js",
    inline_invocation: Some(InlineInvocation {
        program: "node",
        flag: "-e",
    }),
    file_invocation: &["node", "{work_dir}/main.js"],
    env: &["NODE_ENV=production"],
};

const GO: RuntimeProfile = RuntimeProfile {
    name: "go",
    image: "golang:1.22-alpine",
    file_extension: ".go",
    inline_invocation: None,
    file_invocation: &["/bin/sh", "-c", "cd {work_dir} && go run main.go"],
    // The toolchain would otherwise spawn a thread per host core and trip the pids limit.
    env: &["GOMAXPROCS=1", "GOFLAGS=-p=1"],
};

#[derive(Debug, Clone)]
pub struct RuntimeRegistry {
    profiles: HashMap<&'static str, RuntimeProfile>,
}

impl RuntimeRegistry {
    /// The stock table of supported runtimes.
    pub fn builtin() -> Self {
        let profiles = [PYTHON, NODEJS, GO]
            .into_iter()
            .map(|profile| (profile.name, profile))
            .collect();
        Self { profiles }
    }

    /// Case-insensitive lookup. Surrounding whitespace is not ignored.
    pub fn resolve(&self, name: &str) -> Result<&RuntimeProfile, ExecutionError> {
        self.profiles
            .get(name.to_lowercase().as_str())
            .ok_or_else(|| ExecutionError::UnsupportedRuntime(name.to_string()))
    }

    /// Guess the runtime from a source file extension such as `py` or `.js`.
    pub fn resolve_extension(&self, extension: &str) -> Option<&RuntimeProfile> {
        let wanted = format!(".{}", extension.trim_start_matches('.').to_lowercase());
        self.profiles()
            .into_iter()
            .find(|profile| profile.file_extension == wanted)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.profiles.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Profiles ordered by runtime name.
    pub fn profiles(&self) -> Vec<&RuntimeProfile> {
        let mut profiles: Vec<_> = self.profiles.values().collect();
        profiles.sort_by_key(|profile| profile.name);
        profiles
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_runtime_in_any_casing() {
        let registry = RuntimeRegistry::builtin();
        let cases = [
            ("python", "python:3.11-slim"),
            ("PYTHON", "python:3.11-slim"),
            ("PyThOn", "python:3.11-slim"),
            ("nodejs", "node:18-alpine"),
            ("NodeJS", "node:18-alpine"),
            ("go", "golang:1.22-alpine"),
            ("GO", "golang:1.22-alpine"),
        ];

        for (name, image) in cases {
            let profile = registry.resolve(name).unwrap();
            assert_eq!(profile.image, image, "runtime {}", name);
            assert_eq!(profile, registry.resolve(&name.to_lowercase()).unwrap());
        }
    }

    #[test]
    fn unknown_runtimes_are_rejected() {
        let registry = RuntimeRegistry::builtin();
        let cases = [
            "ruby", "", "python3 ", "node", "golang", "pythonx", " python", "python\n", "\tGO ",
            "nodejs ",
        ];
        for name in cases {
            match registry.resolve(name) {
                Err(ExecutionError::UnsupportedRuntime(got)) => assert_eq!(got, name),
                other => panic!("expected UnsupportedRuntime for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn resolving_twice_yields_identical_profiles() {
        let registry = RuntimeRegistry::builtin();
        let first = registry.resolve("python").unwrap().clone();
        let second = registry.resolve("python").unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn inline_runtimes_build_eval_commands() {
        let registry = RuntimeRegistry::builtin();

        let python = registry.resolve("python").unwrap();
        assert_eq!(
            python.inline_command("print(1)").unwrap(),
            vec!["python", "-c", "print(1)"]
        );

        let node = registry.resolve("nodejs").unwrap();
        assert_eq!(
            node.inline_command("console.log(1)").unwrap(),
            vec!["node", "-e", "console.log(1)"]
        );
    }

    #[test]
    fn go_requires_a_staged_source_file() {
        let go = RuntimeRegistry::builtin().resolve("go").unwrap().clone();
        assert!(!go.supports_inline());
        assert!(go.inline_command("package main").is_none());
        assert_eq!(go.source_file_name(), "main.go");
        assert_eq!(
            go.file_command("/app"),
            vec!["/bin/sh", "-c", "cd /app && go run main.go"]
        );
    }

    #[test]
    fn file_commands_follow_the_work_dir() {
        let python = RuntimeRegistry::builtin().resolve("python").unwrap().clone();
        assert_eq!(python.file_command("/sandbox"), vec!["python", "/sandbox/main.py"]);
    }

    #[test]
    fn lists_names_and_guesses_from_extension() {
        let registry = RuntimeRegistry::builtin();
        assert_eq!(registry.names(), vec!["go", "nodejs", "python"]);
        assert_eq!(registry.resolve_extension("py").unwrap().name, "python");
        assert_eq!(registry.resolve_extension(".JS").unwrap().name, "nodejs");
        assert!(registry.resolve_extension("rb").is_none());
    }
}
