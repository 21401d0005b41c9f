//! Scripted stand-in for the `terraform` executable
//!
//! Installs a POSIX shell script that records each invocation as
//! `<cwd basename> <args...>` in a log file outside the workspace, prints a
//! line per subcommand, and exits with a configurable status. `plan` writes
//! the plan file and `apply` refuses to run without it, so ordering mistakes
//! show up as failures.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const SUBCOMMANDS: [&str; 4] = ["init", "plan", "apply", "destroy"];

#[derive(Debug, Clone)]
struct Failure {
    code: i32,
    stderr: String,
}

/// Builder for a fake `terraform` script
#[derive(Debug, Clone, Default)]
pub struct FakeTerraform {
    failures: BTreeMap<String, Failure>,
    output: BTreeMap<String, Vec<String>>,
}

/// An installed fake and the log it writes to
#[derive(Debug, Clone)]
pub struct InstalledFake {
    pub binary: PathBuf,
    pub log: PathBuf,
}

impl FakeTerraform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `subcommand` print `stderr` to stderr and exit with `code`
    pub fn fail(mut self, subcommand: &str, code: i32, stderr: &str) -> Self {
        self.failures.insert(
            subcommand.to_string(),
            Failure {
                code,
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Extra stdout line printed by `subcommand`
    pub fn output(mut self, subcommand: &str, line: &str) -> Self {
        self.output
            .entry(subcommand.to_string())
            .or_default()
            .push(line.to_string());
        self
    }

    /// Write the script (and an empty log) into `dir`
    pub fn install(&self, dir: &Path) -> InstalledFake {
        let binary = dir.join("fake-terraform");
        let log = dir.join("invocations.log");
        std::fs::write(&log, b"").expect("create invocation log");
        std::fs::write(&binary, self.script(&log)).expect("write fake terraform");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755))
                .expect("chmod fake terraform");
        }

        InstalledFake { binary, log }
    }

    fn script(&self, log: &Path) -> String {
        let mut script = String::from("#!/bin/sh\n");
        let _ = writeln!(
            script,
            "echo \"$(basename \"$(pwd -P)\") $*\" >> {}",
            quote(&log.display().to_string())
        );
        script.push_str("case \"$1\" in\n");

        for sub in SUBCOMMANDS {
            let _ = writeln!(script, "  {sub})");
            let _ = writeln!(script, "    echo {}", quote(&format!("fake terraform {sub}")));
            for line in self.output.get(sub).into_iter().flatten() {
                let _ = writeln!(script, "    echo {}", quote(line));
            }
            if sub == "apply" {
                script.push_str(
                    "    [ -f tfplan ] || { echo 'Error: plan file tfplan not found' >&2; exit 2; }\n",
                );
            }
            match self.failures.get(sub) {
                Some(failure) => {
                    for line in failure.stderr.lines() {
                        let _ = writeln!(script, "    echo {} >&2", quote(line));
                    }
                    let _ = writeln!(script, "    exit {}", failure.code);
                }
                None if sub == "plan" => script.push_str("    : > tfplan\n"),
                None => {}
            }
            script.push_str("    ;;\n");
        }

        script.push_str("  *)\n    echo \"unknown subcommand: $1\" >&2\n    exit 64\n    ;;\n");
        script.push_str("esac\nexit 0\n");
        script
    }
}

impl InstalledFake {
    /// Recorded invocations, oldest first
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Single-quote a string for sh
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_script_contains_failures() {
        let script = FakeTerraform::new()
            .fail("plan", 3, "Error: boom")
            .script(Path::new("/tmp/log"));
        assert!(script.contains("echo 'Error: boom' >&2\n    exit 3"));
        assert!(script.starts_with("#!/bin/sh\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_installed_script_runs_and_logs() {
        let dir = std::env::temp_dir().join(format!("chos-fake-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let fake = FakeTerraform::new().fail("destroy", 5, "nope").install(&dir);

        let status = std::process::Command::new(&fake.binary)
            .arg("destroy")
            .arg("-force")
            .current_dir(&dir)
            .output()
            .unwrap();

        assert_eq!(status.status.code(), Some(5));
        assert_eq!(String::from_utf8_lossy(&status.stderr), "nope\n");
        let expected = format!(
            "{} destroy -force",
            dir.file_name().unwrap().to_string_lossy()
        );
        assert_eq!(fake.invocations(), vec![expected]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
