#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use url::Url;

/// `file://` backend URL for a directory.
pub fn backend_url(path: &Path) -> String {
    Url::from_directory_path(path)
        .expect("Failed to convert path to file URL")
        .to_string()
}

fn command(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_depot"));
    cmd.env("HOME", home);
    cmd.env("XDG_DATA_HOME", home.join("data"));
    cmd.env("NO_COLOR", "1");
    cmd.env("CLICOLOR", "0");
    cmd.env_remove("DEPOT_BACKEND");
    cmd.env_remove("DEPOT_TABLE");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run the CLI against an explicit backend.
pub fn run_cli(args: &[&str], home: &Path, backend: &str) -> Output {
    let mut cmd = command(home);
    cmd.env("DEPOT_BACKEND", backend);
    cmd.args(args);
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI and expect success, returning stdout.
pub fn run_cli_success(args: &[&str], home: &Path, backend: &str) -> String {
    let output = run_cli(args, home, backend);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Run the CLI with no backend configured, so it falls back to the data
/// directory under `home`.
pub fn run_cli_default_backend(args: &[&str], home: &Path) -> Output {
    let mut cmd = command(home);
    cmd.args(args);
    cmd.output().expect("Failed to execute CLI")
}

/// Parse every stdout line as JSON.
pub fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line is not JSON"))
        .collect()
}

/// Extract the "Next cursor" token printed on stderr, if any.
pub fn next_cursor(stderr: &str) -> Option<String> {
    let (_, rest) = stderr.split_once("Next cursor: ")?;
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!token.is_empty()).then_some(token)
}
