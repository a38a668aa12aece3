// crates/publish-gate-cli/tests/common/mod.rs
// =============================================================================
// Module: CLI Test Helpers
// Description: Workspace fixtures and a local gate for CLI integration tests.
// Purpose: Reduce duplication across CLI command suites.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::thread;
use std::thread::JoinHandle;

use ed25519_dalek::SigningKey;
use tempfile::TempDir;
use tiny_http::Response;
use tiny_http::Server;

/// Seed of the test signing key.
pub const KEY_SEED: [u8; 32] = [9u8; 32];

/// Software bill of materials written into each workspace.
pub const SBOM_JSON: &str = r#"{"bomFormat":"CycloneDX","components":[]}"#;

/// Returns the CLI binary path.
pub fn publish_gate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_publish-gate"))
}

/// Runs the CLI with the given arguments.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(publish_gate_bin())
        .args(args)
        .env("PUBLISH_GATE_LOG", "warn")
        .output()
        .expect("run publish-gate")
}

/// Serves `count` gate requests with a fixed JSON body.
pub fn serve_gate(count: usize, body: &'static str) -> (String, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("bind gate");
    let addr = server.server_addr().to_ip().expect("ip addr");
    let handle = thread::spawn(move || {
        for _ in 0 .. count {
            let Ok(request) = server.recv() else {
                return;
            };
            let _ = request.respond(Response::from_string(body));
        }
    });
    (format!("http://{addr}/decide"), handle)
}

/// Temporary pipeline workspace with artifacts, keys, and a config file.
pub struct Workspace {
    /// Owning temp directory.
    pub dir: TempDir,
    /// Path to `publish-gate.toml`.
    pub config: PathBuf,
}

impl Workspace {
    /// Creates a workspace whose gate lives at `gate_url`.
    pub fn new(gate_url: &str) -> Self {
        Self::with_key(gate_url, true)
    }

    /// Creates a workspace, optionally omitting the signing key file.
    pub fn with_key(gate_url: &str, write_key: bool) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("dist/assets")).expect("dist");
        fs::write(root.join("dist/app.js"), b"console.log('release')").expect("app.js");
        fs::write(root.join("dist/assets/logo.svg"), b"<svg/>").expect("logo");
        if write_key {
            fs::write(root.join("release.key"), KEY_SEED).expect("key");
        }
        let public = SigningKey::from_bytes(&KEY_SEED).verifying_key().to_bytes();
        fs::write(root.join("release.pub"), public).expect("public key");
        fs::write(root.join("sbom.json"), SBOM_JSON).expect("sbom");

        let config = root.join("publish-gate.toml");
        let content = format!(
            r#"
[pipeline]
signing_key = "release.key"
report_dir = "reports"
sbom = "sbom.json"

[artifacts]
root = "dist"
include = ["app.js", "assets"]

[[checks]]
name = "bundle-size"
type = "file_size"
max_bytes = 4096

[gate]
url = "{gate_url}"
allow_http = true
max_attempts = 1

[[publishers]]
name = "archive"
type = "local_archive"
dir = "releases"

[ledger]
path = "evidence/ledger.sqlite"
fallback_dir = "evidence/fallback"
"#
        );
        fs::write(&config, content).expect("config");
        Self {
            dir,
            config,
        }
    }

    /// Returns the workspace root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the config path as a string argument.
    pub fn config_arg(&self) -> String {
        self.config.display().to_string()
    }

    /// Counts archives written by the local publisher.
    pub fn archive_count(&self) -> usize {
        let Ok(entries) = fs::read_dir(self.root().join("releases")) else {
            return 0;
        };
        entries
            .filter(|entry| {
                entry.as_ref().is_ok_and(|entry| {
                    entry.path().extension().is_some_and(|ext| ext == "tar")
                })
            })
            .count()
    }
}
