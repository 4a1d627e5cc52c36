//! Helpers for testing the web server and the governance services.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. The directory is deleted as soon as the handle is dropped, and
//!    collections written into it vanish with it. Assign it to a variable in the test function
//!    (e.g. `let content_dir = gatekeeper_test::tempdir()`).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the gatekeeper crates and mutes all
///    other logs (such as hyper or tower).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("gatekeeper=trace,gatekeeper_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped, unless
/// [`into_path`](TempDir::into_path) is called. Use it as a guard to automatically clean up after
/// tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Writes `documents` as the collection `name` into a content directory.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_collection(dir: &Path, name: &str, documents: &Value) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    let contents = serde_json::to_vec_pretty(documents).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

/// Returns the value of a `Cookie` header carrying the session `token`.
pub fn session_cookie(token: &str) -> String {
    format!("theme=light; __session={token}")
}
