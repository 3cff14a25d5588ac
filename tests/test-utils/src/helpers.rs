//! Test helper functions and utilities

use anyhow::Result;
use std::io::Write;
use std::sync::Once;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Initialize test logging once per test binary.
///
/// Log level comes from `RUST_LOG`; output goes through the test writer so
/// it is captured per test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Fail the test if `future` does not finish within `duration`
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl std::future::Future<Output = T>,
) -> Result<T> {
    timeout(duration, future)
        .await
        .map_err(|_| anyhow::anyhow!("Test timeout after {:?}", duration))
}

/// Write `contents` to a temporary file with the given extension
///
/// The file is removed when the returned handle drops.
pub fn temp_file(contents: &str, extension: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}
