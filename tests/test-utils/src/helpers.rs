//! Test helper functions and utilities

use anyhow::Result;
use services_common::TransactionCreate;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

/// Initialize test logging; later calls are ignored
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout_duration` expires
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(timeout_duration, async {
        loop {
            if condition().await {
                return;
            }
            sleep(poll_interval).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Condition not met within {:?}", timeout_duration))
}

/// Run `future` with a deadline
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl std::future::Future<Output = T>,
) -> Result<T> {
    timeout(duration, future)
        .await
        .map_err(|_| anyhow::anyhow!("Test timeout after {:?}", duration))
}

/// Isolated temporary directory, removed on drop
#[derive(Debug)]
pub struct TestEnvironment {
    temp_dir: tempfile::TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    /// Path for a journal file inside the environment (not created)
    pub fn journal_path(&self) -> PathBuf {
        self.temp_dir.path().join("data").join("transactions.journal")
    }

    /// Write `requests` as JSON lines and return the file path
    pub fn write_json_lines(&self, name: &str, requests: &[TransactionCreate]) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        let mut file = std::fs::File::create(&path)?;
        for request in requests {
            writeln!(file, "{}", serde_json::to_string(request)?)?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories::TransactionFactory;

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let result = wait_for(
            || async { false },
            Duration::from_millis(20),
            Duration::from_millis(5),
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_write_json_lines() -> Result<()> {
        let env = TestEnvironment::new()?;
        let factory = TransactionFactory::new();
        let path = env.write_json_lines(
            "batch.jsonl",
            &[factory.request("a", 1.0), factory.request("b", 2.0)],
        )?;
        let contents = std::fs::read_to_string(path)?;
        assert_eq!(contents.lines().count(), 2);
        Ok(())
    }
}
