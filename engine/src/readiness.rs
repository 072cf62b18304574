//! File readiness probing.
//!
//! Scanners and slow writers deliver PDFs over several seconds. Before a file
//! is handed to classification its size must be stable and it must be
//! openable for reading. [`probe`] checks exactly that, retrying a fixed
//! number of times with per-task sleeps so other pipelines keep running.

use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tokio::time::sleep;
use tracing::debug;

use crate::types::{EventSink, LogLevel};

/// Timing and budget for the readiness probe.
///
/// The defaults match production behavior; tests construct configs with
/// millisecond delays.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum number of probe attempts before giving up.
    pub max_attempts: u32,

    /// Wait between the two size stats of a single attempt.
    pub settle_delay: Duration,

    /// Wait between attempts after a failed or unstable probe.
    pub retry_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            settle_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of a readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Size is stable and the file is openable for reading.
    Ready,

    /// The file does not exist; the trigger is abandoned without retrying.
    Missing,

    /// The attempt budget was exhausted without the file becoming readable.
    Busy,
}

/// Probes whether `path` is safe to read.
///
/// Each attempt stats the file, rejects a zero size, re-stats after the
/// settle delay to confirm the size is stable, and finally opens the file for
/// reading. A missing file short-circuits to [`ReadyState::Missing`]; any
/// other failure consumes one attempt and waits out the retry delay.
pub async fn probe(path: &Path, config: &ProbeConfig, sink: &EventSink) -> ReadyState {
    for attempt in 1..=config.max_attempts {
        let size_before = match fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ReadyState::Missing,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "stat failed during readiness probe");
                sink.log(
                    LogLevel::Info,
                    format!("⏳ ファイル待機中... リトライ {attempt}/{}", config.max_attempts),
                )
                .await;
                wait_between_attempts(attempt, config).await;
                continue;
            }
        };

        if size_before == 0 {
            sink.log(
                LogLevel::Info,
                format!("📝 ファイルサイズ0... リトライ {attempt}/{}", config.max_attempts),
            )
            .await;
            wait_between_attempts(attempt, config).await;
            continue;
        }

        sleep(config.settle_delay).await;

        let size_after = match fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ReadyState::Missing,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "re-stat failed during readiness probe");
                sink.log(
                    LogLevel::Info,
                    format!("⏳ ファイル待機中... リトライ {attempt}/{}", config.max_attempts),
                )
                .await;
                wait_between_attempts(attempt, config).await;
                continue;
            }
        };

        if size_before != size_after {
            sink.log(
                LogLevel::Info,
                format!("📝 書き込み中... リトライ {attempt}/{}", config.max_attempts),
            )
            .await;
            wait_between_attempts(attempt, config).await;
            continue;
        }

        // Size is stable; confirm the file is actually openable (not locked).
        match fs::File::open(path).await {
            Ok(file) => {
                drop(file);
                return ReadyState::Ready;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "open failed during readiness probe");
                sink.log(
                    LogLevel::Info,
                    format!("⏳ ファイル待機中... リトライ {attempt}/{}", config.max_attempts),
                )
                .await;
                wait_between_attempts(attempt, config).await;
            }
        }
    }

    ReadyState::Busy
}

/// Sleeps the retry delay unless this was the final attempt.
async fn wait_between_attempts(attempt: u32, config: &ProbeConfig) {
    if attempt < config.max_attempts {
        sleep(config.retry_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::types::EngineEvent;

    fn fast_config() -> ProbeConfig {
        ProbeConfig {
            max_attempts: 3,
            settle_delay: Duration::from_millis(10),
            retry_delay: Duration::from_millis(10),
        }
    }

    fn sink() -> (EventSink, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (EventSink::new(tx), rx)
    }

    #[tokio::test]
    async fn missing_file_fails_immediately() {
        let (sink, _rx) = sink();
        let start = std::time::Instant::now();

        let state = probe(Path::new("/nonexistent/file.pdf"), &fast_config(), &sink).await;

        assert_eq!(state, ReadyState::Missing);
        // No retries: a missing file must not consume the attempt budget.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn stable_file_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let (sink, _rx) = sink();
        let state = probe(&path, &fast_config(), &sink).await;

        assert_eq!(state, ReadyState::Ready);
    }

    #[tokio::test]
    async fn empty_file_exhausts_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, b"").unwrap();

        let (sink, mut rx) = sink();
        let config = fast_config();
        let state = probe(&path, &config, &sink).await;

        assert_eq!(state, ReadyState::Busy);

        // One retry log per attempt.
        let mut retries = 0;
        while let Ok(Some(EngineEvent::Log(entry))) =
            timeout(Duration::from_millis(100), rx.recv()).await
        {
            assert!(entry.message.contains("リトライ"));
            retries += 1;
        }
        assert_eq!(retries, config.max_attempts);
    }

    #[tokio::test]
    async fn growing_file_retries_until_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        // Append in the background while the probe settles, then stop so a
        // later attempt observes a stable size.
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..3 {
                sleep(Duration::from_millis(5)).await;
                let mut content = std::fs::read(&writer_path).unwrap();
                content.extend_from_slice(b" more");
                std::fs::write(&writer_path, content).unwrap();
            }
        });

        let (sink, _rx) = sink();
        let config = ProbeConfig {
            max_attempts: 10,
            settle_delay: Duration::from_millis(20),
            retry_delay: Duration::from_millis(20),
        };
        let state = probe(&path, &config, &sink).await;

        writer.await.unwrap();
        assert_eq!(state, ReadyState::Ready);
    }

    #[tokio::test]
    async fn file_vanishing_mid_probe_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("fleeting.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let (sink, _rx) = sink();
        let config = ProbeConfig {
            max_attempts: 3,
            settle_delay: Duration::from_millis(50),
            retry_delay: Duration::from_millis(10),
        };

        let remover_path = path.clone();
        let remover = tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            std::fs::remove_file(&remover_path).unwrap();
        });

        let state = probe(&path, &config, &sink).await;
        remover.await.unwrap();

        assert_eq!(state, ReadyState::Missing);
    }
}
