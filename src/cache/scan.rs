// ABOUTME: Cursor-based SCAN enumeration with per-call timeout, bounded retries, and a runaway-cursor cap
// ABOUTME: Used by the Redis cache backend for clear/clearStale/getStats without a full KEYS scan

use crate::errors::{AppError, AppResult};
use crate::resilience::with_timeout;
use redis::aio::ConnectionLike;
use redis::AsyncCommands;
use std::future::Future;
use std::time::{Duration, Instant};

/// Outcome of a full `collect_all` cursor cycle.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Total number of keys collected.
    pub total_keys: usize,
    /// Number of SCAN calls issued.
    pub iterations: usize,
    /// Wall-clock duration of the whole cycle, in milliseconds.
    pub duration_ms: u64,
    /// Number of per-call retries consumed across the whole cycle.
    pub retries: u32,
    /// Whether the cursor reached zero (a full cycle) rather than aborting early.
    pub completed: bool,
    /// The error that aborted the cycle, if `completed` is false.
    pub error: Option<String>,
}

/// Configuration for a single scan cycle.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// `MATCH` pattern passed to each `SCAN` call.
    pub pattern: String,
    /// `COUNT` hint passed to each `SCAN` call.
    pub batch_size: usize,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Number of retries allowed per individual `SCAN` call.
    pub retries_per_scan: u32,
    /// Overall cap on the number of `SCAN` calls before aborting as a runaway cursor.
    pub max_iterations: usize,
}

impl ScanConfig {
    /// Build a scan config for the given pattern using the crate's default tuning.
    #[must_use]
    pub fn new(pattern: impl Into<String>, timeout: Duration) -> Self {
        use crate::constants::cache;
        Self {
            pattern: pattern.into(),
            batch_size: cache::SCAN_BATCH_SIZE,
            timeout,
            retries_per_scan: cache::SCAN_RETRIES_PER_CALL,
            max_iterations: cache::SCAN_MAX_ITERATIONS,
        }
    }
}

/// Cursor-based `SCAN` iteration over a Redis/Valkey keyspace (C2).
pub struct ScanIterator<'a, C: ConnectionLike + Send + Sync> {
    conn: &'a mut C,
    config: ScanConfig,
}

impl<'a, C: ConnectionLike + Send + Sync> ScanIterator<'a, C> {
    /// Construct a scan iterator bound to a live connection.
    pub fn new(conn: &'a mut C, config: ScanConfig) -> Self {
        Self { conn, config }
    }

    async fn scan_once(&mut self, cursor: u64) -> (AppResult<(u64, Vec<String>)>, u32) {
        let mut attempt = 0;
        loop {
            let pattern = self.config.pattern.clone();
            let batch_size = self.config.batch_size;
            let result = with_timeout("scan", self.config.timeout, async {
                let mut cmd = redis::cmd("SCAN");
                cmd.arg(cursor).arg("MATCH").arg(&pattern).arg("COUNT").arg(batch_size);
                cmd.query_async::<(u64, Vec<String>)>(self.conn)
                    .await
                    .map_err(AppError::from)
            })
            .await;

            match result {
                Ok(outcome) => return (Ok(outcome), attempt),
                Err(_err) if attempt < self.config.retries_per_scan => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(
                        crate::constants::cache::SCAN_RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }

    /// Drive the full cursor cycle, invoking `on_batch` for each non-empty batch of keys.
    /// Returns `Ok(stats)` on a completed cycle; on failure returns the partial stats and
    /// the error, matching the "MUST return partial results on failure" contract.
    pub async fn collect_all<F, Fut>(&mut self, mut on_batch: F) -> (Vec<String>, ScanStats)
    where
        F: FnMut(&[String]) -> Fut,
        Fut: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut cursor = 0u64;
        let mut keys = Vec::new();
        let mut stats = ScanStats::default();

        loop {
            if stats.iterations >= self.config.max_iterations {
                stats.error = Some(format!(
                    "scan aborted after {} iterations without completing a cursor cycle",
                    self.config.max_iterations
                ));
                break;
            }

            let (outcome, attempts) = self.scan_once(cursor).await;
            stats.retries += attempts;
            match outcome {
                Ok((next_cursor, batch)) => {
                    stats.iterations += 1;
                    if !batch.is_empty() {
                        on_batch(&batch).await;
                        stats.total_keys += batch.len();
                        keys.extend(batch);
                    }
                    cursor = next_cursor;
                    if cursor == 0 {
                        stats.completed = true;
                        break;
                    }
                }
                Err(err) => {
                    stats.error = Some(err.to_string());
                    break;
                }
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        (keys, stats)
    }

    /// Count keys matching the pattern without retaining them.
    pub async fn count(&mut self) -> usize {
        let (keys, _) = self.collect_all(|_| async {}).await;
        keys.len()
    }

    /// Whether at least one key matches the pattern.
    pub async fn exists(&mut self) -> bool {
        let mut cursor = 0u64;
        loop {
            match self.scan_once(cursor).await.0 {
                Ok((next_cursor, batch)) => {
                    if !batch.is_empty() {
                        return true;
                    }
                    cursor = next_cursor;
                    if cursor == 0 {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
    }

    /// Delete every key matching the pattern, in batches of `config.batch_size`.
    pub async fn delete_all(&mut self) -> ScanStats {
        let started = Instant::now();
        let mut cursor = 0u64;
        let mut stats = ScanStats::default();

        loop {
            if stats.iterations >= self.config.max_iterations {
                stats.error = Some(format!(
                    "scan aborted after {} iterations without completing a cursor cycle",
                    self.config.max_iterations
                ));
                break;
            }

            let (outcome, attempts) = self.scan_once(cursor).await;
            stats.retries += attempts;
            match outcome {
                Ok((next_cursor, batch)) => {
                    stats.iterations += 1;
                    if !batch.is_empty() {
                        if let Err(err) = AsyncCommands::del::<_, ()>(self.conn, &batch).await {
                            tracing::warn!(error = %err, "scan delete_all: DEL batch failed");
                        } else {
                            stats.total_keys += batch.len();
                        }
                    }
                    cursor = next_cursor;
                    if cursor == 0 {
                        stats.completed = true;
                        break;
                    }
                }
                Err(err) => {
                    stats.error = Some(err.to_string());
                    break;
                }
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_config_uses_shared_defaults() {
        let config = ScanConfig::new("auth_service:*", Duration::from_secs(1));
        assert_eq!(config.batch_size, crate::constants::cache::SCAN_BATCH_SIZE);
        assert_eq!(config.max_iterations, crate::constants::cache::SCAN_MAX_ITERATIONS);
    }
}
