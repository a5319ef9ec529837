// ABOUTME: Generic async operation-timeout wrapper shared by the cache and Kong adapter
// ABOUTME: Races a future against a named deadline, discarding the result on timeout

use crate::errors::AppResult;
use std::future::Future;
use std::time::Duration;

/// Race `fut` against `timeout`. On success or failure the original outcome is returned
/// unchanged. On deadline exceeded, the future is dropped (cancelling it, since tokio futures
/// are cooperatively cancelled when dropped) and a `TimeoutExceeded` error is returned instead.
pub async fn with_timeout<F, T>(operation: &str, timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(crate::errors::AppError::timeout_exceeded(
            operation,
            timeout.as_millis() as u64,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn returns_ok_when_operation_completes_in_time() {
        let result = with_timeout("noop", Duration::from_millis(50), async { Ok(42) }).await;
        assert_eq!(result.expect("operation should not time out"), 42);
    }

    #[tokio::test]
    async fn returns_timeout_error_when_operation_exceeds_deadline() {
        let result: AppResult<()> = with_timeout("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;

        let err = result.expect_err("operation should time out");
        assert_eq!(err.code, crate::errors::ErrorCode::TimeoutExceeded);
    }

    #[tokio::test]
    async fn propagates_the_original_failure_without_a_timeout() {
        let result: AppResult<()> =
            with_timeout("fails-fast", Duration::from_millis(50), async {
                Err(AppError::not_found("consumer"))
            })
            .await;

        let err = result.expect_err("operation should fail");
        assert_eq!(err.code, crate::errors::ErrorCode::NotFound);
    }
}
