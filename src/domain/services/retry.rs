//! Retry Policy
//!
//! 固定間隔リトライと全体の制限時間

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use log::warn;
use tokio::time::Instant;

use super::deadline::{deadline_after, DeadlineExceeded};

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Convert error chain to string including all causes
pub fn error_chain_to_string(e: &anyhow::Error) -> String {
    let mut messages = Vec::new();
    for cause in e.chain() {
        messages.push(cause.to_string());
    }
    messages.join(" | ")
}

/// 固定間隔のリトライポリシー
///
/// 最大 `retries + 1` 回試行する。`timeout` を指定した場合、全試行の合計が
/// その時間を超えた時点で残りの試行を打ち切り、最後のエラーを返す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration, timeout: Option<Duration>) -> Self {
        Self {
            retries,
            delay,
            timeout: timeout.filter(|t| !t.is_zero()),
        }
    }

    /// Total number of attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// `operation` を成功するまで実行する
    ///
    /// `operation` には 1 始まりの試行番号が渡される。
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_until(deadline_after(self.timeout), operation).await
    }

    /// 期限を呼び出し側が決める版
    ///
    /// 前段の処理と期限を共有する場合に使う。`self.timeout` は無視される。
    pub async fn run_until<T, F, Fut>(&self, deadline: Option<Instant>, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, operation(attempt)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::Error::new(DeadlineExceeded)),
                },
                None => operation(attempt).await,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= self.max_attempts() {
                return Err(err);
            }

            if let Some(deadline) = deadline {
                if Instant::now() + self.delay >= deadline {
                    warn!(
                        "Attempt {} failed and the deadline leaves no room for another: {}",
                        attempt,
                        error_chain_to_string(&err)
                    );
                    return Err(err);
                }
            }

            warn!(
                "Attempt {}/{} failed, retrying in {:?}: {}",
                attempt,
                self.max_attempts(),
                self.delay,
                error_chain_to_string(&err)
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::domain::services::deadline::is_deadline_exceeded;

    fn counting_failure(
        calls: Arc<AtomicU32>,
        succeed_on: Option<u32>,
    ) -> impl FnMut(u32) -> std::future::Ready<Result<u32>> {
        move |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = match succeed_on {
                Some(k) if attempt == k => Ok(attempt),
                _ => Err(anyhow::anyhow!("extract failed on attempt {}", attempt)),
            };
            std::future::ready(result)
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.delay, Duration::from_millis(500));
        assert_eq!(policy.timeout, None);
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_zero_timeout_is_no_timeout() {
        let policy = RetryPolicy::new(1, Duration::ZERO, Some(Duration::ZERO));
        assert_eq!(policy.timeout, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_attempts_retries_plus_one() {
        for retries in 0..5 {
            let calls = Arc::new(AtomicU32::new(0));
            let policy = RetryPolicy::new(retries, Duration::from_millis(500), None);

            let err = policy
                .run(counting_failure(calls.clone(), None))
                .await
                .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
            assert_eq!(
                err.to_string(),
                format!("extract failed on attempt {}", retries + 1)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_attempt_k() {
        let retries = 3;
        for k in 1..=retries + 1 {
            let calls = Arc::new(AtomicU32::new(0));
            let policy = RetryPolicy::new(retries, Duration::from_millis(10), None);

            let value = policy
                .run(counting_failure(calls.clone(), Some(k)))
                .await
                .unwrap();

            assert_eq!(value, k);
            assert_eq!(calls.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(2, Duration::from_millis(500), None);
        let started = Instant::now();

        let _ = policy.run(counting_failure(calls.clone(), None)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_remaining_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(
            10,
            Duration::from_millis(200),
            Some(Duration::from_millis(300)),
        );

        let err = policy
            .run(counting_failure(calls.clone(), None))
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.to_string(), "extract failed on attempt 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_slow_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Some(Duration::from_millis(100)));

        let result: Result<()> = policy
            .run(|_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(is_deadline_exceeded(&result.unwrap_err()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shared_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_millis(100), None);
        let deadline = Instant::now() + Duration::from_millis(150);

        let _ = policy
            .run_until(Some(deadline), counting_failure(calls.clone(), None))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_chain_to_string() {
        let err = anyhow::anyhow!("root cause").context("could not run query");
        assert_eq!(error_chain_to_string(&err), "could not run query | root cause");
    }
}
