//! # Deadline
//!
//! タイムアウト付きの非同期呼び出し

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

/// 呼び出しが制限時間内に終わらなかった
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("context deadline exceeded")]
pub struct DeadlineExceeded;

/// `timeout` が `Some` かつ 0 より大きい場合のみ制限時間を設ける
pub async fn with_timeout<T, Fut>(timeout: Option<Duration>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    with_deadline(deadline_after(timeout), fut).await
}

/// 絶対時刻の期限付きで実行する
pub async fn with_deadline<T, Fut>(deadline: Option<Instant>, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| anyhow::Error::new(DeadlineExceeded))?,
        None => fut.await,
    }
}

/// 現在時刻から `timeout` 後の期限（0 または `None` なら期限なし）
pub fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout
        .filter(|t| !t.is_zero())
        .map(|t| Instant::now() + t)
}

/// エラーチェーンにタイムアウトが含まれるか
pub fn is_deadline_exceeded(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| cause.is::<DeadlineExceeded>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(is_deadline_exceeded(&err));
    }

    #[tokio::test]
    async fn test_with_timeout_none_waits() {
        let result = with_timeout(None, async { Ok(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_with_timeout_zero_means_unbounded() {
        let result = with_timeout(Some(Duration::ZERO), async { Ok("done") })
            .await
            .unwrap();
        assert_eq!(result, "done");
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> =
            with_timeout(Some(Duration::from_secs(1)), async { anyhow::bail!("boom") }).await;
        let err = result.unwrap_err();
        assert!(!is_deadline_exceeded(&err));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_deadline_after() {
        assert!(deadline_after(None).is_none());
        assert!(deadline_after(Some(Duration::ZERO)).is_none());
        assert!(deadline_after(Some(Duration::from_secs(1))).is_some());
    }

    #[test]
    fn test_is_deadline_exceeded_through_context() {
        let err = anyhow::Error::new(DeadlineExceeded)
            .context("could not list tables");
        assert!(is_deadline_exceeded(&err));

        let wrapped: Result<()> = Err(err);
        let err = wrapped.context("outer").unwrap_err();
        assert!(is_deadline_exceeded(&err));
    }
}
