//! # Client Handle
//!
//! 閉じることのできる共有セッション

use std::sync::{Arc, RwLock};

/// SDK セッションを保持するスロット
///
/// `acquire` は `Arc` の複製を返すため、`close` 後も実行中の呼び出しは
/// 手元のセッションで最後まで進む。新しい呼び出しは `None` を受け取る。
#[derive(Debug)]
pub struct ClientHandle<R> {
    slot: RwLock<Option<Arc<R>>>,
}

impl<R> ClientHandle<R> {
    pub fn open(session: R) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(session))),
        }
    }

    /// 一度も開かれていないハンドル
    pub fn closed() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// セッションを取得。閉じられていれば `None`
    pub fn acquire(&self) -> Option<Arc<R>> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// セッションを手放す。何度呼んでもよい
    ///
    /// # Returns
    ///
    /// このハンドルが開いていた場合に `true`
    pub fn close(&self) -> bool {
        self.slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.acquire().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_open_handle() {
        let handle = ClientHandle::open(String::from("session"));
        assert_eq!(handle.acquire().as_deref().map(String::as_str), Some("session"));
        assert!(!handle.is_closed());
    }

    #[test]
    fn test_close_is_idempotent() {
        let handle = ClientHandle::open(1u8);
        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
        assert!(handle.acquire().is_none());
    }

    #[test]
    fn test_close_never_opened() {
        let handle: ClientHandle<u8> = ClientHandle::closed();
        assert!(!handle.close());
        assert!(handle.is_closed());
    }

    #[test]
    fn test_in_flight_session_survives_close() {
        let handle = ClientHandle::open(vec![1, 2, 3]);
        let in_flight = handle.acquire().unwrap();

        handle.close();

        assert_eq!(*in_flight, vec![1, 2, 3]);
        assert_eq!(Arc::strong_count(&in_flight), 1);
    }
}
