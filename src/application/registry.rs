//! # Client Registry
//!
//! 識別子ごとにクライアントを1つだけ生成して使い回すレジストリ

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

/// 明示的に閉じることのできるクライアント
pub trait Closeable: Send + Sync {
    fn close(&self);
}

/// 識別子 → クライアントのレジストリ
///
/// マップ全体を1つのロックで守り、生成中もロックを保持する。
/// 同じ識別子への同時要求でも生成は1回だけ行われる。
pub struct ClientRegistry<K, C> {
    entries: Mutex<HashMap<K, Arc<C>>>,
}

impl<K, C> Default for ClientRegistry<K, C> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, C> ClientRegistry<K, C>
where
    K: Eq + Hash + Clone + Debug,
    C: Closeable,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// キャッシュ済みのクライアントを返すか、`build` で生成して登録します。
    ///
    /// 生成に失敗した場合はエラーをそのまま返し、何も登録しません。
    /// 次回の呼び出しで再び生成を試みます。
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, build: F) -> Result<Arc<C>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(client) = entries.get(&key) {
            debug!("Reusing cached client for {:?}", key);
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(build().await?);
        info!("Created client for {:?}", key);
        entries.insert(key, Arc::clone(&client));

        Ok(client)
    }

    pub async fn get(&self, key: &K) -> Option<Arc<C>> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// 全クライアントを閉じてレジストリを空にする
    ///
    /// 閉じた後に同じ識別子で要求すると新しいクライアントが生成される。
    pub async fn close_all(&self) {
        let mut entries = self.entries.lock().await;
        for (key, client) in entries.drain() {
            debug!("Closing client for {:?}", key);
            client.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeClient {
        id: String,
        closed: AtomicBool,
    }

    impl FakeClient {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                closed: AtomicBool::new(false),
            }
        }
    }

    impl Closeable for FakeClient {
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    async fn lookup(
        registry: &ClientRegistry<String, FakeClient>,
        key: &str,
        builds: &AtomicUsize,
    ) -> Arc<FakeClient> {
        registry
            .get_or_try_init(key.to_string(), || async {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(FakeClient::new(key))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_key_returns_same_instance() {
        let registry = ClientRegistry::new();
        let builds = AtomicUsize::new(0);

        let first = lookup(&registry, "proj-a", &builds).await;
        let second = lookup(&registry, "proj-a", &builds).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share() {
        let registry = ClientRegistry::new();
        let builds = AtomicUsize::new(0);

        let a = lookup(&registry, "proj-a", &builds).await;
        let b = lookup(&registry, "proj-b", &builds).await;

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.id, "proj-a");
        assert_eq!(b.id, "proj-b");
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let registry: ClientRegistry<String, FakeClient> = ClientRegistry::new();

        let result = registry
            .get_or_try_init("proj-a".to_string(), || async {
                Err::<FakeClient, _>(anyhow::anyhow!("could not authenticate"))
            })
            .await;
        assert!(result.is_err());
        assert!(registry.is_empty().await);

        let builds = AtomicUsize::new(0);
        let client = lookup(&registry, "proj-a", &builds).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(client.id, "proj-a");
    }

    #[tokio::test]
    async fn test_close_all_closes_and_clears() {
        let registry = ClientRegistry::new();
        let builds = AtomicUsize::new(0);

        let a = lookup(&registry, "proj-a", &builds).await;
        let b = lookup(&registry, "proj-b", &builds).await;

        registry.close_all().await;

        assert!(a.closed.load(Ordering::SeqCst));
        assert!(b.closed.load(Ordering::SeqCst));
        assert!(registry.is_empty().await);

        let rebuilt = lookup(&registry, "proj-a", &builds).await;
        assert!(!Arc::ptr_eq(&a, &rebuilt));
        assert!(!rebuilt.closed.load(Ordering::SeqCst));
        assert_eq!(builds.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_build_once() {
        let registry = Arc::new(ClientRegistry::<String, FakeClient>::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let builds = builds.clone();
            tasks.push(tokio::spawn(async move {
                registry
                    .get_or_try_init("shared".to_string(), || async {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, anyhow::Error>(FakeClient::new("shared"))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut clients = Vec::new();
        for task in tasks {
            clients.push(task.await.unwrap());
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(clients.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
