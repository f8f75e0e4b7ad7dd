//! # Pagination
//!
//! ページ分割された一覧 API を最後まで読み切る

use std::future::Future;

use anyhow::Result;

/// 一覧 API の1ページ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 次ページのトークン。`None` または空文字なら最終ページ
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
        }
    }

    /// 最終ページを作成
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// ページを順に取得して全件を返します。
///
/// `fetch` には直前のページが返したトークンが渡されます（初回は `None`）。
/// いずれかのページ取得が失敗した時点で全体が失敗します。
///
/// # 例
///
/// ```
/// use gcpkit::domain::services::pagination::{collect_pages, Page};
///
/// # tokio_test_block(async {
/// let names = collect_pages(|token| async move {
///     Ok(match token.as_deref() {
///         None => Page::new(vec!["a", "b"], Some("p2".to_string())),
///         Some(_) => Page::last(vec!["c"]),
///     })
/// })
/// .await
/// .unwrap();
/// assert_eq!(names, vec!["a", "b", "c"]);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token.take()).await?;
        items.extend(page.items);

        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(items)
}
