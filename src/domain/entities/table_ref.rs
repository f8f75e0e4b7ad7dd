//! # Warehouse Entities
//!
//! BigQuery のテーブル参照・クエリ結果・エクスポート先

use std::collections::BTreeMap;
use std::fmt;

/// クエリ結果の1行（列名 → 値）
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// テーブルの完全修飾名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// エクスポート形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    Csv,
    /// 改行区切り JSON
    Json,
}

impl ExtractFormat {
    /// BigQuery API の `destinationFormat`
    pub fn destination_format(&self) -> &'static str {
        match self {
            ExtractFormat::Csv => "CSV",
            ExtractFormat::Json => "NEWLINE_DELIMITED_JSON",
        }
    }
}

/// テーブルから Cloud Storage への抽出ジョブの内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub source: TableRef,
    /// `gs://bucket/path-*.csv` のようにワイルドカードを含めてよい
    pub destination_uri: String,
    pub format: ExtractFormat,
    /// CSV のみ有効
    pub field_delimiter: String,
    /// CSV のみ有効
    pub print_header: bool,
    pub gzip: bool,
    pub labels: BTreeMap<String, String>,
}

/// クエリジョブの内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryJob {
    pub project_id: String,
    /// クエリ文字列（検証せずそのまま渡す）
    pub query: String,
    pub labels: BTreeMap<String, String>,
    pub use_query_cache: Option<bool>,
}

impl QueryJob {
    pub fn new(project_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

/// クエリ実行の1ページ分の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub rows: Vec<QueryRow>,
    /// 次ページ取得用カーソル。`None` なら最終ページ
    pub cursor: Option<QueryCursor>,
}

/// 完了済みクエリジョブの続きを読むための位置情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCursor {
    pub job_id: String,
    pub location: Option<String>,
    pub page_token: String,
}
