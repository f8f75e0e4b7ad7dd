//! # Column Metadata
//!
//! テーブルスキーマの列情報

use serde::{Deserialize, Serialize};

/// 列モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// テーブル作成・スキーマ取得で使う列定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// 列名
    pub name: String,
    /// 宣言された型（例: "STRING", "INTEGER"）
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub mode: FieldMode,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            mode: FieldMode::Nullable,
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }
}

/// 列名と型のペア
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub column_name: String,
    pub data_type: String,
}

impl From<&FieldSchema> for Column {
    fn from(field: &FieldSchema) -> Self {
        Self {
            column_name: field.name.clone(),
            data_type: field.data_type.clone(),
        }
    }
}

/// 列情報の一覧
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Columns(Vec<Column>);

impl Columns {
    pub fn new(columns: Vec<Column>) -> Self {
        Self(columns)
    }

    /// 列名の昇順に並び替えます（安定ソート）。
    ///
    /// # 例
    ///
    /// ```
    /// use gcpkit::domain::entities::column::{Column, Columns};
    ///
    /// let mut columns = Columns::new(vec![
    ///     Column { column_name: "b".into(), data_type: "STRING".into() },
    ///     Column { column_name: "a".into(), data_type: "INTEGER".into() },
    /// ]);
    /// columns.sort();
    /// assert_eq!(columns.as_slice()[0].column_name, "a");
    /// ```
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.column_name.cmp(&b.column_name));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Column] {
        &self.0
    }
}

impl From<&[FieldSchema]> for Columns {
    fn from(schema: &[FieldSchema]) -> Self {
        Self(schema.iter().map(Column::from).collect())
    }
}

impl IntoIterator for Columns {
    type Item = Column;
    type IntoIter = std::vec::IntoIter<Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
