//! # Wide Row
//!
//! Bigtable の行・セル・行選択・フィルタ

use std::collections::BTreeMap;

/// 列修飾子 → 値
pub type ColumnValues = BTreeMap<String, Vec<u8>>;

/// 1つのセル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideCell {
    pub family: String,
    pub qualifier: String,
    pub value: Vec<u8>,
    pub timestamp_micros: i64,
}

/// 行キーとセルの一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    pub key: String,
    pub cells: Vec<WideCell>,
}

impl WideRow {
    pub fn new(key: impl Into<String>, cells: Vec<WideCell>) -> Self {
        Self {
            key: key.into(),
            cells,
        }
    }

    /// 指定した列の最新値を返す
    ///
    /// セルはサービスから新しい順に返されるため、最初に一致したセルを採用する
    pub fn value(&self, family: &str, qualifier: &str) -> Option<&[u8]> {
        self.cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
            .map(|c| c.value.as_slice())
    }
}

/// 読み取り対象の行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RowSelection {
    /// テーブル全体
    #[default]
    All,
    /// 行キーの一覧
    Keys(Vec<String>),
    /// 行キーの前方一致
    Prefix(String),
    /// `[start, end)` の範囲
    Range { start: String, end: String },
}

/// 読み取り時のフィルタ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// 列ごとに最新 N 個のセルのみ
    LatestN(u32),
    /// カラムファミリー名の正規表現
    FamilyRegex(String),
    /// 列修飾子の正規表現
    QualifierRegex(String),
    /// 値の正規表現
    ValueRegex(String),
    /// 順に適用するフィルタ
    Chain(Vec<RowFilter>),
}

/// 行読み取りの条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRowsOptions {
    pub selection: RowSelection,
    pub filter: Option<RowFilter>,
    /// 読み取る最大行数。`None` なら無制限
    pub limit: Option<usize>,
}

impl ReadRowsOptions {
    pub fn new(selection: RowSelection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Option<RowFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(family: &str, qualifier: &str, value: &str, ts: i64) -> WideCell {
        WideCell {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
            value: value.as_bytes().to_vec(),
            timestamp_micros: ts,
        }
    }

    #[test]
    fn test_value_returns_first_matching_cell() {
        let row = WideRow::new(
            "user#1",
            vec![
                cell("profile", "name", "new", 2),
                cell("profile", "name", "old", 1),
                cell("profile", "email", "a@example.com", 1),
            ],
        );
        assert_eq!(row.value("profile", "name"), Some("new".as_bytes()));
        assert_eq!(
            row.value("profile", "email"),
            Some("a@example.com".as_bytes())
        );
        assert_eq!(row.value("stats", "name"), None);
    }

    #[test]
    fn test_default_selection_is_all() {
        assert_eq!(RowSelection::default(), RowSelection::All);
    }
}
