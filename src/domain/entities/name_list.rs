//! # Name List
//!
//! プロジェクト・データセット・テーブル・バケット・ファイル名などの名前一覧

use std::fmt;

use serde::{Deserialize, Serialize};

/// 順序付きの名前一覧
///
/// 挿入順を保持し、明示的に `sort` した場合のみ辞書順に並び替える
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameList(Vec<String>);

impl NameList {
    /// 空の名前一覧を作成
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// 名前を末尾に追加
    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    /// 名前が含まれているかチェックします（大文字小文字を区別する完全一致）。
    ///
    /// # 例
    ///
    /// ```
    /// use gcpkit::domain::entities::name_list::NameList;
    ///
    /// let names = NameList::from(vec!["events", "users"]);
    /// assert!(names.contains("users"));
    /// assert!(!names.contains("Users"));
    /// assert!(!NameList::new().contains(""));
    /// ```
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    /// 辞書順（昇順）に並び替える
    pub fn sort(mut self) -> Self {
        self.0.sort();
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for NameList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl From<Vec<String>> for NameList {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for NameList {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for NameList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<String> for NameList {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for NameList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a NameList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
