//! # Domain Entities
//!
//! ビジネスエンティティとバリューオブジェクトを定義するモジュール
//!
//! ## エンティティ
//!
//! - **NameList**: 名前一覧（プロジェクト、テーブル、バケット等）
//! - **Columns**: テーブルの列情報
//! - **TableRef / ExtractRequest**: BigQuery のテーブル参照とエクスポート
//! - **WideRow**: Bigtable の行

pub mod column;
pub mod name_list;
pub mod table_ref;
pub mod wide_row;
