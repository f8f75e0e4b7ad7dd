//! # Application Layer
//!
//! アプリケーション固有の処理（クライアントラッパーとレジストリ）
//!
//! ## 特徴
//!
//! - Domain層の Repository trait に依存（実装には依存しない）
//! - ページ送り・タイムアウト・リトライ・エラーのタグ付けを担当
//! - 外部システムの詳細は知らない
//!
//! ## 構成要素
//!
//! - **dto**: Data Transfer Object
//! - **clients**: サービスごとのクライアントラッパー
//! - **registry**: 識別子ごとのクライアントキャッシュ

pub mod clients;
pub mod dto;
pub mod registry;
