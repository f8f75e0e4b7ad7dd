//! # Domain Services
//!
//! サービス呼び出しに共通するルール（ページ送り、リトライ、制限時間）

pub mod deadline;
pub mod pagination;
pub mod retry;
