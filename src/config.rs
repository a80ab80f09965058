//! アペンダーの設定
//!
//! キーは`PascalCase`で記述する。
//!
//! ```toml
//! File = "logs/app.log"
//! DatePattern = ".[year]-[month]-[day]"
//! MaxBackupIndex = 7
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    enumerator::FileMatcher, error::Result, retention::DEFAULT_MAX_BACKUP_INDEX,
    rotation::DEFAULT_DATE_PATTERN,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppenderConfig {
    /// 現在のログファイルのパス
    pub file: PathBuf,

    /// 切り替えたファイルの接尾語の書式
    #[serde(default = "default_date_pattern")]
    pub date_pattern: String,

    /// 現在のログファイル以外に残すファイル数
    #[serde(default = "default_max_backup_index")]
    pub max_backup_index: usize,

    /// 保持数の判定対象とするファイル名の正規表現。
    /// 指定しない場合は、ログファイル名で始まるすべてのファイルが対象となる。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
}

fn default_date_pattern() -> String {
    DEFAULT_DATE_PATTERN.to_string()
}

fn default_max_backup_index() -> usize {
    DEFAULT_MAX_BACKUP_INDEX
}

impl AppenderConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            date_pattern: default_date_pattern(),
            max_backup_index: default_max_backup_index(),
            file_pattern: None,
        }
    }

    /// 設定からファイル名の判定方法を作成する。
    pub fn matcher(&self) -> Result<FileMatcher> {
        match &self.file_pattern {
            Some(pattern) => Ok(FileMatcher::pattern(pattern)?),
            None => Ok(FileMatcher::Prefix),
        }
    }
}
