//! 保持するログファイル数の制限
//!
//! ログファイルを切り替えた後、現在のログファイルと同じ名前で始まるファイルを列挙して、
//! 更新日時が古い順に、最大バックアップ数を超えたファイルを削除する。
//! 現在のログファイルも数に含めるため、残るファイル数は最大で`max_backup_index + 1`になる。

use std::{io, path::PathBuf};

use crate::{
    diagnostics::Diagnostics,
    enumerator::{enumerate, FileMatcher, LogFileRef},
    error::{Error, Result},
    rotation::Rotate,
};

/// 既定の最大バックアップ数
pub const DEFAULT_MAX_BACKUP_INDEX: usize = 1;

/// 保持数の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// 現在のログファイル以外に残すファイル数。0の場合はバックアップを残さない。
    pub max_backup_index: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_backup_index: DEFAULT_MAX_BACKUP_INDEX,
        }
    }
}

impl RetentionConfig {
    pub fn new(max_backup_index: usize) -> Self {
        Self { max_backup_index }
    }
}

/// 削除に失敗したファイル
#[derive(Debug)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// 保持数の制限を適用した結果
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// 列挙したファイル数
    pub candidates: usize,
    /// 削除したファイル
    pub deleted: Vec<PathBuf>,
    /// 削除する前に、すでに存在しなくなっていたファイル
    pub vanished: Vec<PathBuf>,
    /// 削除に失敗したファイル
    pub failures: Vec<DeletionFailure>,
}

/// ログファイルの切り替えと、保持数の制限を行う。
///
/// ファイルの切り替えは`Rotate`に移譲する。
pub struct RetentionEnforcer<R, D> {
    rotator: R,
    config: RetentionConfig,
    matcher: FileMatcher,
    diagnostics: D,
}

impl<R: Rotate, D: Diagnostics> RetentionEnforcer<R, D> {
    pub fn new(rotator: R, config: RetentionConfig, matcher: FileMatcher, diagnostics: D) -> Self {
        Self {
            rotator,
            config,
            matcher,
            diagnostics,
        }
    }

    pub fn max_backup_index(&self) -> usize {
        self.config.max_backup_index
    }

    pub fn set_max_backup_index(&mut self, max_backup_index: usize) {
        self.config.max_backup_index = max_backup_index;
    }

    pub fn rotator(&self) -> &R {
        &self.rotator
    }

    pub fn matcher(&self) -> &FileMatcher {
        &self.matcher
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// ログファイルを切り替えた後、保持数の制限を適用する。
    ///
    /// 切り替えに失敗した場合は、ファイルを削除せずにエラーを返却する。
    pub fn roll_over(&mut self) -> Result<RetentionReport> {
        self.rotator.roll_over().map_err(Error::Rollover)?;

        Ok(self.enforce())
    }

    /// 保持数の制限を適用する。
    ///
    /// 削除に失敗したファイルがあっても、残りのファイルの削除を続ける。
    pub fn enforce(&self) -> RetentionReport {
        self.diagnostics
            .debug(&format!("maxBackupIndex: {}", self.config.max_backup_index));

        let mut files = enumerate(
            self.rotator.active_path(),
            &self.matcher,
            &self.diagnostics,
        );
        let mut report = RetentionReport {
            candidates: files.len(),
            ..RetentionReport::default()
        };

        let excess = excess_count(files.len(), self.config.max_backup_index);
        if excess == 0 {
            return report;
        }

        sort_by_modified(&mut files);
        for file in files.into_iter().take(excess) {
            match std::fs::remove_file(&file.path) {
                Ok(()) => {
                    self.diagnostics
                        .debug(&format!("deleted {}", file.path.display()));
                    report.deleted.push(file.path);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    report.vanished.push(file.path);
                }
                Err(err) => {
                    self.diagnostics.warn(&format!(
                        "failed to delete {}: {}",
                        file.path.display(),
                        err
                    ));
                    report.failures.push(DeletionFailure {
                        path: file.path,
                        error: err,
                    });
                }
            }
        }

        report
    }
}

/// 削除するファイル数を返却する。
///
/// 現在のログファイルが1つ分を占めるため、`max_backup_index + 1`を超えた数になる。
fn excess_count(count: usize, max_backup_index: usize) -> usize {
    count.saturating_sub(max_backup_index.saturating_add(1))
}

/// 更新日時の昇順に並べ替える。同じ更新日時のファイルは列挙順を維持する。
fn sort_by_modified(files: &mut [LogFileRef]) {
    files.sort_by_key(|file| file.modified);
}
