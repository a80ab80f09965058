//! ログファイルの列挙
//!
//! 現在のログファイルと同じディレクトリにあり、ファイル名がログファイル名と一致する
//! ファイルを列挙する。列挙したファイルには、現在のログファイル自身も含まれる。

use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use regex::Regex;

use crate::diagnostics::Diagnostics;

/// 保持数の判定対象となるファイル。
///
/// 更新日時は列挙したときに一度だけ取得する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileRef {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// 列挙するファイル名の判定方法
#[derive(Debug, Clone, Default)]
pub enum FileMatcher {
    /// ファイル名がログファイル名で始まるファイルを対象とする。
    ///
    /// `app.log`に対して`app.log2`や`app.log.bak`も対象になる。
    /// ファイル名はバイト列のまま比較する。
    #[default]
    Prefix,
    /// ファイル名が正規表現に一致するファイルを対象とする。
    /// UTF-8でないファイル名は対象外。
    Pattern(Regex),
}

impl FileMatcher {
    /// 正規表現から`FileMatcher::Pattern`を作成する。
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    /// ファイル名が対象かどうかを返却する。
    ///
    /// # 引数
    ///
    /// - base_name: 現在のログファイル名。
    /// - name: ディレクトリ内のファイル名。
    pub fn matches(&self, base_name: &OsStr, name: &OsStr) -> bool {
        match self {
            FileMatcher::Prefix => name
                .as_encoded_bytes()
                .starts_with(base_name.as_encoded_bytes()),
            FileMatcher::Pattern(regex) => name.to_str().is_some_and(|name| regex.is_match(name)),
        }
    }
}

/// 現在のログファイルと同じディレクトリにある対象ファイルを列挙する。
///
/// ディレクトリが存在しない、または読み込めない場合は、空の`Vec`を返却する。
/// 列挙順は保証しない。
///
/// # 引数
///
/// - active_path: 現在のログファイルのパス。
/// - matcher: ファイル名の判定方法。
/// - diagnostics: 診断メッセージの出力先。
///
/// # 戻り値
///
/// 対象ファイルのリスト。
pub fn enumerate(
    active_path: &Path,
    matcher: &FileMatcher,
    diagnostics: &dyn Diagnostics,
) -> Vec<LogFileRef> {
    let base_name: OsString = match active_path.file_name() {
        Some(name) => name.to_os_string(),
        None => {
            diagnostics.warn(&format!(
                "log file path {} has no file name",
                active_path.display()
            ));
            return Vec::new();
        }
    };
    let directory = match parent_directory(active_path) {
        Some(directory) => directory,
        None => {
            diagnostics.warn(&format!(
                "unable to resolve the directory of {}",
                active_path.display()
            ));
            return Vec::new();
        }
    };
    diagnostics.debug(&format!(
        "directory name: {}, current file name: {}",
        directory.display(),
        base_name.to_string_lossy()
    ));

    let entries = match fs::read_dir(&directory) {
        Ok(entries) => entries,
        Err(err) => {
            diagnostics.warn(&format!(
                "unable to list {}: {}",
                directory.display(),
                err
            ));
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                diagnostics.debug(&format!("skipping unreadable entry: {}", err));
                continue;
            }
        };
        let name = entry.file_name();
        if !matcher.matches(&base_name, &name) {
            continue;
        }
        // 一覧の取得後に削除されたファイルは対象外
        match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => files.push(LogFileRef {
                path: entry.path(),
                modified,
            }),
            Err(err) => diagnostics.debug(&format!(
                "skipping {}: {}",
                entry.path().display(),
                err
            )),
        }
    }

    files
}

/// ログファイルのディレクトリを返却する。
///
/// `app.log`のようにディレクトリを含まないパスは、カレントディレクトリから解決する。
fn parent_directory(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(parent.to_path_buf()),
        _ => env::current_dir()
            .ok()
            .map(|cwd| cwd.join(path))
            .and_then(|absolute| absolute.parent().map(Path::to_path_buf)),
    }
}
