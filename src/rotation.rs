//! 日付によるログファイルの切り替え
//!
//! 現在のログファイルは常に`{file}`であり、切り替えたファイルは、
//! `{file}{suffix}`に名前を変更する。`suffix`は、ファイルに記録した期間の日時を
//! `time`クレートの書式で書式化した文字列である。

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use time::{
    format_description::{self, OwnedFormatItem},
    OffsetDateTime, UtcOffset,
};

use crate::error::{Error, Result};

/// 既定の日付パターン。`app.log.2024-01-31`のような名前になる。
pub const DEFAULT_DATE_PATTERN: &str = ".[year]-[month]-[day]";

/// ログファイルを切り替える機能。
pub trait Rotate {
    /// 現在書き込んでいるログファイルのパス。
    fn active_path(&self) -> &Path;

    /// ログファイルを切り替える。
    fn roll_over(&mut self) -> io::Result<()>;
}

/// 現在日時を返す時計。
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

/// システム時刻を返す時計。
///
/// UTCオフセットは作成時に一度だけ決定する。夏時間のあるタイムゾーンで長時間
/// 動作させると、夏時間の切り替え後は、ファイルの切り替えが現地時刻の0時から
/// 1時間ずれる。
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    /// ローカルタイムゾーンの時計を作成する。
    ///
    /// ローカルのオフセットを取得できない場合は、UTCを使用する。
    /// Unixでは、複数のスレッドが動作しているとオフセットを取得できないことが多いため、
    /// スレッドを起動する前に作成するか、`with_offset`でオフセットを指定すること。
    pub fn local() -> Self {
        Self::with_offset(UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
    }

    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::local()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

/// 日付が変わったときに、ログファイルを切り替える。
pub struct DailyRotator {
    path: PathBuf,
    date_pattern: String,
    format: OwnedFormatItem,
    clock: Arc<dyn Clock>,
    current_suffix: String,
    file: Option<File>,
}

impl DailyRotator {
    /// `DailyRotator`を作成して、ログファイルを開く。
    ///
    /// ログファイルがすでに存在する場合は、そのファイルの更新日時が属する期間の
    /// ファイルとして扱う。
    ///
    /// # 引数
    ///
    /// - path: ログファイルのパス。
    /// - date_pattern: 切り替えたファイルの接尾語の書式。
    /// - clock: 現在日時を返す時計。
    ///
    /// # 戻り値
    ///
    /// `DailyRotator`インスタンス。
    pub fn open(
        path: impl AsRef<Path>,
        date_pattern: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(Error::InvalidPath(path));
        }
        let date_pattern = date_pattern.into();
        let format = format_description::parse(&date_pattern)
            .map(OwnedFormatItem::from)
            .map_err(|err| Error::InvalidDatePattern {
                pattern: date_pattern.clone(),
                message: err.to_string(),
            })?;

        let now = clock.now();
        let period = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => OffsetDateTime::from(modified).to_offset(now.offset()),
            Err(_) => now,
        };
        let current_suffix =
            format_suffix(&format, &period).map_err(|err| Error::InvalidDatePattern {
                pattern: date_pattern.clone(),
                message: err.to_string(),
            })?;
        let file = create_writer(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            date_pattern,
            format,
            clock,
            current_suffix,
            file: Some(file),
        })
    }

    /// ログファイルを切り替える必要があるかを返却する。
    pub fn should_roll(&self) -> bool {
        if self.file.is_none() {
            return true;
        }
        match format_suffix(&self.format, &self.clock.now()) {
            Ok(suffix) => suffix != self.current_suffix,
            Err(_) => false,
        }
    }

    /// 次に切り替えたときの、現在のログファイルの名前変更先。
    pub fn rolled_path(&self) -> PathBuf {
        create_rolled_filepath(&self.path, &self.current_suffix)
    }

    pub fn date_pattern(&self) -> &str {
        &self.date_pattern
    }

    pub(crate) fn file(&self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "log file is not open"))
    }

    /// 現在のログファイルを閉じて、名前を変更する。
    fn rename_active_file(&mut self) -> io::Result<()> {
        let target = self.rolled_path();
        // Windowsでは開いているファイルの名前を変更できない
        drop(self.file.take());

        if target.exists() {
            fs::remove_file(&target)?;
        }
        match fs::rename(&self.path, &target) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

impl Rotate for DailyRotator {
    fn active_path(&self) -> &Path {
        &self.path
    }

    fn roll_over(&mut self) -> io::Result<()> {
        let next_suffix = format_suffix(&self.format, &self.clock.now())?;
        if next_suffix == self.current_suffix && self.file.is_some() {
            return Ok(());
        }

        let renamed = if next_suffix != self.current_suffix {
            self.rename_active_file()
        } else {
            Ok(())
        };
        self.current_suffix = next_suffix;
        // 名前の変更に失敗しても、書き込みを続けられるようにファイルを開き直す
        self.file = Some(create_writer(&self.path)?);

        renamed
    }
}

/// 日付パターンで日時を書式化する。
///
/// # 引数
///
/// - format: 解析済みの日付パターン。
/// - date: 書式化する日時。
///
/// # 戻り値
///
/// ファイル名の接尾語。
fn format_suffix(format: &OwnedFormatItem, date: &OffsetDateTime) -> io::Result<String> {
    date.format(format)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
}

/// 切り替えたログファイルのパスを作成して返却する。
///
/// ログファイル名は、`{file_name}{suffix}`となる。
fn create_rolled_filepath(path: &Path, suffix: &str) -> PathBuf {
    let mut file_name = path.file_name().unwrap_or_default().to_os_string();
    file_name.push(suffix);

    path.with_file_name(file_name)
}

/// ライターを作成する。
///
/// 親ディレクトリが存在しない場合は作成する。
///
/// # 引数
///
/// * path: ログファイルパス。
///
/// # 戻り値
///
/// `File`インスタンス。
pub(crate) fn create_writer(path: &Path) -> io::Result<File> {
    let mut open_options = OpenOptions::new();
    open_options.append(true).create(true);

    let new_file = open_options.open(path);
    if new_file.is_err() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
            return open_options.open(path);
        }
    }

    new_file
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime};

    use super::Clock;

    /// テストから日時を進められる時計。
    pub(crate) struct ManualClock(Mutex<OffsetDateTime>);

    impl ManualClock {
        pub(crate) fn new(now: OffsetDateTime) -> Self {
            Self(Mutex::new(now))
        }

        pub(crate) fn advance(&self, duration: Duration) {
            *self.0.lock().unwrap() += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }
}
