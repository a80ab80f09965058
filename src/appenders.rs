use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing_subscriber::fmt::MakeWriter;

use crate::{
    config::AppenderConfig,
    diagnostics::{Diagnostics, StderrDiagnostics},
    enumerator::FileMatcher,
    error::Result,
    retention::{RetentionConfig, RetentionEnforcer, RetentionReport, DEFAULT_MAX_BACKUP_INDEX},
    rotation::{Clock, DailyRotator, Rotate, SystemClock, DEFAULT_DATE_PATTERN},
};

type State<D> = RetentionEnforcer<DailyRotator, D>;

/// 日付でログファイルを切り替え、古いファイルを削除するアペンダー
///
/// `std::io::Write`と`tracing_subscriber::fmt::MakeWriter`を実装している。
pub struct BDRFAppender<D = StderrDiagnostics> {
    state: RwLock<State<D>>,
}

/// `BDRFAppender::make_writer`が返却するライター
pub struct RollingWriter<'a, D>(RwLockReadGuard<'a, State<D>>);

impl BDRFAppender {
    /// `BDRFAppender`を作成する。
    ///
    /// # 引数
    ///
    /// * file: 現在のログファイルのパス。
    /// * max_backup_index: 現在のログファイル以外に残す最大ファイル数。
    ///
    /// # 戻り値
    ///
    /// `BDRFAppender`インスタンス。
    pub fn new(file: impl AsRef<Path>, max_backup_index: usize) -> Result<BDRFAppender> {
        Self::builder(file).max_backup_index(max_backup_index).build()
    }

    pub fn builder(file: impl AsRef<Path>) -> BDRFAppenderBuilder {
        BDRFAppenderBuilder {
            file: file.as_ref().to_path_buf(),
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            max_backup_index: DEFAULT_MAX_BACKUP_INDEX,
            matcher: FileMatcher::Prefix,
            clock: Arc::new(SystemClock::local()),
            diagnostics: StderrDiagnostics::new(),
        }
    }

    /// 設定から`BDRFAppender`を作成する。
    pub fn from_config(config: &AppenderConfig) -> Result<BDRFAppender> {
        Self::builder(&config.file)
            .date_pattern(config.date_pattern.clone())
            .max_backup_index(config.max_backup_index)
            .matcher(config.matcher()?)
            .build()
    }
}

impl<D: Diagnostics> BDRFAppender<D> {
    pub fn max_backup_index(&self) -> usize {
        self.lock_read().max_backup_index()
    }

    pub fn set_max_backup_index(&self, max_backup_index: usize) {
        self.lock_write().set_max_backup_index(max_backup_index);
    }

    pub fn active_path(&self) -> PathBuf {
        self.lock_read().rotator().active_path().to_path_buf()
    }

    /// 日付が変わっていれば、ログファイルを切り替えて保持数の制限を適用する。
    ///
    /// # 戻り値
    ///
    /// 切り替えた場合は`Some`。
    pub fn roll_if_needed(&self) -> Result<Option<RetentionReport>> {
        if !self.lock_read().rotator().should_roll() {
            return Ok(None);
        }

        let mut state = self.lock_write();
        // 他のスレッドがすでに切り替えている場合がある
        if !state.rotator().should_roll() {
            return Ok(None);
        }
        state.roll_over().map(Some)
    }

    fn lock_read(&self) -> RwLockReadGuard<'_, State<D>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_write(&self) -> RwLockWriteGuard<'_, State<D>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: Diagnostics> io::Write for &BDRFAppender<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_if_needed()?;
        let state = self.lock_read();
        let mut file = state.rotator().file()?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let state = self.lock_read();
        let mut file = state.rotator().file()?;
        file.flush()
    }
}

impl<D: Diagnostics> io::Write for BDRFAppender<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut this: &BDRFAppender<D> = self;
        this.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut this: &BDRFAppender<D> = self;
        this.flush()
    }
}

impl<'a, D: Diagnostics + 'a> MakeWriter<'a> for BDRFAppender<D> {
    type Writer = RollingWriter<'a, D>;

    fn make_writer(&'a self) -> Self::Writer {
        // ログの出力は止めず、切り替えの失敗は診断メッセージとして出力する
        if let Err(err) = self.roll_if_needed() {
            self.lock_read().diagnostics().warn(&err.to_string());
        }
        RollingWriter(self.lock_read())
    }
}

impl<D: Diagnostics> io::Write for RollingWriter<'_, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.0.rotator().file()?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.0.rotator().file()?;
        file.flush()
    }
}

/// `BDRFAppender`のビルダー
pub struct BDRFAppenderBuilder<D = StderrDiagnostics> {
    file: PathBuf,
    date_pattern: String,
    max_backup_index: usize,
    matcher: FileMatcher,
    clock: Arc<dyn Clock>,
    diagnostics: D,
}

impl<D: Diagnostics> BDRFAppenderBuilder<D> {
    /// 切り替えたファイルの接尾語の書式。既定は`.[year]-[month]-[day]`。
    pub fn date_pattern(mut self, date_pattern: impl Into<String>) -> Self {
        self.date_pattern = date_pattern.into();
        self
    }

    pub fn max_backup_index(mut self, max_backup_index: usize) -> Self {
        self.max_backup_index = max_backup_index;
        self
    }

    pub fn matcher(mut self, matcher: FileMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn diagnostics<E: Diagnostics>(self, diagnostics: E) -> BDRFAppenderBuilder<E> {
        BDRFAppenderBuilder {
            file: self.file,
            date_pattern: self.date_pattern,
            max_backup_index: self.max_backup_index,
            matcher: self.matcher,
            clock: self.clock,
            diagnostics,
        }
    }

    pub fn build(self) -> Result<BDRFAppender<D>> {
        let rotator = DailyRotator::open(&self.file, self.date_pattern, self.clock)?;
        let enforcer = RetentionEnforcer::new(
            rotator,
            RetentionConfig::new(self.max_backup_index),
            self.matcher,
            self.diagnostics,
        );

        Ok(BDRFAppender {
            state: RwLock::new(enforcer),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{self, File},
        time::SystemTime,
    };

    use tempfile::TempDir;
    use time::{macros::datetime, Duration, OffsetDateTime};

    use super::*;
    use crate::{diagnostics::testing::Recorder, rotation::testing::ManualClock};

    const START: OffsetDateTime = datetime!(2024-01-01 10:00 UTC);

    fn stamp(path: &Path, at: OffsetDateTime) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::from(at)).unwrap();
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_appends_to_live_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut appender = BDRFAppender::new(&path, 1).unwrap();

        writeln!(appender, "hello").unwrap();
        appender.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        assert_eq!(appender.active_path(), path);
    }

    #[test]
    fn test_daily_rollover_keeps_max_backup_index_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = Arc::new(ManualClock::new(START));
        let mut appender = BDRFAppender::builder(&path)
            .max_backup_index(2)
            .clock(clock.clone())
            .diagnostics(Recorder::default())
            .build()
            .unwrap();

        for day in 0..5 {
            writeln!(appender, "day {}", day).unwrap();
            stamp(&path, START + Duration::days(day));
            clock.advance(Duration::days(1));
        }

        assert_eq!(
            remaining(dir.path()),
            vec!["app.log", "app.log.2024-01-03", "app.log.2024-01-04"]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("app.log.2024-01-04")).unwrap(),
            "day 3\n"
        );
    }

    #[test]
    fn test_set_max_backup_index_applies_to_next_rollover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = Arc::new(ManualClock::new(START));
        let mut appender = BDRFAppender::builder(&path)
            .max_backup_index(5)
            .clock(clock.clone())
            .diagnostics(Recorder::default())
            .build()
            .unwrap();

        for day in 0..3 {
            writeln!(appender, "day {}", day).unwrap();
            stamp(&path, START + Duration::days(day));
            clock.advance(Duration::days(1));
        }
        assert_eq!(appender.max_backup_index(), 5);
        appender.set_max_backup_index(0);
        writeln!(appender, "day 3").unwrap();

        assert_eq!(appender.max_backup_index(), 0);
        assert_eq!(remaining(dir.path()), vec!["app.log"]);
    }

    #[test]
    fn test_make_writer_with_tracing_subscriber() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = Arc::new(ManualClock::new(START));
        let appender = BDRFAppender::builder(&path)
            .clock(clock.clone())
            .diagnostics(Recorder::default())
            .build()
            .unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(appender)
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first day");
            clock.advance(Duration::days(1));
            tracing::info!("second day");
        });

        let rolled = fs::read_to_string(dir.path().join("app.log.2024-01-01")).unwrap();
        let live = fs::read_to_string(&path).unwrap();
        assert!(rolled.contains("first day"));
        assert!(live.contains("second day"));
        assert!(!live.contains("first day"));
    }

    fn blocked_appender(
        dir: &Path,
        clock: &Arc<ManualClock>,
        recorder: &Arc<Recorder>,
    ) -> BDRFAppender<Arc<Recorder>> {
        let path = dir.join("app.log");
        // 空でないディレクトリは削除も上書きもできない
        let blocker = dir.join("app.log.2024-01-01");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();
        let old = File::create(dir.join("app.log.old")).unwrap();
        old.set_modified(SystemTime::UNIX_EPOCH).unwrap();

        BDRFAppender::builder(&path)
            .max_backup_index(0)
            .clock(clock.clone())
            .diagnostics(Arc::clone(recorder))
            .build()
            .unwrap()
    }

    #[test]
    fn test_make_writer_keeps_logging_when_rollover_fails() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(START));
        let recorder = Arc::new(Recorder::default());
        let appender = blocked_appender(dir.path(), &clock, &recorder);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(appender)
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first day");
            clock.advance(Duration::days(1));
            tracing::info!("second day");
            tracing::info!("still second day");
        });

        assert_eq!(recorder.warnings.lock().unwrap().len(), 1);
        let live = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(live.contains("first day"));
        assert!(live.contains("still second day"));
        assert!(dir.path().join("app.log.old").exists());
        assert!(dir.path().join("app.log.2024-01-01").join("keep").exists());
    }

    #[test]
    fn test_write_returns_rollover_error_once() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(START));
        let recorder = Arc::new(Recorder::default());
        let mut appender = blocked_appender(dir.path(), &clock, &recorder);

        writeln!(appender, "first day").unwrap();
        clock.advance(Duration::days(1));
        assert!(appender.write(b"second day\n").is_err());
        writeln!(appender, "retry").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("app.log")).unwrap(),
            "first day\nretry\n"
        );
        assert!(dir.path().join("app.log.old").exists());
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let mut config = AppenderConfig::new(dir.path().join("app.log"));
        config.max_backup_index = 3;
        config.file_pattern = Some(r"^app\.log".to_string());

        let appender = BDRFAppender::from_config(&config).unwrap();

        assert_eq!(appender.max_backup_index(), 3);
        assert!(matches!(
            appender.lock_read().matcher(),
            FileMatcher::Pattern(_)
        ));
    }
}
