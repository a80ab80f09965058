//! Bounded Daily Rolling File Appender
//!
//! ----------------------------------------------------------------------------
//!
//! このクレートには、`BDRFAppender(Bounded Daily Rolling File Appender)`構造体が
//! 含まれており、この構造体は、ログを記録することを目的としている。
//! `BDRFAppender`は、日付でファイルを切り替える`DailyRotator`を内部にもち（合成）、
//! ファイルの切り替えを`DailyRotator`に移譲している。
//!
//! `BDRFAppender`は、日付が変わったとき、現在のログファイル`{file}`の名前を
//! `{file}{suffix}`に変更して、新しい`{file}`にログを記録する。
//!
//! また、`BDRFAppender`は、残しておく最大バックアップ数（`MaxBackupIndex`）を持つ。
//! ファイルを切り替えた後、ファイル名が`{file}`で始まるファイルを、現在のファイルを含めて
//! 列挙し、ファイル数が最大バックアップ数 + 1を超えた場合、更新日時が最も古いファイルから
//! 削除する。
//!
//! ```no_run
//! use bounded_daily_rolling_appender::BDRFAppender;
//!
//! let appender = BDRFAppender::new("logs/app.log", 7)?;
//! tracing_subscriber::fmt().with_writer(appender).init();
//! # Ok::<(), bounded_daily_rolling_appender::Error>(())
//! ```

pub mod appenders;
pub mod config;
pub mod diagnostics;
pub mod enumerator;
pub mod error;
pub mod retention;
pub mod rotation;

pub use appenders::{BDRFAppender, BDRFAppenderBuilder, RollingWriter};
pub use config::AppenderConfig;
pub use diagnostics::{Diagnostics, StderrDiagnostics, TracingDiagnostics};
pub use enumerator::{enumerate, FileMatcher, LogFileRef};
pub use error::{Error, Result};
pub use retention::{DeletionFailure, RetentionConfig, RetentionEnforcer, RetentionReport};
pub use rotation::{Clock, DailyRotator, Rotate, SystemClock};
