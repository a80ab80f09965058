//! 内部診断メッセージの出力先
//!
//! ローテーションやファイル削除の失敗は、アペンダーが書き込んでいるログそのものには
//! 出力しない。`RetentionEnforcer`に渡された`Diagnostics`へ出力する。

use std::sync::Arc;

/// 診断メッセージを受け取るシンク。
pub trait Diagnostics: Send + Sync {
    /// デバッグ用のメッセージを出力する。
    fn debug(&self, message: &str);

    /// 処理は継続するが、利用者が知るべきメッセージを出力する。
    fn warn(&self, message: &str);
}

impl<D: Diagnostics + ?Sized> Diagnostics for Arc<D> {
    fn debug(&self, message: &str) {
        (**self).debug(message)
    }

    fn warn(&self, message: &str) {
        (**self).warn(message)
    }
}

/// 標準エラー出力に診断メッセージを出力するシンク。
///
/// デバッグメッセージは、`with_debug(true)`としたときだけ出力する。
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrDiagnostics {
    debug: bool,
}

impl StderrDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

const PREFIX: &str = "bounded-daily-rolling-appender";

impl Diagnostics for StderrDiagnostics {
    fn debug(&self, message: &str) {
        if self.debug {
            eprintln!("{}: {}", PREFIX, message);
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("{}: WARN {}", PREFIX, message);
    }
}

/// `tracing`のイベントとして診断メッセージを出力するシンク。
///
/// このアペンダー自身を書き込み先とするサブスクライバーの下では使用しないこと。
/// ロールオーバー中に発行したイベントが、同じアペンダーに戻ってくるためである。
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "bounded_daily_rolling_appender", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "bounded_daily_rolling_appender", "{}", message);
    }
}
