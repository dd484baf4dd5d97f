//! Конвейер: строка лога -> действие -> счётчики -> периодическое сохранение
//!
//! Один поток управления: tail, классификация, изменение статистики и
//! сохранение идут последовательно в одном цикле, статистика передаётся по
//! `&mut` и никем больше не меняется.

use log::{error, info, trace, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::file_watcher::{FileWakeup, TailPoll, TailReader};
use crate::log_parser::LogParser;
use crate::persistence::{StatsStore, StoreError};
use crate::state::Ledger;
use crate::types::Counter;

/// Пауза после ошибки чтения
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Прогресс replay пишем каждые N строк
const REPLAY_PROGRESS_EVERY: u64 = 1000;

/// Счётчик несохранённых событий: сохраняем каждые `every` событий
#[derive(Debug, Clone)]
pub struct SaveBatch {
    every: u32,
    pending: u32,
}

impl SaveBatch {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            pending: 0,
        }
    }

    /// Засчитать событие. true — пора сохранять.
    pub fn record(&mut self) -> bool {
        self.pending = self.pending.saturating_add(1);
        self.is_due()
    }

    pub fn is_due(&self) -> bool {
        self.pending >= self.every
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Сохранение прошло успешно
    pub fn saved(&mut self) {
        self.pending = 0;
    }
}

/// Классификатор + статистика + хранилище
pub struct Pipeline<'a> {
    parser: &'a LogParser,
    ledger: &'a mut Ledger,
    store: &'a StatsStore,
    batch: SaveBatch,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        parser: &'a LogParser,
        ledger: &'a mut Ledger,
        store: &'a StatsStore,
        save_every: u32,
    ) -> Self {
        Self {
            parser,
            ledger,
            store,
            batch: SaveBatch::new(save_every),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    pub fn pending(&self) -> u32 {
        self.batch.pending()
    }

    /// Обработать одну строку лога.
    /// Возвращает увеличенный счётчик (None если строка не учитывается).
    pub fn process_line(&mut self, line: &str) -> Option<Counter> {
        let action = self.parser.classify(line)?;
        let counter = self.ledger.apply(&action);
        if counter.is_none() {
            trace!("Ignored {:?}", action);
            return None;
        }

        if self.batch.record() {
            // Ошибка сохранения не останавливает мониторинг: pending не сбрасывается,
            // следующее событие попробует снова
            if let Err(e) = self.flush() {
                error!("Failed to save stats: {}", e);
            }
        }
        counter
    }

    /// Сохранить статистику сейчас
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.save(self.ledger)?;
        info!(
            "Stats saved to {} ({} new events)",
            self.store.path().display(),
            self.batch.pending()
        );
        self.batch.saved();
        Ok(())
    }
}

/// Итог работы монитора
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Прочитано строк
    pub lines: u64,
    /// Засчитано событий
    pub events: u64,
}

/// Цикл tail'а. Работает, пока `shutdown` не станет true (или отправитель не исчезнет),
/// после чего делает финальное сохранение.
///
/// Остановка наблюдается между строками и во время ожидания новых данных.
pub async fn run_monitor(
    tail: &mut TailReader,
    pipeline: &mut Pipeline<'_>,
    mut wakeup: Option<FileWakeup>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<MonitorSummary, StoreError> {
    let mut summary = MonitorSummary::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        match tail.next_line() {
            Ok(TailPoll::Line(line)) => {
                summary.lines += 1;
                if pipeline.process_line(&line).is_some() {
                    summary.events += 1;
                }
            }
            Ok(TailPoll::Pending) => {
                // Нет новых данных, ждём
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = wait_for_change(&mut wakeup) => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) => {
                error!("{}", e);
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    info!(
        "Log monitor stopped: {} lines read, {} events counted",
        summary.lines, summary.events
    );
    pipeline.flush()?;
    Ok(summary)
}

async fn wait_for_change(wakeup: &mut Option<FileWakeup>) {
    match wakeup {
        Some(wakeup) => wakeup.changed().await,
        None => std::future::pending::<()>().await,
    }
}

/// Ошибки replay
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Итог replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: u64,
    pub events: u64,
}

/// Прогнать весь существующий лог через тот же классификатор и статистику,
/// затем сохранить один раз. `clear` сначала сбрасывает статистику.
pub fn replay_log(
    path: &Path,
    parser: &LogParser,
    ledger: &mut Ledger,
    store: &StatsStore,
    clear: bool,
) -> Result<ReplaySummary, ReplayError> {
    let io_err = |source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    if clear {
        ledger.reset();
    }
    info!("Processing existing log: {}", path.display());

    let mut reader = BufReader::new(file);
    let max_line_bytes = parser.max_line_bytes();
    let mut buf = Vec::new();
    let mut discarding = false;
    let mut summary = ReplaySummary::default();

    loop {
        // Как и в tail: не больше max_line_bytes + 1 байт в буфере
        let budget = max_line_bytes.saturating_add(1).saturating_sub(buf.len()).max(1);
        let n = Read::take(&mut reader, budget as u64)
            .read_until(b'\n', &mut buf)
            .map_err(io_err)?;
        let eof = n == 0;

        if !eof && buf.last() != Some(&b'\n') {
            if buf.len() > max_line_bytes {
                if !discarding {
                    warn!(
                        "Dropping log line longer than {} bytes (line {})",
                        max_line_bytes,
                        summary.lines + 1
                    );
                }
                buf.clear();
                discarding = true;
            }
            continue;
        }
        if eof && buf.is_empty() && !discarding {
            break;
        }
        summary.lines += 1;

        if discarding {
            discarding = false;
        } else {
            let line = String::from_utf8_lossy(&buf);
            if let Some(action) = parser.classify(line.trim_end()) {
                if ledger.apply(&action).is_some() {
                    summary.events += 1;
                }
            }
        }
        buf.clear();

        if summary.lines % REPLAY_PROGRESS_EVERY == 0 {
            info!("Processed {} lines, found {} events...", summary.lines, summary.events);
        }
        if eof {
            break;
        }
    }

    info!(
        "Processing complete: {} lines, {} relevant events",
        summary.lines, summary.events
    );
    store.save(ledger)?;
    info!("Stats saved to {}", store.path().display());
    Ok(summary)
}
