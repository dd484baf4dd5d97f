//! Команды CLI
//!
//! Тонкий слой поверх конвейера: разрешение настроек, запуск монитора и
//! replay, вывод отчётов.

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

use crate::file_watcher::{find_log_path, FileWakeup, InstanceLock, TailReader};
use crate::log_parser::LogParser;
use crate::monitor::{replay_log, run_monitor, Pipeline};
use crate::persistence::{self, StatsStore};
use crate::report::{render_leaderboard, render_table};
use crate::state::Ledger;
use crate::types::Settings;

pub const ENV_LOG: &str = "ECO_MONITOR_LOG";
pub const ENV_STATS: &str = "ECO_MONITOR_STATS";
pub const ENV_SAVE_EVERY: &str = "ECO_MONITOR_SAVE_EVERY";
pub const ENV_POLL_MS: &str = "ECO_MONITOR_POLL_MS";

/// Настройки: значения по умолчанию -> settings.json -> переменные окружения -> флаг --stats
pub fn resolve_settings(stats_override: Option<PathBuf>) -> Settings {
    let mut settings = match persistence::load_settings() {
        Ok(Some(settings)) => settings,
        Ok(None) => Settings::default(),
        Err(e) => {
            warn!("Failed to load settings, using defaults: {}", e);
            Settings::default()
        }
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    if let Some(path) = stats_override {
        settings.stats_path = path;
    }
    settings
}

/// Переопределения из окружения; `lookup` отделён для тестов
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(path) = lookup(ENV_LOG) {
        settings.log_path = Some(PathBuf::from(path));
    }
    if let Some(path) = lookup(ENV_STATS) {
        settings.stats_path = PathBuf::from(path);
    }
    if let Some(raw) = lookup(ENV_SAVE_EVERY) {
        match raw.parse() {
            Ok(n) => settings.save_every = n,
            Err(_) => warn!("Ignoring invalid {}={}", ENV_SAVE_EVERY, raw),
        }
    }
    if let Some(raw) = lookup(ENV_POLL_MS) {
        match raw.parse() {
            Ok(ms) => settings.poll_interval_ms = ms,
            Err(_) => warn!("Ignoring invalid {}={}", ENV_POLL_MS, raw),
        }
    }
}

/// Найти лог: явный путь, затем путь из настроек, затем автопоиск
pub fn find_log_file(explicit: Option<PathBuf>, settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path);
    }
    if let Some(custom) = &settings.log_path {
        if custom.exists() {
            info!("Using log path from settings: {}", custom.display());
            return Some(custom.clone());
        }
        warn!("Configured log path does not exist: {}, trying auto-detect", custom.display());
    }
    find_log_path()
}

/// Запомнить путь к логу в settings.json
pub fn set_log_path(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("File does not exist: {}", path.display());
    }
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;

    let mut settings = persistence::load_settings()
        .context("failed to load settings")?
        .unwrap_or_default();
    settings.log_path = Some(path.clone());
    persistence::save_settings(&settings).context("failed to save settings")?;
    info!("Log path set to: {}", path.display());
    Ok(())
}

fn load_ledger(store: &StatsStore) -> Result<Ledger> {
    store.load().with_context(|| {
        format!(
            "refusing to start: fix or move {} away first",
            store.path().display()
        )
    })
}

/// Сигналы остановки монитора: Ctrl-C, на unix ещё SIGTERM (kill, systemctl stop)
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Обработчики ставятся сразу, а не при первом ожидании
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            tokio::select! {
                res = tokio::signal::ctrl_c() => res,
                _ = self.terminate.recv() => Ok(()),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await
        }
    }
}

/// Мониторинг лога в реальном времени до Ctrl-C или SIGTERM
pub async fn monitor(settings: &Settings, log: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(log_path) = find_log_file(log, settings) else {
        bail!("Log file not found; pass a path or run `set-log-path`");
    };

    let store = StatsStore::new(&settings.stats_path);
    let _lock = InstanceLock::acquire(&settings.stats_path, force)?;
    let mut ledger = load_ledger(&store)?;

    let mut tail = TailReader::open(&log_path, settings.max_line_bytes)?;
    let wakeup = match FileWakeup::new(&log_path) {
        Ok(wakeup) => Some(wakeup),
        Err(e) => {
            warn!("File notifications unavailable, polling only: {}", e);
            None
        }
    };

    let mut signals = ShutdownSignal::new().context("failed to install signal handlers")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signals.recv().await {
            Ok(()) => {
                info!("Stopping monitor...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Без сигнала монитор живёт до убийства процесса; tx не отпускаем
                error!("Failed to listen for shutdown signals: {}", e);
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    info!("Starting Minetest monitor for: {}", log_path.display());
    info!("Tracking: stone, sand, dirt, ores (coal/copper/tin/iron/gold/diamond), farming");
    info!("Stats saved to: {}", settings.stats_path.display());

    let parser = LogParser::with_max_line_bytes(settings.max_line_bytes);
    let mut pipeline = Pipeline::new(&parser, &mut ledger, &store, settings.save_every);
    run_monitor(
        &mut tail,
        &mut pipeline,
        wakeup,
        Duration::from_millis(settings.poll_interval_ms),
        shutdown_rx,
    )
    .await
    .context("final save failed")?;

    print_reports(&ledger);
    println!("\nStats saved to {}", settings.stats_path.display());
    Ok(())
}

/// Прогнать весь существующий лог. Берёт тот же lock, что и монитор.
pub fn replay(settings: &Settings, log: &Path, clear: bool, force: bool) -> Result<()> {
    let store = StatsStore::new(&settings.stats_path);
    let _lock = InstanceLock::acquire(&settings.stats_path, force)?;
    let mut ledger = if clear {
        info!("Clearing existing stats");
        Ledger::new()
    } else {
        load_ledger(&store)?
    };

    let parser = LogParser::with_max_line_bytes(settings.max_line_bytes);
    let summary = replay_log(log, &parser, &mut ledger, &store, clear)?;

    println!("\nProcessing complete!");
    println!("  Total lines processed: {}", summary.lines);
    println!("  Relevant events found: {}", summary.events);
    println!("  Stats saved to: {}", settings.stats_path.display());
    print_reports(&ledger);
    Ok(())
}

pub fn show_table(settings: &Settings) -> Result<()> {
    let ledger = load_ledger(&StatsStore::new(&settings.stats_path))?;
    print!("{}", render_table(&ledger));
    Ok(())
}

pub fn show_leaderboard(settings: &Settings) -> Result<()> {
    let ledger = load_ledger(&StatsStore::new(&settings.stats_path))?;
    print!("{}", render_leaderboard(&ledger));
    Ok(())
}

/// Сбросить всю статистику и сохранить пустой снапшот
pub fn clear_stats(settings: &Settings, force: bool) -> Result<()> {
    let store = StatsStore::new(&settings.stats_path);
    let _lock = InstanceLock::acquire(&settings.stats_path, force)?;
    // Битый снапшот тоже можно сбросить: это и есть способ из него выйти
    let mut ledger = store.load().unwrap_or_default();
    ledger.reset();
    store.save(&ledger)?;
    println!("Cleared existing stats.");
    Ok(())
}

fn print_reports(ledger: &Ledger) {
    print!("{}", render_table(ledger));
    println!("\n{}", "=".repeat(50));
    print!("{}", render_leaderboard(ledger));
}
