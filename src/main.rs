//! eco-monitor - трекинг действий игроков на сервере Minetest
//!
//! Основные возможности:
//! - Подсчёт копания и посадок по игрокам из debug.txt в реальном времени
//! - Разовый прогон всего существующего лога
//! - Таблица статистики и эко-лидерборд

use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{info, LevelFilter};
use std::path::PathBuf;

use eco_monitor::commands;

#[derive(Parser)]
#[command(name = "eco-monitor", version, about = "Minetest player activity and eco score tracker")]
struct Cli {
    /// Файл статистики (по умолчанию из настроек или minetest_stats.json)
    #[arg(long, global = true)]
    stats: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Отслеживать лог в реальном времени (Ctrl-C для остановки)
    Monitor {
        /// Путь к debug.txt (иначе из настроек или автопоиск)
        log: Option<PathBuf>,
        /// Перехватить lock, оставшийся после аварийного завершения
        #[arg(long)]
        force: bool,
    },
    /// Прогнать весь существующий лог
    Replay {
        log: PathBuf,
        /// Сбросить статистику перед прогоном
        #[arg(long)]
        clear: bool,
        /// Перехватить lock, оставшийся после аварийного завершения
        #[arg(long)]
        force: bool,
    },
    /// Показать таблицу статистики
    Table,
    /// Показать эко-лидерборд
    Leaderboard,
    /// Сбросить всю статистику
    Clear {
        /// Перехватить lock, оставшийся после аварийного завершения
        #[arg(long)]
        force: bool,
    },
    /// Запомнить путь к логу в настройках
    SetLogPath { log: PathBuf },
}

/// Логирование: Info глобально, Debug для нашего крейта
fn log_builder() -> Builder {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("eco_monitor", LevelFilter::Debug);
    builder
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Загружаем .env (удобно на сервере). Если файла нет — просто продолжаем.
    let _ = dotenvy::dotenv();

    // RUST_LOG переопределяет уровни
    log_builder().parse_default_env().init();

    let cli = Cli::parse();
    info!("eco-monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let settings = commands::resolve_settings(cli.stats);

    match cli.command {
        Command::Monitor { log, force } => commands::monitor(&settings, log, force).await,
        Command::Replay { log, clear, force } => commands::replay(&settings, &log, clear, force),
        Command::Table => commands::show_table(&settings),
        Command::Leaderboard => commands::show_leaderboard(&settings),
        Command::Clear { force } => commands::clear_stats(&settings, force),
        Command::SetLogPath { log } => commands::set_log_path(&log),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Metadata};

    fn enabled(logger: &env_logger::Logger, target: &str, level: Level) -> bool {
        logger.enabled(&Metadata::builder().target(target).level(level).build())
    }

    #[test]
    fn test_debug_for_crate_only() {
        let logger = log_builder().build();
        assert!(enabled(&logger, "eco_monitor::state", Level::Debug));
        assert!(!enabled(&logger, "eco_monitor::state", Level::Trace));
        assert!(enabled(&logger, "notify", Level::Info));
        assert!(!enabled(&logger, "notify", Level::Debug));
    }
}
