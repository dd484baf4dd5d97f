//! eco-monitor
//!
//! Библиотека для подсчёта статистики игроков по логам сервера Minetest
//! и расчёта эко-рейтинга.

pub mod types;
pub mod log_parser;
pub mod file_watcher;
pub mod state;
pub mod persistence;
pub mod scoring;
pub mod monitor;
pub mod report;
pub mod commands;

pub use types::*;
pub use log_parser::LogParser;
pub use file_watcher::{find_log_path, TailPoll, TailReader};
pub use state::Ledger;
pub use persistence::{StatsStore, StoreError};
pub use scoring::{leaderboard, score, EcoScore, Rating};
pub use monitor::{replay_log, run_monitor, Pipeline};
