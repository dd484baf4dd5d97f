//! Типы данных для eco-monitor
//!
//! Этот модуль содержит основные типы: события из логов, счётчики игроков
//! и настройки приложения.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Действие игрока, извлечённое из одной строки лога
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `<player> digs <block> at <coords>`
    Dig { player: String, block: String },
    /// `<player> places node <block> at <coords>`
    Place { player: String, block: String },
}

impl Action {
    /// Игрок, совершивший действие
    pub fn player(&self) -> &str {
        match self {
            Action::Dig { player, .. } | Action::Place { player, .. } => player,
        }
    }

    /// Идентификатор блока (`namespace:name`)
    pub fn block(&self) -> &str {
        match self {
            Action::Dig { block, .. } | Action::Place { block, .. } => block,
        }
    }
}

/// Закрытый набор счётчиков, которые ведутся по каждому игроку
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    Stone,
    Sand,
    Dirt,
    Coal,
    Copper,
    Tin,
    Iron,
    Gold,
    Diamond,
    Farming,
}

impl Counter {
    /// Все счётчики в порядке колонок таблицы
    pub const ALL: [Counter; 10] = [
        Counter::Stone,
        Counter::Sand,
        Counter::Dirt,
        Counter::Coal,
        Counter::Copper,
        Counter::Tin,
        Counter::Iron,
        Counter::Gold,
        Counter::Diamond,
        Counter::Farming,
    ];

    /// Шесть рудных счётчиков
    pub const ORES: [Counter; 6] = [
        Counter::Coal,
        Counter::Copper,
        Counter::Tin,
        Counter::Iron,
        Counter::Gold,
        Counter::Diamond,
    ];

    /// Короткое имя для заголовков и логов
    pub fn label(self) -> &'static str {
        match self {
            Counter::Stone => "Stone",
            Counter::Sand => "Sand",
            Counter::Dirt => "Dirt",
            Counter::Coal => "Coal",
            Counter::Copper => "Copper",
            Counter::Tin => "Tin",
            Counter::Iron => "Iron",
            Counter::Gold => "Gold",
            Counter::Diamond => "Diamnd",
            Counter::Farming => "Farming",
        }
    }

    pub fn is_ore(self) -> bool {
        Self::ORES.contains(&self)
    }
}

/// Накопленные счётчики одного игрока (персистятся в JSON)
///
/// Счётчики только растут: API для уменьшения нет. Поля, отсутствующие в
/// старых снапшотах (формат с тремя счётчиками), читаются как 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    #[serde(default)]
    pub(crate) stone_dug: u64,
    #[serde(default)]
    pub(crate) sand_dug: u64,
    #[serde(default)]
    pub(crate) dirt_dug: u64,
    #[serde(default)]
    pub(crate) coal_dug: u64,
    #[serde(default)]
    pub(crate) copper_dug: u64,
    #[serde(default)]
    pub(crate) tin_dug: u64,
    #[serde(default)]
    pub(crate) iron_dug: u64,
    #[serde(default)]
    pub(crate) gold_dug: u64,
    #[serde(default)]
    pub(crate) diamond_dug: u64,
    #[serde(default)]
    pub(crate) farming_placed: u64,
    /// Когда игрок последний раз засчитан (None для записей из старых снапшотов)
    #[serde(default)]
    pub(crate) last_seen: Option<DateTime<Utc>>,
}

impl CounterRecord {
    /// Текущее значение счётчика
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Stone => self.stone_dug,
            Counter::Sand => self.sand_dug,
            Counter::Dirt => self.dirt_dug,
            Counter::Coal => self.coal_dug,
            Counter::Copper => self.copper_dug,
            Counter::Tin => self.tin_dug,
            Counter::Iron => self.iron_dug,
            Counter::Gold => self.gold_dug,
            Counter::Diamond => self.diamond_dug,
            Counter::Farming => self.farming_placed,
        }
    }

    fn slot_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Stone => &mut self.stone_dug,
            Counter::Sand => &mut self.sand_dug,
            Counter::Dirt => &mut self.dirt_dug,
            Counter::Coal => &mut self.coal_dug,
            Counter::Copper => &mut self.copper_dug,
            Counter::Tin => &mut self.tin_dug,
            Counter::Iron => &mut self.iron_dug,
            Counter::Gold => &mut self.gold_dug,
            Counter::Diamond => &mut self.diamond_dug,
            Counter::Farming => &mut self.farming_placed,
        }
    }

    /// +1 к счётчику, возвращает новое значение
    pub(crate) fn increment(&mut self, counter: Counter) -> u64 {
        let slot = self.slot_mut(counter);
        *slot = slot.saturating_add(1);
        *slot
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Сумма всех шести рудных счётчиков
    pub fn ores(&self) -> u64 {
        Counter::ORES.iter().map(|c| self.get(*c)).sum()
    }

    /// Общая активность = сумма всех счётчиков
    pub fn total(&self) -> u64 {
        Counter::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Настройки приложения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Путь к debug.txt (если пользователь указал вручную)
    pub log_path: Option<PathBuf>,
    /// Куда сохранять статистику
    pub stats_path: PathBuf,
    /// Сохранять после каждых N засчитанных событий
    pub save_every: u32,
    /// Пауза между попытками чтения, когда новых строк нет
    pub poll_interval_ms: u64,
    /// Строки длиннее этого лимита отбрасываются
    pub max_line_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_path: None,
            stats_path: PathBuf::from("minetest_stats.json"),
            save_every: 10,
            poll_interval_ms: 100,
            max_line_bytes: 64 * 1024,
        }
    }
}
