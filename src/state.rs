//! Статистика игроков
//!
//! [`Ledger`] хранит накопленные счётчики по каждому игроку. Это единственное
//! место, где счётчики меняются: только через `ensure`, `apply` и `reset`.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Action, Counter, CounterRecord};

/// Счётчики всех игроков (player -> CounterRecord)
///
/// Игрок появляется здесь, только если по нему было хотя бы одно действие
/// с момента создания или последнего `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    players: BTreeMap<String, CounterRecord>,
}

impl Ledger {
    /// Пустая статистика
    pub fn new() -> Self {
        Self::default()
    }

    /// Создать запись игрока с нулевыми счётчиками (если её ещё нет)
    pub fn ensure(&mut self, player: &str) -> &mut CounterRecord {
        if !self.players.contains_key(player) {
            debug!("New player: {}", player);
        }
        self.players.entry(player.to_string()).or_default()
    }

    /// Учесть действие: +1 к соответствующему счётчику, обновить last_seen.
    /// Возвращает счётчик, который был увеличен (None если действие не учитывается).
    pub fn apply(&mut self, action: &Action) -> Option<Counter> {
        self.apply_at(action, Utc::now())
    }

    /// То же, что `apply`, но с явным временем
    pub fn apply_at(&mut self, action: &Action, now: DateTime<Utc>) -> Option<Counter> {
        let counter = Counter::for_action(action);
        let record = self.ensure(action.player());

        let counter = counter?;
        let total = record.increment(counter);
        record.last_seen = Some(now);

        debug!(
            "{} {} {} (total {}: {})",
            action.player(),
            match action {
                Action::Dig { .. } => "dug",
                Action::Place { .. } => "placed",
            },
            action.block(),
            counter.label(),
            total
        );
        Some(counter)
    }

    /// Сбросить всю статистику (явный запрос "clear stats")
    pub fn reset(&mut self) {
        info!("Clearing stats for {} players", self.players.len());
        self.players.clear();
    }

    pub fn get(&self, player: &str) -> Option<&CounterRecord> {
        self.players.get(player)
    }

    /// Игроки в порядке идентификатора
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CounterRecord)> {
        self.players.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Сумма по всем игрокам для каждого счётчика
    pub fn totals(&self) -> CounterRecord {
        let mut totals = CounterRecord::default();
        for record in self.players.values() {
            for counter in Counter::ALL {
                let slot = totals.get(counter).saturating_add(record.get(counter));
                totals.set_total(counter, slot);
            }
        }
        totals
    }
}

impl CounterRecord {
    // Только для агрегатов: у записей игроков счётчики меняются через increment
    fn set_total(&mut self, counter: Counter, value: u64) {
        match counter {
            Counter::Stone => self.stone_dug = value,
            Counter::Sand => self.sand_dug = value,
            Counter::Dirt => self.dirt_dug = value,
            Counter::Coal => self.coal_dug = value,
            Counter::Copper => self.copper_dug = value,
            Counter::Tin => self.tin_dug = value,
            Counter::Iron => self.iron_dug = value,
            Counter::Gold => self.gold_dug = value,
            Counter::Diamond => self.diamond_dug = value,
            Counter::Farming => self.farming_placed = value,
        }
    }
}
