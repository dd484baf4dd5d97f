//! Эко-рейтинг игроков
//!
//! Чистые функции поверх [`CounterRecord`]: ничего не пишут в статистику.
//!
//! - Фермерство: +10 за каждую посадку
//! - Руда: +2 за каждый блок
//! - Камень: -1 за каждый блок
//! - Песок и земля: -2 за каждый блок

use serde::Serialize;
use std::cmp::Ordering;

use crate::state::Ledger;
use crate::types::{Counter, CounterRecord};

pub const FARMING_POINTS: i64 = 10;
pub const ORE_POINTS: i64 = 2;
pub const STONE_POINTS: i64 = -1;
pub const LANDSCAPE_POINTS: i64 = -2;

/// Разбивка эко-очков
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EcoScore {
    pub total: i64,
    pub farming: i64,
    pub ores: i64,
    pub extraction_penalty: i64,
    pub landscape_penalty: i64,
}

/// Эко-очки одного игрока
pub fn score(record: &CounterRecord) -> EcoScore {
    let farming = points(record.get(Counter::Farming), FARMING_POINTS);
    let ores = points(record.ores(), ORE_POINTS);
    let extraction_penalty = points(record.get(Counter::Stone), STONE_POINTS);
    let landscape_penalty = points(
        record.get(Counter::Sand).saturating_add(record.get(Counter::Dirt)),
        LANDSCAPE_POINTS,
    );

    EcoScore {
        total: farming
            .saturating_add(ores)
            .saturating_add(extraction_penalty)
            .saturating_add(landscape_penalty),
        farming,
        ores,
        extraction_penalty,
        landscape_penalty,
    }
}

fn points(count: u64, weight: i64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX).saturating_mul(weight)
}

/// Рейтинг, от самого бережного к самому разрушительному
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Rating {
    EcoChampion,
    Environmentalist,
    EcoFriendly,
    Balanced,
    ResourceUser,
    StripMiner,
    LandscapeDestroyer,
}

impl Rating {
    /// Пороги включают нижнюю границу
    pub fn from_score(total: i64) -> Self {
        match total {
            500.. => Rating::EcoChampion,
            200..=499 => Rating::Environmentalist,
            50..=199 => Rating::EcoFriendly,
            0..=49 => Rating::Balanced,
            -100..=-1 => Rating::ResourceUser,
            -300..=-101 => Rating::StripMiner,
            _ => Rating::LandscapeDestroyer,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::EcoChampion => "ECO CHAMPION",
            Rating::Environmentalist => "Environmentalist",
            Rating::EcoFriendly => "Eco-Friendly",
            Rating::Balanced => "Balanced",
            Rating::ResourceUser => "Resource User",
            Rating::StripMiner => "Strip Miner",
            Rating::LandscapeDestroyer => "LANDSCAPE DESTROYER",
        }
    }
}

/// Строка лидерборда
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub player: String,
    pub score: EcoScore,
    pub rating: Rating,
    pub farming: u64,
    pub ores: u64,
    /// Камень + песок + земля
    pub destruction: u64,
}

/// Игроки по убыванию эко-очков; при равенстве — по имени игрока
pub fn leaderboard(ledger: &Ledger) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = ledger
        .iter()
        .map(|(player, record)| {
            let score = score(record);
            LeaderboardEntry {
                player: player.to_string(),
                score,
                rating: Rating::from_score(score.total),
                farming: record.get(Counter::Farming),
                ores: record.ores(),
                destruction: [Counter::Stone, Counter::Sand, Counter::Dirt]
                    .iter()
                    .map(|c| record.get(*c))
                    .sum(),
            }
        })
        .collect();

    entries.sort_by(|a, b| match b.score.total.cmp(&a.score.total) {
        Ordering::Equal => a.player.cmp(&b.player),
        other => other,
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn record_with(counts: &[(Counter, u64)]) -> CounterRecord {
        let mut record = CounterRecord::default();
        for (counter, n) in counts {
            for _ in 0..*n {
                record.increment(*counter);
            }
        }
        record
    }

    #[test]
    fn test_score_weights() {
        let record = record_with(&[
            (Counter::Farming, 3),
            (Counter::Coal, 1),
            (Counter::Diamond, 2),
            (Counter::Stone, 4),
            (Counter::Sand, 1),
            (Counter::Dirt, 2),
        ]);
        let s = score(&record);
        assert_eq!(s.farming, 30);
        assert_eq!(s.ores, 6);
        assert_eq!(s.extraction_penalty, -4);
        assert_eq!(s.landscape_penalty, -6);
        assert_eq!(s.total, 26);
    }

    #[test]
    fn test_coal_and_farming() {
        let record = record_with(&[(Counter::Coal, 1), (Counter::Farming, 1)]);
        assert_eq!(score(&record).total, 12);
    }

    #[test]
    fn test_score_monotonicity() {
        let base = record_with(&[(Counter::Stone, 5), (Counter::Farming, 2)]);
        let base_total = score(&base).total;

        for counter in Counter::ORES {
            let mut more = base.clone();
            more.increment(counter);
            assert!(score(&more).total > base_total, "{} should raise score", counter.label());
        }
        for counter in [Counter::Stone, Counter::Sand, Counter::Dirt] {
            let mut more = base.clone();
            more.increment(counter);
            assert!(score(&more).total < base_total, "{} should lower score", counter.label());
        }
    }

    #[test]
    fn test_rating_thresholds() {
        assert_eq!(Rating::from_score(10_000), Rating::EcoChampion);
        assert_eq!(Rating::from_score(500), Rating::EcoChampion);
        assert_eq!(Rating::from_score(499), Rating::Environmentalist);
        assert_eq!(Rating::from_score(200), Rating::Environmentalist);
        assert_eq!(Rating::from_score(199), Rating::EcoFriendly);
        assert_eq!(Rating::from_score(50), Rating::EcoFriendly);
        assert_eq!(Rating::from_score(49), Rating::Balanced);
        assert_eq!(Rating::from_score(0), Rating::Balanced);
        assert_eq!(Rating::from_score(-1), Rating::ResourceUser);
        assert_eq!(Rating::from_score(-1).label(), "Resource User");
        assert_eq!(Rating::from_score(-100), Rating::ResourceUser);
        assert_eq!(Rating::from_score(-101), Rating::StripMiner);
        assert_eq!(Rating::from_score(-300), Rating::StripMiner);
        assert_eq!(Rating::from_score(-301), Rating::LandscapeDestroyer);
    }

    #[test]
    fn test_leaderboard_order_and_ties() {
        let mut ledger = Ledger::new();
        let dig = |p: &str, b: &str| Action::Dig { player: p.to_string(), block: b.to_string() };
        let place = |p: &str, b: &str| Action::Place { player: p.to_string(), block: b.to_string() };

        ledger.apply(&dig("zed", "default:sand"));
        ledger.apply(&place("carol", "farming:wheat"));
        // bob и amy с одинаковым счётом
        ledger.apply(&dig("bob", "default:stone_with_iron"));
        ledger.apply(&dig("amy", "default:stone_with_gold"));

        let board = leaderboard(&ledger);
        let names: Vec<&str> = board.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(names, vec!["carol", "amy", "bob", "zed"]);
        assert_eq!(board[0].rating, Rating::Balanced);
        assert_eq!(board[3].score.total, -2);
        assert_eq!(board[3].destruction, 1);
        assert_eq!(board[1].ores, 1);
    }

    #[test]
    fn test_empty_leaderboard() {
        assert!(leaderboard(&Ledger::new()).is_empty());
    }
}
