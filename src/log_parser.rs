//! Парсер логов Minetest
//!
//! Парсит debug.txt для извлечения событий:
//! - Копание блоков (`digs`)
//! - Установка блоков (`places node`)
//!
//! Парсер не хранит состояния между строками: каждая строка разбирается
//! независимо от соседних.

use log::{debug, trace};
use regex::Regex;

use crate::types::{Action, Counter};

/// Префикс, под которым сервер пишет действия игроков
pub const ACTION_PREFIX: &str = "ACTION[Server]: ";

/// Пространство имён фермерских предметов
pub const FARMING_NAMESPACE: &str = "farming:";

/// Таблица классификации выкопанных блоков.
/// Порядок важен: руды (`default:stone_with_*`) проверяются раньше камня.
const DIG_TABLE: &[(&str, Counter)] = &[
    ("default:stone_with_coal", Counter::Coal),
    ("default:stone_with_copper", Counter::Copper),
    ("default:stone_with_tin", Counter::Tin),
    ("default:stone_with_iron", Counter::Iron),
    ("default:stone_with_gold", Counter::Gold),
    ("default:stone_with_diamond", Counter::Diamond),
    ("default:stone", Counter::Stone),
    ("default:sand", Counter::Sand),
    ("default:dirt", Counter::Dirt),
    ("default:dirt_with_grass", Counter::Dirt),
];

/// Парсер строк лога
pub struct LogParser {
    // 2024-05-01 10:00:00: ACTION[Server]: Alice digs default:stone at (1,2,3)
    dig_re: Regex,
    // 2024-05-01 10:00:00: ACTION[Server]: Alice places node farming:wheat_1 at (1,2,3)
    place_re: Regex,
    /// Строки длиннее лимита не разбираются
    max_line_bytes: usize,
}

impl LogParser {
    /// Создать новый парсер
    pub fn new() -> Self {
        Self::with_max_line_bytes(usize::MAX)
    }

    /// Парсер, отбрасывающий строки длиннее `max_line_bytes`
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            // Игрок: \w+ ; блок: namespace:name, только \w и двоеточия
            dig_re: Regex::new(r"ACTION\[Server\]: (\w+) digs (\w+(?::\w+)+) at ").unwrap(),
            place_re: Regex::new(r"ACTION\[Server\]: (\w+) places node (\w+(?::\w+)+) at ")
                .unwrap(),
            max_line_bytes,
        }
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Разобрать одну строку лога
    /// Возвращает Some(Action) если строка описывает копание или установку блока
    pub fn classify(&self, line: &str) -> Option<Action> {
        if line.len() > self.max_line_bytes {
            trace!("Skipping oversized line ({} bytes)", line.len());
            return None;
        }

        // Дешёвая проверка до regex: большая часть лога к действиям не относится
        if !line.contains(ACTION_PREFIX) {
            return None;
        }

        if let Some(caps) = self.dig_re.captures(line) {
            let player = caps.get(1)?.as_str().to_string();
            let block = caps.get(2)?.as_str().to_string();
            return Some(Action::Dig { player, block });
        }

        if let Some(caps) = self.place_re.captures(line) {
            let player = caps.get(1)?.as_str().to_string();
            let block = caps.get(2)?.as_str().to_string();
            return Some(Action::Place { player, block });
        }

        trace!("Unrecognized action line: {}", &line[..floor_char_boundary(line, 100)]);
        None
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter {
    /// Какой счётчик увеличивает действие (None — действие не учитывается)
    pub fn for_action(action: &Action) -> Option<Counter> {
        match action {
            Action::Dig { block, .. } => Self::for_dug_block(block),
            Action::Place { block, .. } => {
                if block.starts_with(FARMING_NAMESPACE) {
                    Some(Counter::Farming)
                } else {
                    None
                }
            }
        }
    }

    /// Классификация выкопанного блока по таблице, первое совпадение выигрывает
    pub fn for_dug_block(block: &str) -> Option<Counter> {
        let counter = DIG_TABLE
            .iter()
            .find(|(id, _)| *id == block)
            .map(|(_, counter)| *counter);
        if counter.is_none() {
            debug!("Dug block {} is not tracked", block);
        }
        counter
    }
}

// Индекс символа не дальше max, чтобы срез не резал UTF-8 посередине
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dig(player: &str, block: &str) -> String {
        format!("2024-05-01 10:00:00: ACTION[Server]: {} digs {} at (10,-2,33)", player, block)
    }

    #[test]
    fn test_classify_dig() {
        let parser = LogParser::new();
        let action = parser.classify(&dig("Alice", "default:stone_with_coal"));
        assert_eq!(
            action,
            Some(Action::Dig {
                player: "Alice".to_string(),
                block: "default:stone_with_coal".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_place() {
        let parser = LogParser::new();
        let line = "ACTION[Server]: bob_42 places node farming:wheat_1 at (1,2,3)";
        let action = parser.classify(line).unwrap();
        assert_eq!(action.player(), "bob_42");
        assert_eq!(action.block(), "farming:wheat_1");
        assert!(matches!(action, Action::Place { .. }));
    }

    #[test]
    fn test_irrelevant_lines() {
        let parser = LogParser::new();
        assert!(parser.classify("").is_none());
        assert!(parser.classify("2024-05-01 10:00:00: ACTION[Server]: Alice joins game.").is_none());
        assert!(parser.classify("WARNING[Main]: Irrlicht: something").is_none());
        // блок без пространства имён
        assert!(parser.classify("ACTION[Server]: Alice digs stone at (1,2,3)").is_none());
        // не серверный префикс
        assert!(parser.classify("ACTION[Client]: Alice digs default:stone at (1,2,3)").is_none());
    }

    #[test]
    fn test_unicode_player() {
        let parser = LogParser::new();
        let action = parser.classify(&dig("Иван", "default:sand")).unwrap();
        assert_eq!(action.player(), "Иван");
    }

    #[test]
    fn test_oversized_line_rejected() {
        let parser = LogParser::with_max_line_bytes(32);
        assert!(parser.classify(&dig("Alice", "default:stone")).is_none());
    }

    #[test]
    fn test_ore_before_stone() {
        assert_eq!(Counter::for_dug_block("default:stone_with_coal"), Some(Counter::Coal));
        assert_eq!(Counter::for_dug_block("default:stone_with_copper"), Some(Counter::Copper));
        assert_eq!(Counter::for_dug_block("default:stone_with_tin"), Some(Counter::Tin));
        assert_eq!(Counter::for_dug_block("default:stone_with_iron"), Some(Counter::Iron));
        assert_eq!(Counter::for_dug_block("default:stone_with_gold"), Some(Counter::Gold));
        assert_eq!(Counter::for_dug_block("default:stone_with_diamond"), Some(Counter::Diamond));
        assert_eq!(Counter::for_dug_block("default:stone"), Some(Counter::Stone));
    }

    #[test]
    fn test_exact_match_only() {
        // Неизвестный вариант камня не засчитывается как камень
        assert_eq!(Counter::for_dug_block("default:stone_with_mese"), None);
        assert_eq!(Counter::for_dug_block("default:stonebrick"), None);
        assert_eq!(Counter::for_dug_block("default:dirt"), Some(Counter::Dirt));
        assert_eq!(Counter::for_dug_block("default:dirt_with_grass"), Some(Counter::Dirt));
        assert_eq!(Counter::for_dug_block("default:sand"), Some(Counter::Sand));
        assert_eq!(Counter::for_dug_block("default:desert_sand"), None);
    }

    #[test]
    fn test_place_farming_only() {
        let farming = Action::Place { player: "a".into(), block: "farming:seed_wheat".into() };
        let other = Action::Place { player: "a".into(), block: "default:torch".into() };
        assert_eq!(Counter::for_action(&farming), Some(Counter::Farming));
        assert_eq!(Counter::for_action(&other), None);
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 100), 3);
        // 'ж' занимает 2 байта
        assert_eq!(floor_char_boundary("жжж", 3), 2);
    }
}
