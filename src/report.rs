//! Текстовые отчёты: таблица счётчиков и эко-лидерборд
//!
//! Только чтение: рендер поверх [`Ledger`] и [`scoring`](crate::scoring).

use std::cmp::Reverse;

use crate::scoring::{leaderboard, FARMING_POINTS, LANDSCAPE_POINTS, ORE_POINTS, STONE_POINTS};
use crate::state::Ledger;
use crate::types::{Counter, CounterRecord};

const EMPTY: &str = "\nNo statistics available yet.\n";

/// Ширина колонки счётчика в таблице
fn column_width(counter: Counter) -> usize {
    match counter {
        Counter::Farming => 7,
        _ => 6,
    }
}

const TOTAL_WIDTH: usize = 8;

/// 1234567 -> "1,234,567"
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

fn group_u64(n: u64) -> String {
    group_thousands(i64::try_from(n).unwrap_or(i64::MAX))
}

fn table_row(name: &str, name_width: usize, record: &CounterRecord) -> String {
    let mut row = format!("{:<width$}", name, width = name_width);
    for counter in Counter::ALL {
        row.push_str(&format!(
            " | {:>width$}",
            group_u64(record.get(counter)),
            width = column_width(counter)
        ));
    }
    row.push_str(&format!(" | {:>width$}", group_u64(record.total()), width = TOTAL_WIDTH));
    row
}

/// Таблица счётчиков по игрокам (по убыванию активности, затем по имени)
pub fn render_table(ledger: &Ledger) -> String {
    if ledger.is_empty() {
        return EMPTY.to_string();
    }

    let mut players: Vec<(&str, &CounterRecord)> = ledger.iter().collect();
    players.sort_by_key(|(name, record)| (Reverse(record.total()), *name));

    let name_width = players
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Player".len());

    let mut header = format!("{:<width$}", "Player", width = name_width);
    for counter in Counter::ALL {
        header.push_str(&format!(" | {:>width$}", counter.label(), width = column_width(counter)));
    }
    header.push_str(&format!(" | {:>width$}", "Total", width = TOTAL_WIDTH));

    let separator = "=".repeat(header.chars().count());
    let mut out = String::new();
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    out.push_str(&header);
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');

    for (name, record) in &players {
        out.push_str(&table_row(name, name_width, record));
        out.push('\n');
    }

    let totals = ledger.totals();
    out.push_str(&"-".repeat(separator.len()));
    out.push('\n');
    out.push_str(&table_row("TOTAL", name_width, &totals));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');

    out.push_str(&format!("\nTotal players: {}\n", ledger.len()));
    out.push_str(&format!("Total events tracked: {}\n", group_u64(totals.total())));
    out
}

/// Эко-лидерборд: топ-3 помечены `***`, последние три `!!!`
pub fn render_leaderboard(ledger: &Ledger) -> String {
    let board = leaderboard(ledger);
    if board.is_empty() {
        return EMPTY.to_string();
    }

    let name_width = board
        .iter()
        .map(|e| e.player.chars().count())
        .max()
        .unwrap_or(0)
        .max("Player".len());
    let rating_width = board
        .iter()
        .map(|e| e.rating.label().len())
        .max()
        .unwrap_or(0)
        .max("Rating".len());

    let header = format!(
        "{:<nw$} | {:>10} | {:<rw$} | {:>8} | {:>8} | {:>11}",
        "Player",
        "Eco Score",
        "Rating",
        "Farming",
        "Ores",
        "Destruction",
        nw = name_width,
        rw = rating_width
    );
    let separator = "=".repeat(header.chars().count() + 4);

    let mut out = String::new();
    out.push('\n');
    out.push_str(&separator);
    out.push_str("\nENVIRONMENTAL RESPONSIBILITY LEADERBOARD\n");
    out.push_str(&separator);
    out.push('\n');
    out.push_str("    ");
    out.push_str(&header);
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');

    let count = board.len();
    for (i, entry) in board.iter().enumerate() {
        let rank = i + 1;
        let marker = if rank <= 3 {
            "*** "
        } else if rank + 2 >= count {
            "!!! "
        } else {
            "    "
        };

        let signed = if entry.score.total >= 0 {
            format!("+{}", group_thousands(entry.score.total))
        } else {
            group_thousands(entry.score.total)
        };

        out.push_str(marker);
        out.push_str(&format!(
            "{:<nw$} | {:>10} | {:<rw$} | {:>8} | {:>8} | {:>11}\n",
            entry.player,
            signed,
            entry.rating.label(),
            group_u64(entry.farming),
            group_u64(entry.ores),
            group_u64(entry.destruction),
            nw = name_width,
            rw = rating_width
        ));
    }
    out.push_str(&separator);
    out.push('\n');

    out.push_str("\nSCORING SYSTEM:\n");
    out.push_str(&format!("  Farming placed:     {:+} points each (adds to world)\n", FARMING_POINTS));
    out.push_str(&format!("  Ores mined:         {:+} points each (purposeful mining)\n", ORE_POINTS));
    out.push_str(&format!("  Stone removed:      {:+} point each (resource depletion)\n", STONE_POINTS));
    out.push_str(&format!(
        "  Dirt/Sand removed:  {:+} points each (landscape destruction)\n",
        LANDSCAPE_POINTS
    ));
    out.push_str("\n*** = Top 3 Most Responsible\n");
    out.push_str("!!! = Bottom 3 Most Destructive\n");
    out
}
