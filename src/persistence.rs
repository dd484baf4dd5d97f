//! Персистентность статистики и настроек
//!
//! Статистика: JSON-объект `player -> счётчики`, пишется целиком при каждом
//! сохранении (без дельт и append-лога).
//! Настройки: data_local_dir()/eco-monitor/settings.json.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::state::Ledger;
use crate::types::Settings;

/// Ошибки хранилища статистики
#[derive(Debug, Error)]
pub enum StoreError {
    /// Файл есть, но это не снапшот статистики. Не перезаписываем его молча.
    #[error("stats file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write stats file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize stats: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Снапшот статистики на диске
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Загрузить статистику.
    /// Нет файла (первый запуск) или его не удалось прочитать — пустая статистика.
    /// Файл есть, но битый — `StoreError::Corrupt`.
    pub fn load(&self) -> Result<Ledger, StoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No stats file at {}, starting fresh", self.path.display());
                return Ok(Ledger::new());
            }
            Err(e) => {
                warn!("Failed to read stats file {}: {}, starting fresh", self.path.display(), e);
                return Ok(Ledger::new());
            }
        };

        let ledger: Ledger = serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        info!("Loaded stats for {} players from {}", ledger.len(), self.path.display());
        Ok(ledger)
    }

    /// Записать всю статистику атомарно (tmp + rename)
    pub fn save(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(ledger)?;
        atomic_write(&self.path, &json).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved stats for {} players to {}", ledger.len(), self.path.display());
        Ok(())
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = dir.join(tmp_name);

    let mut file = File::create(&tmp)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    // Windows: rename поверх существующего может падать, поэтому сначала удаляем старый.
    if cfg!(windows) && path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(tmp, path)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFile {
    pub version: u32,
    pub settings: Settings,
}

fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("eco-monitor"))
}

pub fn settings_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("settings.json"))
}

pub fn load_settings() -> io::Result<Option<Settings>> {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => Ok(None),
    }
}

pub fn load_settings_from(path: &Path) -> io::Result<Option<Settings>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)?;
    let parsed: SettingsFile =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(parsed.settings))
}

pub fn save_settings(settings: &Settings) -> io::Result<()> {
    let Some(path) = settings_path() else {
        return Ok(());
    };
    save_settings_to(&path, settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> io::Result<()> {
    let file = SettingsFile {
        version: 1,
        settings: settings.clone(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        ledger.apply_at(
            &Action::Dig { player: "Alice".into(), block: "default:stone_with_coal".into() },
            now,
        );
        ledger.apply(&Action::Place { player: "Ёжик_7".into(), block: "farming:wheat".into() });
        // игрок без засчитанных действий: last_seen = null
        ledger.ensure("Idle");
        ledger
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));
        let ledger = sample_ledger();
        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), ledger);
    }

    #[test]
    fn test_round_trip_empty() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));
        store.save(&Ledger::new()).unwrap();
        assert_eq!(store.load().unwrap(), Ledger::new());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("stats.json"));
        store.save(&sample_ledger()).unwrap();
        store.save(&Ledger::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(!dir.path().join("stats.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "{\"Alice\": {\"stone_dug\": ").unwrap();
        let err = StatsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        // битый файл остаётся на месте
        assert!(path.exists());
    }

    #[test]
    fn test_negative_counter_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, r#"{"Alice": {"stone_dug": -3}}"#).unwrap();
        assert!(matches!(StatsStore::new(&path).load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_legacy_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(
            &path,
            r#"{"Alice": {"stone_dug": 5, "sand_dug": 2, "farming_placed": 1, "last_seen": null}}"#,
        )
        .unwrap();
        let ledger = StatsStore::new(&path).load().unwrap();
        let record = ledger.get("Alice").unwrap();
        assert_eq!(record.get(crate::types::Counter::Stone), 5);
        assert_eq!(record.get(crate::types::Counter::Coal), 0);
        assert_eq!(record.total(), 8);
    }

    #[test]
    fn test_write_failure_reported() {
        let dir = tempdir().unwrap();
        // родитель — обычный файл, каталог создать нельзя
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let store = StatsStore::new(blocker.join("stats.json"));
        let ledger = sample_ledger();
        assert!(matches!(store.save(&ledger), Err(StoreError::Write { .. })));
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(load_settings_from(&path).unwrap(), None);

        let settings = Settings {
            log_path: Some(PathBuf::from("/srv/minetest/debug.txt")),
            save_every: 25,
            ..Settings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), Some(settings));
    }
}
