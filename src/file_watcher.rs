//! Tail для лога сервера Minetest
//!
//! Читает новые строки по мере их появления (tail -f поведение). История до
//! открытия файла не читается, для неё есть `replay`.
//!
//! Ограничение: на один файл статистики должен работать ровно один монитор.
//! Два монитора независимо прочитают одни и те же строки и дважды увеличат
//! счётчики (или затрут сохранения друг друга), поэтому монитор берёт
//! [`InstanceLock`] рядом с файлом статистики.

use log::{debug, error, info, warn};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Ошибки tail'а
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading log file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("another monitor is already running (lock file {lock}); pass --force if it is stale")]
    AlreadyRunning { lock: PathBuf },
    #[error("failed to create lock file {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Результат одной попытки чтения
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailPoll {
    /// Очередная полная строка (без `\n`)
    Line(String),
    /// Новых полных строк пока нет, стоит подождать и повторить
    Pending,
}

/// Состояние tail'а
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    SeekingEnd,
    Idle,
    Reading,
}

/// Найти путь к debug.txt Minetest
pub fn find_log_path() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("debug.txt")];

    if let Some(home) = dirs::home_dir() {
        // Обычная установка, Flatpak, Snap и новое имя движка (Luanti)
        candidates.push(home.join(".minetest").join("debug.txt"));
        candidates.push(home.join(".luanti").join("debug.txt"));
        candidates.push(
            home.join(".var/app/net.minetest.Minetest/.minetest")
                .join("debug.txt"),
        );
        candidates.push(home.join("snap/minetest/current/.minetest").join("debug.txt"));
    }
    // Пакет minetest-server в Debian/Ubuntu
    candidates.push(PathBuf::from("/var/log/minetest/minetest.log"));

    for path in candidates {
        if path.is_file() {
            info!("Found Minetest log file at: {}", path.display());
            return Some(path);
        }
    }

    warn!("Could not find Minetest log file automatically");
    None
}

/// Tail файла: отдаёт только строки, дописанные после открытия
pub struct TailReader {
    /// Путь к файлу логов
    path: PathBuf,
    reader: BufReader<File>,
    /// Позиция в файле (включая недописанный хвост в `partial`)
    position: u64,
    /// Недописанная строка: ждём `\n`
    partial: Vec<u8>,
    /// Пропускаем остаток слишком длинной строки
    discarding: bool,
    max_line_bytes: usize,
    state: TailState,
}

impl TailReader {
    /// Открыть файл и перейти в конец (историю не читаем)
    pub fn open(path: impl Into<PathBuf>, max_line_bytes: usize) -> Result<Self, TailError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;

        let mut tail = Self {
            path,
            reader: BufReader::new(file),
            position: 0,
            partial: Vec::new(),
            discarding: false,
            max_line_bytes: max_line_bytes.max(1),
            state: TailState::SeekingEnd,
        };

        tail.position = tail
            .reader
            .seek(SeekFrom::End(0))
            .map_err(|source| TailError::Open {
                path: tail.path.clone(),
                source,
            })?;
        tail.state = TailState::Idle;
        info!("Tailing {} from position {}", tail.path.display(), tail.position);
        Ok(tail)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    /// Прочитать следующую дописанную строку.
    /// `Pending` если полной строки пока нет: вызывающий ждёт и повторяет.
    pub fn next_line(&mut self) -> Result<TailPoll, TailError> {
        self.state = TailState::Reading;

        loop {
            // Не больше max_line_bytes + 1 байт на строку, иначе мусор без `\n` съест память
            let budget = self.max_line_bytes.saturating_add(1).saturating_sub(self.partial.len()).max(1);
            let read = Read::take(&mut self.reader, budget as u64)
                .read_until(b'\n', &mut self.partial)
                .map_err(|source| TailError::Read {
                    path: self.path.clone(),
                    source,
                });
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.state = TailState::Idle;
                    return Err(e);
                }
            };
            self.position += n as u64;

            if n == 0 {
                // Нет новых данных
                self.check_truncation();
                self.state = TailState::Idle;
                return Ok(TailPoll::Pending);
            }

            if self.partial.last() == Some(&b'\n') {
                let bytes = std::mem::take(&mut self.partial);
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let line = String::from_utf8_lossy(&bytes);
                self.state = TailState::Idle;
                return Ok(TailPoll::Line(line.trim_end_matches(&['\n', '\r'][..]).to_string()));
            }

            if self.partial.len() > self.max_line_bytes {
                if !self.discarding {
                    warn!(
                        "Dropping log line longer than {} bytes at position {}",
                        self.max_line_bytes, self.position
                    );
                }
                self.partial.clear();
                self.discarding = true;
            }
            // Иначе это хвост без `\n`: следующая итерация вернёт Pending
        }
    }

    /// Файл стал меньше текущей позиции: его обрезали или пересоздали
    fn check_truncation(&mut self) {
        let len = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Failed to stat {}: {}", self.path.display(), e);
                return;
            }
        };
        if len >= self.position {
            return;
        }

        info!("Log file was truncated or rotated, restarting from beginning");
        match File::open(&self.path) {
            Ok(file) => {
                self.reader = BufReader::new(file);
                self.position = 0;
                self.partial.clear();
                self.discarding = false;
            }
            Err(e) => {
                error!("Failed to reopen log file: {}", e);
            }
        }
    }
}

/// Будильник на изменения файла через notify.
/// Только сокращает ожидание между опросами: контракт `Pending` не меняется.
pub struct FileWakeup {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl FileWakeup {
    /// Начать отслеживание директории, в которой лежит файл
    pub fn new(path: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        let target = path.file_name().map(|name| name.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && event.paths.iter().any(|p| p.file_name() == target.as_deref());
                    if relevant {
                        // Канал на одно место: пропущенный сигнал не важен, tail всё равно дочитает всё
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => {
                    error!("Watch error: {:?}", e);
                }
            },
            Config::default(),
        )?;

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(parent, RecursiveMode::NonRecursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Дождаться изменения файла
    pub async fn changed(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// Lock-файл `<stats>.lock`: один монитор на один файл статистики
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Взять lock. `force` перехватывает lock, оставшийся после аварийного завершения.
    pub fn acquire(stats_path: &Path, force: bool) -> Result<Self, TailError> {
        let mut name = stats_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        let path = stats_path.with_file_name(name);

        let mut options = OpenOptions::new();
        options.write(true);
        if force {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        match options.open(&path) {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    debug!("Failed to write pid to {}: {}", path.display(), e);
                }
                debug!("Acquired lock {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(TailError::AlreadyRunning { lock: path })
            }
            Err(source) => Err(TailError::Lock { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}
