//! 历史存储 - 本地 JSONL 文件读写

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// 历史记录（JSONL 一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub text: String,
}

impl HistoryEntry {
    pub fn new(
        ts: DateTime<Utc>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            title: title.into(),
            subtitle: subtitle.into(),
            text: text.into(),
        }
    }
}

/// 历史存储 trait
pub trait HistoryStore: Send + Sync {
    /// 追加一条记录
    fn append(&self, entry: &HistoryEntry) -> Result<()>;

    /// 清理相对 `now` 已过期的记录，返回删除的条数
    fn prune(&self, now: DateTime<Utc>) -> Result<usize>;

    /// 读取最近 N 条（最新的在前）
    fn read_recent(&self, n: usize) -> Vec<HistoryEntry>;
}

/// JSONL 文件存储
pub struct JsonlHistoryStore {
    path: PathBuf,
    retention: Duration,
    max_entries: usize,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retention: Duration::days(7),
            max_entries: 500,
        }
    }

    /// 设置保留天数
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// 设置最大条数
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(file: &File) -> Vec<HistoryEntry> {
        BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect()
    }
}

impl HistoryStore for JsonlHistoryStore {
    /// 追加记录（带文件锁）
    fn append(&self, entry: &HistoryEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let mut file = file;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        file.unlock()?;

        Ok(())
    }

    /// 删除超过保留期的记录，并只保留最后 max_entries 条
    fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.path)?;
        file.lock_exclusive()?;

        let entries = Self::read_all(&file);
        let cutoff = now - self.retention;
        let fresh: Vec<&HistoryEntry> = entries.iter().filter(|e| e.ts >= cutoff).collect();
        let start = fresh.len().saturating_sub(self.max_entries);
        let to_keep = &fresh[start..];
        let removed = entries.len() - to_keep.len();

        if removed == 0 {
            file.unlock()?;
            return Ok(0);
        }

        // 写入临时文件后原子替换
        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for entry in to_keep {
                writeln!(temp_file, "{}", serde_json::to_string(entry)?)?;
            }
        }
        fs::rename(&temp_path, &self.path)?;

        file.unlock()?;
        info!(removed, kept = to_keep.len(), "Pruned notification history");
        Ok(removed)
    }

    fn read_recent(&self, n: usize) -> Vec<HistoryEntry> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "History file not readable");
                return Vec::new();
            }
        };

        let mut entries = Self::read_all(&file);
        entries.sort_by_key(|e| e.ts);
        entries.into_iter().rev().take(n).collect()
    }
}

/// 内存存储（测试和演示用）
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
    prunes: Mutex<Vec<DateTime<Utc>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// prune 被调用的次数
    pub fn prune_count(&self) -> usize {
        self.prunes.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 最近一次 prune 使用的时间
    pub fn last_prune_at(&self) -> Option<DateTime<Utc>> {
        self.prunes.lock().ok().and_then(|p| p.last().copied())
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&self, entry: &HistoryEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?
            .push(entry.clone());
        Ok(())
    }

    fn prune(&self, now: DateTime<Utc>) -> Result<usize> {
        self.prunes
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?
            .push(now);
        Ok(0)
    }

    fn read_recent(&self, n: usize) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .map(|e| e.iter().rev().take(n).cloned().collect())
            .unwrap_or_default()
    }
}
