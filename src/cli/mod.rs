//! CLI command handling

pub mod history;
pub mod run;
pub mod script;

pub use history::*;
pub use run::*;
pub use script::*;

use anyhow::Result;
use chrono::Duration;
use serde::Serialize;
use std::path::Path;

use crate::config::RelayConfig;
use crate::history::JsonlHistoryStore;

/// 读取配置：指定路径必须存在，否则使用默认路径（不存在时取默认值）
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    let config = match path {
        Some(path) => RelayConfig::load_from(path)?,
        None => RelayConfig::load()?,
    };
    Ok(config)
}

/// 按配置打开历史存储
pub fn open_history(config: &RelayConfig) -> JsonlHistoryStore {
    JsonlHistoryStore::new(config.history_file())
        .with_retention(Duration::days(config.history_retention_days))
        .with_max_entries(config.history_max_entries)
}

/// JSON 输出
pub fn format_output<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}
