//! 中继配置 - JSON 文件读取，所有字段都有默认值

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::protocol::TextSize;

/// 一天中的某个时刻（"HH:MM"）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u16,
    pub minute: u16,
}

impl TimeOfDay {
    pub fn new(hour: u16, minute: u16) -> Self {
        Self { hour, minute }
    }

    pub fn minute_of_day(&self) -> u16 {
        self.hour * 60 + self.minute
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (hour, minute) = value
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {:?}", value))?;
        let hour: u16 = hour.trim().parse().map_err(|_| format!("bad hour in {:?}", value))?;
        let minute: u16 = minute
            .trim()
            .parse()
            .map_err(|_| format!("bad minute in {:?}", value))?;
        if hour > 23 || minute > 59 {
            return Err(format!("time out of range: {:?}", value));
        }
        Ok(Self { hour, minute })
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// 免打扰时段
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: TimeOfDay::new(0, 0),
            end: TimeOfDay::new(23, 59),
        }
    }
}

impl QuietHours {
    /// 当前分钟是否落在时段内（含端点）
    ///
    /// end < start 时跨越午夜；start == end 视为空时段。
    pub fn contains(&self, minute_of_day: u16) -> bool {
        let start = self.start.minute_of_day();
        let end = self.end.minute_of_day();
        let now = minute_of_day;

        if end > start {
            now >= start && now <= end
        } else if end < start {
            now >= start || now <= end
        } else {
            false
        }
    }
}

/// 中继配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 静音所有通知
    pub mute_all: bool,
    /// 手机亮屏时不转发
    pub mute_while_screen_on: bool,
    /// 免打扰时段
    pub quiet_hours: QuietHours,
    /// 手表未连接时不转发
    pub mute_if_disconnected: bool,
    /// 手机上关闭通知时同步关闭手表上的通知
    pub sync_dismiss_upward: bool,
    pub text_size: TextSize,
    pub auto_switch_app: bool,
    pub periodic_vibrate: bool,
    /// 手表端响应超时（毫秒，编码时截断到 30000）
    pub response_timeout_ms: u32,
    /// 关闭中继应用时改为启动的应用
    pub launch_on_close: Option<String>,
    /// 内容包含规则（正则，任意命中才转发）
    pub include_patterns: Vec<String>,
    /// 内容排除规则（正则，任意命中即丢弃）
    pub exclude_patterns: Vec<String>,
    /// 字符替换表
    pub replacements: BTreeMap<String, String>,
    /// 已发送通知的最大跟踪数量
    pub registry_capacity: usize,
    /// 历史记录文件（默认在数据目录下）
    pub history_path: Option<PathBuf>,
    pub history_retention_days: i64,
    pub history_max_entries: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mute_all: false,
            mute_while_screen_on: false,
            quiet_hours: QuietHours::default(),
            mute_if_disconnected: false,
            sync_dismiss_upward: true,
            text_size: TextSize::Small,
            auto_switch_app: false,
            periodic_vibrate: true,
            response_timeout_ms: 0,
            launch_on_close: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            replacements: BTreeMap::new(),
            registry_capacity: 256,
            history_path: None,
            history_retention_days: 7,
            history_max_entries: 500,
        }
    }
}

impl RelayConfig {
    /// 默认配置文件路径
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notify-relay")
            .join("config.json")
    }

    /// 从默认路径读取，文件不存在时使用默认值
    pub fn load() -> RelayResult<Self> {
        let path = Self::path();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// 从指定路径读取
    pub fn load_from(path: &Path) -> RelayResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))
    }

    /// 历史记录文件路径
    pub fn history_file(&self) -> PathBuf {
        self.history_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("notify-relay")
                .join("history.jsonl")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: (u16, u16), end: (u16, u16)) -> QuietHours {
        QuietHours {
            enabled: true,
            start: TimeOfDay::new(start.0, start.1),
            end: TimeOfDay::new(end.0, end.1),
        }
    }

    #[test]
    fn test_quiet_hours_wraparound() {
        let night = window((22, 0), (6, 0));
        assert!(night.contains(23 * 60 + 30));
        assert!(night.contains(3 * 60));
        assert!(!night.contains(12 * 60));
    }

    #[test]
    fn test_quiet_hours_same_day() {
        let office = window((9, 0), (17, 0));
        assert!(!office.contains(20 * 60));
        assert!(office.contains(12 * 60));
        // 端点包含在内
        assert!(office.contains(9 * 60));
        assert!(office.contains(17 * 60));
    }

    #[test]
    fn test_quiet_hours_empty_window() {
        let empty = window((8, 0), (8, 0));
        assert!(!empty.contains(8 * 60));
    }

    #[test]
    fn test_time_of_day_parse() {
        let t: TimeOfDay = serde_json::from_str(r#""07:05""#).unwrap();
        assert_eq!(t, TimeOfDay::new(7, 5));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""07:05""#);

        assert!(serde_json::from_str::<TimeOfDay>(r#""25:00""#).is_err());
        assert!(serde_json::from_str::<TimeOfDay>(r#""noon""#).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"mute_all": true, "quiet_hours": {"enabled": true, "start": "22:00"}}"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();

        assert!(config.mute_all);
        assert!(config.sync_dismiss_upward);
        assert!(config.periodic_vibrate);
        assert!(config.quiet_hours.enabled);
        assert_eq!(config.quiet_hours.start, TimeOfDay::new(22, 0));
        assert_eq!(config.quiet_hours.end, TimeOfDay::new(23, 59));
        assert_eq!(config.registry_capacity, 256);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"text_size": "large", "launch_on_close": "glance"}"#).unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        assert_eq!(config.text_size, TextSize::Large);
        assert_eq!(config.launch_on_close.as_deref(), Some("glance"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = RelayConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
