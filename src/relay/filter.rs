//! 转发过滤 - 静音、亮屏、免打扰时段、未连接、内容规则

use regex::Regex;
use std::fmt;
use tracing::warn;

use crate::config::RelayConfig;

use super::transfer::NormalizedNotification;

/// 通知被过滤的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    Muted,
    ScreenOn,
    QuietHours,
    Disconnected,
    /// 命中排除规则
    Excluded,
    /// 未命中任何包含规则
    NotIncluded,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterReason::Muted => "muted",
            FilterReason::ScreenOn => "screen_on",
            FilterReason::QuietHours => "quiet_hours",
            FilterReason::Disconnected => "disconnected",
            FilterReason::Excluded => "excluded",
            FilterReason::NotIncluded => "not_included",
        };
        f.write_str(s)
    }
}

/// 过滤时需要的宿主状态快照（惰性读取）
pub struct FilterInputs<'a> {
    pub minute_of_day: u16,
    pub screen_on: &'a dyn Fn() -> bool,
    pub connected: &'a dyn Fn() -> bool,
}

/// 内容规则（正则）
///
/// 无法编译的规则直接丢弃并记录日志，不影响其他规则。
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ContentFilter {
    pub fn compile(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: compile_patterns(include, "include"),
            exclude: compile_patterns(exclude, "exclude"),
        }
    }

    /// 检查 "标题 副标题 正文"
    pub fn check(&self, notification: &NormalizedNotification) -> Option<FilterReason> {
        if self.include.is_empty() && self.exclude.is_empty() {
            return None;
        }

        let combined = format!(
            "{} {} {}",
            notification.title, notification.subtitle, notification.text
        );

        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(&combined)) {
            return Some(FilterReason::NotIncluded);
        }
        if self.exclude.iter().any(|re| re.is_match(&combined)) {
            return Some(FilterReason::Excluded);
        }
        None
    }
}

fn compile_patterns(patterns: &[String], kind: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(kind, pattern = %p, error = %e, "Ignoring invalid content filter pattern");
                None
            }
        })
        .collect()
}

/// 依次检查所有过滤条件，返回第一个命中的原因
pub fn evaluate(
    config: &RelayConfig,
    content: &ContentFilter,
    notification: &NormalizedNotification,
    inputs: &FilterInputs<'_>,
) -> Option<FilterReason> {
    if config.mute_all {
        return Some(FilterReason::Muted);
    }
    if config.mute_while_screen_on && (inputs.screen_on)() {
        return Some(FilterReason::ScreenOn);
    }
    if config.quiet_hours.enabled && config.quiet_hours.contains(inputs.minute_of_day) {
        return Some(FilterReason::QuietHours);
    }
    if config.mute_if_disconnected && !(inputs.connected)() {
        return Some(FilterReason::Disconnected);
    }
    content.check(notification)
}
