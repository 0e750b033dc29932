//! 关闭同步 - 手机上移除的通知也从手表上移除

use tracing::debug;

use crate::error::RelayResult;

use super::matcher;
use super::scheduler::{Propagation, TransferScheduler};

/// 关闭同步的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissOutcome {
    /// 配置关闭了同步
    Disabled,
    /// 没有匹配的已发送传输
    NoMatch,
    Sent(i32),
    Queued(i32),
}

/// 关闭同步器
#[derive(Debug, Clone, Copy)]
pub struct DismissSynchronizer {
    enabled: bool,
}

impl DismissSynchronizer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 按来源标识查找并关闭手表上的对应传输
    ///
    /// 按插入顺序取第一个匹配项。
    pub fn request_dismiss(
        &self,
        scheduler: &mut TransferScheduler,
        source_id: i32,
        package: &str,
        tag: Option<&str>,
        keep_open: bool,
    ) -> RelayResult<DismissOutcome> {
        if !self.enabled {
            return Ok(DismissOutcome::Disabled);
        }

        let target = scheduler
            .registry()
            .iter()
            .find(|t| matcher::matches_dismissal(t, source_id, package, tag))
            .map(|t| t.transfer_id);

        match target {
            Some(id) => self.dismiss_transfer(scheduler, id, keep_open),
            None => {
                debug!(source_id, package, "No watch transfer matches dismissed notification");
                Ok(DismissOutcome::NoMatch)
            }
        }
    }

    /// 关闭一个已确定的传输
    pub fn dismiss_transfer(
        &self,
        scheduler: &mut TransferScheduler,
        transfer_id: i32,
        keep_open: bool,
    ) -> RelayResult<DismissOutcome> {
        if !self.enabled {
            return Ok(DismissOutcome::Disabled);
        }
        if !scheduler.registry().contains(transfer_id) {
            return Ok(DismissOutcome::NoMatch);
        }

        Ok(match scheduler.propagate_dismiss(transfer_id, keep_open)? {
            Propagation::Sent => DismissOutcome::Sent(transfer_id),
            Propagation::Queued => DismissOutcome::Queued(transfer_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{NullSource, RecordingChannel, StaticHostState};
    use crate::clock::ManualClock;
    use crate::config::RelayConfig;
    use crate::history::MemoryHistoryStore;
    use crate::relay::scheduler::{Collaborators, SchedulerSettings, SessionState};
    use crate::relay::transfer::{NormalizedNotification, PendingTransfer};
    use std::sync::Arc;

    fn scheduler() -> (TransferScheduler, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::new());
        let io = Collaborators {
            channel: channel.clone(),
            source: Arc::new(NullSource),
            host: Arc::new(StaticHostState::default()),
            history: Arc::new(MemoryHistoryStore::new()),
            clock: Arc::new(ManualClock::new(10_000)),
        };
        let settings = SchedulerSettings::from_config(&RelayConfig::default());
        (TransferScheduler::new(io, settings), channel)
    }

    fn sent_and_completed(scheduler: &mut TransferScheduler, id: i32, tag: Option<&str>) {
        let n = NormalizedNotification::new("T", "", "body")
            .with_source(42, "com.chat", tag.map(str::to_string));
        scheduler
            .enqueue(PendingTransfer::from_notification(id, n, 80))
            .unwrap();
        scheduler.on_transfer_completed().unwrap();
    }

    #[test]
    fn test_disabled_is_noop() {
        let (mut scheduler, channel) = scheduler();
        sent_and_completed(&mut scheduler, 1, None);
        channel.take();

        let sync = DismissSynchronizer::new(false);
        let outcome = sync
            .request_dismiss(&mut scheduler, 42, "com.chat", None, false)
            .unwrap();
        assert_eq!(outcome, DismissOutcome::Disabled);
        assert!(channel.events().is_empty());
    }

    #[test]
    fn test_first_match_sent_when_idle() {
        let (mut scheduler, _channel) = scheduler();
        sent_and_completed(&mut scheduler, 1, None);
        sent_and_completed(&mut scheduler, 2, None);

        let sync = DismissSynchronizer::new(true);
        let outcome = sync
            .request_dismiss(&mut scheduler, 42, "com.chat", None, false)
            .unwrap();
        assert_eq!(outcome, DismissOutcome::Sent(1));
        assert_eq!(scheduler.state(), SessionState::Dismissing);
    }

    #[test]
    fn test_tag_must_match_exactly() {
        let (mut scheduler, _channel) = scheduler();
        sent_and_completed(&mut scheduler, 1, Some("a"));

        let sync = DismissSynchronizer::new(true);
        assert_eq!(
            sync.request_dismiss(&mut scheduler, 42, "com.chat", None, false)
                .unwrap(),
            DismissOutcome::NoMatch
        );
        assert_eq!(
            sync.request_dismiss(&mut scheduler, 42, "com.chat", Some("a"), false)
                .unwrap(),
            DismissOutcome::Sent(1)
        );
    }

    #[test]
    fn test_queued_while_busy() {
        let (mut scheduler, _channel) = scheduler();
        sent_and_completed(&mut scheduler, 1, None);
        let other = NormalizedNotification::new("Other", "", "x");
        scheduler
            .enqueue(PendingTransfer::from_notification(2, other, 80))
            .unwrap();

        let sync = DismissSynchronizer::new(true);
        let outcome = sync
            .request_dismiss(&mut scheduler, 42, "com.chat", None, false)
            .unwrap();
        assert_eq!(outcome, DismissOutcome::Queued(1));
        assert_eq!(scheduler.dismiss_queue(), vec![1]);
    }
}
