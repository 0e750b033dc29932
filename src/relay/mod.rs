//! 中继核心 - 通知入口、调度状态机与关闭同步

pub mod chunker;
pub mod dismiss;
pub mod engine;
pub mod filter;
pub mod id_alloc;
pub mod list;
pub mod matcher;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transfer;

pub use dismiss::{DismissOutcome, DismissSynchronizer};
pub use engine::{RelayEngine, RelayEngineBuilder, SubmitOutcome, CHUNK_BYTES, MAX_TEXT_BYTES, MAX_TITLE_BYTES};
pub use filter::{ContentFilter, FilterReason};
pub use id_alloc::IdAllocator;
pub use list::{ListHandler, ListKind, RecentHistoryList};
pub use matcher::MatchKind;
pub use registry::ActiveRegistry;
pub use scheduler::{
    Collaborators, DeviceOpened, Enqueued, SchedulerSettings, SessionState, TransferScheduler,
    PRUNE_INTERVAL_MS, STALE_AFTER_MS,
};
pub use session::{RelayCommand, RelayHandle, RelaySession};
pub use transfer::{NormalizedNotification, PendingTransfer};
