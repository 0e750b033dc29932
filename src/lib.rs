//! Notify Relay - 把手机通知转发到手表，并双向同步关闭状态

pub mod channel;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod protocol;
pub mod relay;
pub mod text;

pub use channel::{
    AppTarget, ChannelEvent, DeviceChannel, HostState, NotificationSource, NullSource,
    RecordingChannel, StaticHostState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QuietHours, RelayConfig, TimeOfDay};
pub use error::{RelayError, RelayResult};
pub use history::{HistoryEntry, HistoryStore, JsonlHistoryStore, MemoryHistoryStore};
pub use protocol::{decode, encode, InboundPacket, OutboundCommand, WireRecord, WireValue};
pub use relay::{
    DismissOutcome, FilterReason, ListHandler, ListKind, NormalizedNotification, RelayEngine,
    RelayHandle, RelaySession, SessionState, SubmitOutcome,
};
pub use text::normalize;
