//! The message engine.
//!
//! ```text
//!               ┌──────────────┐  crc32 & (N-1)  ┌──────────┐
//! RtmEvent ────▶│    Engine    │────────────────▶│ worker 0 │──┐
//!  stream       │ (dispatcher) │────────────────▶│ worker 1 │──┼──▶ ChatDriver
//!               └──────────────┘        ...      │   ...    │  │
//!                      │                         └──────────┘  │
//!                      ▼                              ▲        │
//!               SchedulerRunner                ResponseTracker ◀┘
//!                      │
//!                      └──────────────────────────────────────────▶ RealTimeSender
//! ```

pub mod dispatcher;
pub mod instrumentation;
pub mod processor;
pub mod router;
pub mod scheduler;
pub mod tracker;
pub mod user_info;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::{Engine, EngineSettings};
pub use instrumentation::{
    CallStats, EngineStats, InstrumentedChatDriver, InstrumentedEmojiReactor,
    InstrumentedFileUploader, InstrumentedRealTimeSender, Metrics, PartitionStats,
};
pub use processor::{MessageProcessor, ReplySettings, SharedIdentity};
pub use router::{MAX_PARTITIONS, PartitionRouter, RouterError, partition_for};
pub use scheduler::SchedulerRunner;
pub use tracker::{ResponseEntry, ResponseTracker};
pub use user_info::CachingUserInfoFinder;
pub use worker::run_worker;
