//! Infrastructure Layer
//!
//! In-process state shared across requests plus shutdown coordination.

pub mod block_list;
pub mod event_broadcaster;
pub mod result_cache;
pub mod shutdown;

pub use block_list::BlockList;
pub use event_broadcaster::{
    BroadcasterConfig, EventBroadcaster, OverflowPolicy, PublishReport, SubscriberId, Subscription,
    DEFAULT_SUBSCRIBER_CAPACITY,
};
pub use result_cache::{ResultCache, DEFAULT_TTL};
pub use shutdown::{shutdown_signal, ShutdownController, StreamGuard};
