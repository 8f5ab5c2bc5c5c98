//! Message broker implementations

mod channel;
mod recording;
mod retry;
mod settle;

pub use channel::ChannelBroker;
pub use recording::RecordingBroker;
pub use retry::{publish_until_accepted, DEFAULT_PUBLISH_RETRY};
pub use settle::settle;
