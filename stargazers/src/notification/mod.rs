//! Notification layer: message rendering, the outbound queue and the
//! channels messages are delivered through.

pub mod channels;
mod formatter;
mod queue;

pub use channels::{ChannelConfig, CompositeChannel, NotificationChannel, build_channels};
pub use formatter::{Comparison, Notification, NotificationKind};
pub use queue::{DEFAULT_QUEUE_SIZE, DeliveryQueue, DrainReport};
