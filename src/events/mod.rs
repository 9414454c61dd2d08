//! Domain events and the publisher seam adapters listen on

pub mod messages;
pub mod publisher;

pub use messages::{EventEnvelope, LadderEvent};
pub use publisher::{BroadcastEventPublisher, EventPublisher, MockEventPublisher};
