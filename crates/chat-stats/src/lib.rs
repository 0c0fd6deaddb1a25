//! Running chat statistics collected by observing the event bus.
//!
//! [`StatsAggregator`] is a passive [`Subscriber`]: it never publishes, it
//! only counts. [`spawn_reporter`] logs a snapshot on a fixed interval.

mod aggregator;
mod reporter;

pub use aggregator::{StatsAggregator, StatsSnapshot};
pub use reporter::spawn_reporter;

#[doc(no_inline)]
pub use chat_bus::Subscriber;
