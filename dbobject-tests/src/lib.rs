pub mod fixtures;
pub mod memory;
pub mod sql;

pub use memory::MemoryDataLayer;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt::{format, layer},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Route the engine's logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(LevelFilter::DEBUG)
        .with(
            layer()
                .with_test_writer()
                .event_format(format().without_time().with_target(false).compact()),
        )
        .try_init();
}
