// HTTP surface of the daemon. Thin: handlers decode, call the engine,
// and shape responses; all state machines live below this crate.

pub mod api;

pub use api::{ApiState, build_router};
