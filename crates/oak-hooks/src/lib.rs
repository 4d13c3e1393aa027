// Wire layer: heterogeneous agent hook payloads come in, canonical typed
// events go out. Everything past this crate is strictly typed over
// oak_types::HookEvent.

mod agents;
mod envelope;
mod error;
mod fingerprint;
mod sanitize;

pub use agents::{decode_event, HookKind};
pub use envelope::RawEnvelope;
pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use sanitize::{HookLimits, sanitize_tool_input, decode_tool_output};

/// Directories whose writes reclassify the surrounding batch as a plan batch
pub const PLAN_DIRS: &[&str] = &[".claude/plans/", ".cursor/plans/"];

pub fn is_plan_path(path: &str) -> bool {
    PLAN_DIRS.iter().any(|dir| path.contains(dir))
}
