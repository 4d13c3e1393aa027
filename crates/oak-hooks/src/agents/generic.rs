use super::AgentDecoder;

/// Fallback decoder for agents we have no quirks catalogued for; the
/// canonical field names from the trait defaults apply as-is.
pub(crate) struct GenericDecoder;

impl AgentDecoder for GenericDecoder {}
