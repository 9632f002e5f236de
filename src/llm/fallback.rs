//! Local fallback responder.

/// Marker prefix on every fallback reply.
pub const FALLBACK_PREFIX: &str = "[local-fallback]";

/// Deterministic canned reply for `prompt`. No I/O.
pub fn fallback(prompt: &str) -> String {
    format!("{FALLBACK_PREFIX} Echo: {prompt}")
}
