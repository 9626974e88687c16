//! Command-level spans.

use tracing::Span;

use crate::init::build_sha;

/// Span wrapping one CLI command; carries the command name and build identifier.
#[must_use]
pub fn command_span(command: &'static str) -> Span {
    tracing::info_span!("command", command, build_sha = %build_sha())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_span_can_be_entered() {
        let span = command_span("ls");
        let _entered = span.enter();
    }
}
