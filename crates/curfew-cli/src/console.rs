//! Plain-text projection for headless sessions.

use curfew_core::error::ProjectionError;
use curfew_core::{CharMark, MatchTier, Projection};
use std::io::Write;

/// Writes each session update as one line of text.
pub struct ConsoleProjection<W: Write> {
    out: W,
    last_tier: Option<MatchTier>,
}

impl<W: Write> ConsoleProjection<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_tier: None,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, callback: &'static str, text: &str) -> Result<(), ProjectionError> {
        writeln!(self.out, "{text}")
            .and_then(|_| self.out.flush())
            .map_err(|err| ProjectionError::new(callback, err.to_string()))
    }
}

impl<W: Write> Projection for ConsoleProjection<W> {
    fn set_match_display(
        &mut self,
        percent: u8,
        tier: MatchTier,
        text: &str,
    ) -> Result<(), ProjectionError> {
        self.line(
            "set_match_display",
            &format!("[{percent:>3}%] {:<8} | {text}", tier.label()),
        )
    }

    fn set_border_emphasis(&mut self, tier: MatchTier) -> Result<(), ProjectionError> {
        // Only announce tier changes.
        if self.last_tier.replace(tier) == Some(tier) {
            return Ok(());
        }
        self.line(
            "set_border_emphasis",
            &format!("-- now {} --", tier.label()),
        )
    }

    fn set_character_marks(&mut self, marks: &[CharMark]) -> Result<(), ProjectionError> {
        if marks.is_empty() {
            return Ok(());
        }
        let gutter: String = marks
            .iter()
            .map(|mark| match mark {
                CharMark::Correct => '^',
                CharMark::Wrong => 'x',
                CharMark::Extra => '+',
            })
            .collect();
        self.line("set_character_marks", &format!("{:>18}{gutter}", ""))
    }

    fn show_fatal_error(&mut self, message: &str) -> Result<(), ProjectionError> {
        self.line("show_fatal_error", &format!("FATAL: {message}"))
    }

    fn unblock(&mut self) -> Result<(), ProjectionError> {
        self.line("unblock", "Commitment accepted. You are free to go.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(projection: ConsoleProjection<Vec<u8>>) -> String {
        String::from_utf8(projection.into_inner()).unwrap()
    }

    #[test]
    fn readout_lines_show_percent_tier_and_text() {
        let mut projection = ConsoleProjection::new(Vec::new());
        projection
            .set_match_display(67, MatchTier::Far, "ca")
            .unwrap();
        projection
            .set_character_marks(&[CharMark::Correct, CharMark::Wrong])
            .unwrap();

        let output = rendered(projection);
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("[ 67%] far      | ca"));
        assert_eq!(lines.next().map(str::trim), Some("^x"));
    }

    #[test]
    fn border_changes_are_announced_once() {
        let mut projection = ConsoleProjection::new(Vec::new());
        projection.set_border_emphasis(MatchTier::Far).unwrap();
        projection.set_border_emphasis(MatchTier::Far).unwrap();
        projection.set_border_emphasis(MatchTier::Near).unwrap();

        assert_eq!(rendered(projection), "-- now far --\n-- now near --\n");
    }

    #[test]
    fn write_failures_surface_as_projection_errors() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut projection = ConsoleProjection::new(Closed);
        let err = projection.unblock().unwrap_err();
        assert_eq!(err.callback, "unblock");
    }
}
