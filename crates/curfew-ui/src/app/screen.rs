//! Display copy of the session state that the view renders from.

use curfew_core::error::ProjectionError;
use curfew_core::{CharMark, MatchTier, Projection};

#[derive(Debug, Clone)]
pub(super) struct ScreenProjection {
    percent: u8,
    tier: MatchTier,
    border: MatchTier,
    text: String,
    marks: Vec<CharMark>,
    fatal: Option<String>,
    unblocked: bool,
}

impl ScreenProjection {
    pub(super) fn new() -> Self {
        Self {
            percent: 0,
            tier: MatchTier::Far,
            border: MatchTier::Far,
            text: String::new(),
            marks: Vec::new(),
            fatal: None,
            unblocked: false,
        }
    }

    pub(super) fn percent(&self) -> u8 {
        self.percent
    }

    pub(super) fn tier(&self) -> MatchTier {
        self.tier
    }

    pub(super) fn border(&self) -> MatchTier {
        self.border
    }

    pub(super) fn text(&self) -> &str {
        &self.text
    }

    pub(super) fn marks(&self) -> &[CharMark] {
        &self.marks
    }

    pub(super) fn fatal_message(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub(super) fn is_unblocked(&self) -> bool {
        self.unblocked
    }
}

impl Projection for ScreenProjection {
    fn set_match_display(
        &mut self,
        percent: u8,
        tier: MatchTier,
        text: &str,
    ) -> Result<(), ProjectionError> {
        self.percent = percent;
        self.tier = tier;
        self.text.clear();
        self.text.push_str(text);
        Ok(())
    }

    fn set_border_emphasis(&mut self, tier: MatchTier) -> Result<(), ProjectionError> {
        self.border = tier;
        Ok(())
    }

    fn set_character_marks(&mut self, marks: &[CharMark]) -> Result<(), ProjectionError> {
        self.marks.clear();
        self.marks.extend_from_slice(marks);
        Ok(())
    }

    fn show_fatal_error(&mut self, message: &str) -> Result<(), ProjectionError> {
        if self.fatal.is_some() {
            return Err(ProjectionError::new(
                "show_fatal_error",
                "a fatal error is already displayed",
            ));
        }
        self.fatal = Some(message.to_string());
        Ok(())
    }

    fn unblock(&mut self) -> Result<(), ProjectionError> {
        self.unblocked = true;
        Ok(())
    }
}
