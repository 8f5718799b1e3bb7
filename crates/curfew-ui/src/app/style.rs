//! Blocking window colour palette and widget styles.

use curfew_core::MatchTier;
use iced::border::{Border, Radius};
use iced::widget::button::{Status as ButtonStatus, Style as ButtonStyle};
use iced::widget::container;
use iced::widget::text_input::{self, Status as InputStatus};
use iced::{Background, Color, Shadow, Theme};

const BG_SURFACE: Color = Color {
    r: 0.027,
    g: 0.031,
    b: 0.051,
    a: 1.0,
};
const PANEL_BG: Color = Color {
    r: 0x0d as f32 / 255.0,
    g: 0x11 as f32 / 255.0,
    b: 0x17 as f32 / 255.0,
    a: 1.0,
};
const RED: Color = Color {
    r: 0.89,
    g: 0.125,
    b: 0.298,
    a: 1.0,
};
const AMBER: Color = Color {
    r: 1.0,
    g: 0.702,
    b: 0.0,
    a: 1.0,
};
const GREEN: Color = Color {
    r: 0.0,
    g: 1.0,
    b: 0.533,
    a: 1.0,
};
const SLATE_LIGHT: Color = Color {
    r: 0.18,
    g: 0.2,
    b: 0.329,
    a: 1.0,
};
pub(super) const TEXT_PRIMARY: Color = Color {
    r: 0.945,
    g: 1.0,
    b: 1.0,
    a: 1.0,
};
pub(super) const TEXT_DIM: Color = Color {
    r: 0.45,
    g: 0.49,
    b: 0.6,
    a: 1.0,
};

pub(super) fn tier_color(tier: MatchTier) -> Color {
    match tier {
        MatchTier::Far => RED,
        MatchTier::Near => AMBER,
        MatchTier::Complete => GREEN,
    }
}

pub(super) fn correct_glyph() -> Color {
    GREEN
}

pub(super) fn wrong_glyph() -> Color {
    RED
}

pub(super) fn extra_glyph() -> Color {
    AMBER
}

pub(super) fn background() -> impl Fn(&Theme) -> container::Style + Copy {
    |_| container::Style {
        background: Some(Background::Color(BG_SURFACE)),
        ..Default::default()
    }
}

/// Card framing the sentence; border colour and glow follow the match tier.
pub(super) fn commitment_card(tier: MatchTier) -> impl Fn(&Theme) -> container::Style + Copy {
    let accent = tier_color(tier);
    let (width, glow) = match tier {
        MatchTier::Far => (2.0, 0.15),
        MatchTier::Near => (3.0, 0.3),
        MatchTier::Complete => (4.0, 0.45),
    };
    move |_| container::Style {
        background: Some(Background::Color(PANEL_BG)),
        border: Border {
            radius: Radius::from(20.0),
            width,
            color: accent,
        },
        shadow: Shadow {
            color: with_alpha(accent, glow),
            blur_radius: 18.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(super) fn commitment_input() -> impl Fn(&Theme, InputStatus) -> text_input::Style + Copy {
    move |_theme, status| {
        let border_color = match status {
            InputStatus::Focused => TEXT_PRIMARY,
            _ => SLATE_LIGHT,
        };
        text_input::Style {
            background: Background::Color(Color::from_rgb8(10, 15, 26)),
            border: Border {
                radius: Radius::from(10.0),
                width: 1.2,
                color: border_color,
            },
            icon: Color::WHITE,
            placeholder: TEXT_DIM,
            value: TEXT_PRIMARY,
            selection: with_alpha(AMBER, 0.5),
        }
    }
}

pub(super) fn fatal_card() -> impl Fn(&Theme) -> container::Style + Copy {
    |_| container::Style {
        background: Some(Background::Color(PANEL_BG)),
        border: Border {
            radius: Radius::from(16.0),
            width: 2.0,
            color: RED,
        },
        ..Default::default()
    }
}

pub(super) fn dismiss_button() -> impl Fn(&Theme, ButtonStatus) -> ButtonStyle + Copy {
    |_theme, status| {
        let fill = match status {
            ButtonStatus::Hovered | ButtonStatus::Pressed => RED,
            _ => with_alpha(RED, 0.7),
        };
        ButtonStyle {
            background: Some(Background::Color(fill)),
            text_color: Color::WHITE,
            border: Border {
                radius: Radius::from(10.0),
                width: 0.0,
                color: Color::TRANSPARENT,
            },
            shadow: Shadow::default(),
        }
    }
}

fn with_alpha(mut color: Color, alpha: f32) -> Color {
    color.a = alpha;
    color
}
