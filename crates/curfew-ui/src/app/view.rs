//! Renders the blocking window and the fatal notice.

use super::{style, BlockingWindow, FatalMessage, FatalNotice, Message, INPUT_ID};
use curfew_core::CharMark;
use iced::widget::{button, column, container, text, text_input, Row, Space};
use iced::{Alignment, Color, Element, Font, Length};

const PAD_ROOT: u16 = 48;
const PAD_CARD: u16 = 36;
const GAP_SECTION: u16 = 24;
const CARD_MAX_WIDTH: f32 = 1100.0;

/// How one character of the sentence line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Glyph {
    Correct(char),
    Wrong(char),
    Pending(char),
    Extra(char),
}

impl Glyph {
    fn color(self) -> Color {
        match self {
            Glyph::Correct(_) => style::correct_glyph(),
            Glyph::Wrong(_) => style::wrong_glyph(),
            Glyph::Pending(_) => style::TEXT_DIM,
            Glyph::Extra(_) => style::extra_glyph(),
        }
    }

    fn symbol(self) -> char {
        match self {
            // A mistyped space would be invisible.
            Glyph::Wrong(' ') => '_',
            Glyph::Correct(ch) | Glyph::Wrong(ch) | Glyph::Pending(ch) | Glyph::Extra(ch) => ch,
        }
    }
}

/// Lay the target out with each typed position coloured, then any typed overflow.
pub(super) fn glyphs(target: &str, typed: &str, marks: &[CharMark]) -> Vec<Glyph> {
    let mut out: Vec<Glyph> = target
        .chars()
        .enumerate()
        .map(|(index, ch)| match marks.get(index) {
            Some(CharMark::Correct) => Glyph::Correct(ch),
            Some(CharMark::Wrong) => Glyph::Wrong(ch),
            Some(CharMark::Extra) | None => Glyph::Pending(ch),
        })
        .collect();

    out.extend(
        typed
            .chars()
            .zip(marks)
            .filter(|(_, mark)| **mark == CharMark::Extra)
            .map(|(ch, _)| Glyph::Extra(ch)),
    );
    out
}

pub(super) fn render(ui: &BlockingWindow) -> Element<'_, Message> {
    let screen = ui.session.projection();
    let font_size = ui.settings.font_size;

    let sentence: Element<'_, Message> = Row::with_children(
        glyphs(ui.session.target(), screen.text(), screen.marks())
            .into_iter()
            .map(|glyph| {
                text(glyph.symbol().to_string())
                    .font(Font::MONOSPACE)
                    .size(font_size)
                    .color(glyph.color())
                    .into()
            }),
    )
    .wrap()
    .into();

    let readout = text(format!(
        "{}%  {}",
        screen.percent(),
        screen.tier().label().to_uppercase()
    ))
    .size(font_size.saturating_sub(4).max(12))
    .color(style::tier_color(screen.tier()));

    let status = if screen.is_unblocked() {
        "Commitment accepted."
    } else {
        "Type the sentence exactly to unlock this computer."
    };

    let input = text_input("Type here", &ui.input)
        .id(text_input::Id::new(INPUT_ID))
        .on_input(Message::InputChanged)
        .font(Font::MONOSPACE)
        .size(font_size)
        .padding(14)
        .style(style::commitment_input());

    let card = container(
        column![
            text(ui.settings.title.as_str())
                .size(font_size + 12)
                .color(style::TEXT_PRIMARY),
            text(status).size(16).color(style::TEXT_DIM),
            sentence,
            readout,
            input,
        ]
        .spacing(GAP_SECTION)
        .align_x(Alignment::Start),
    )
    .padding(PAD_CARD)
    .max_width(CARD_MAX_WIDTH)
    .style(style::commitment_card(screen.border()));

    container(card)
        .padding(PAD_ROOT)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(style::background())
        .into()
}

pub(super) fn render_fatal(notice: &FatalNotice) -> Element<'_, FatalMessage> {
    let body = column![
        text("Curfew cannot start").size(24).color(style::TEXT_PRIMARY),
        text(notice.message.as_str()).size(15).color(style::TEXT_PRIMARY),
        Space::with_height(Length::Fill),
        button(text("Exit").size(16))
            .padding([10, 28])
            .on_press(FatalMessage::Dismiss)
            .style(style::dismiss_button()),
    ]
    .spacing(16);

    container(container(body).padding(24).style(style::fatal_card()))
        .padding(16)
        .width(Length::Fill)
        .height(Length::Fill)
        .style(style::background())
        .into()
}
