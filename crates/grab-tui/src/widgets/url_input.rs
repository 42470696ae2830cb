//! UrlInput: single-line URL field on top of tui-input.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{style_border, C_INPUT_BG, C_INPUT_FG, C_MUTED};

#[derive(Debug, PartialEq)]
pub enum UrlAction {
    Submit(String),
    Cleared,
    Edited,
    None,
}

pub struct UrlInput {
    input: Input,
    placeholder: String,
}

impl UrlInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            placeholder: placeholder.into(),
        }
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    pub fn is_empty(&self) -> bool {
        self.input.value().is_empty()
    }

    pub fn set_value(&mut self, value: &str) {
        self.input = Input::new(value.to_string());
    }

    /// Insert pasted text at the cursor. Line breaks are dropped.
    pub fn paste(&mut self, text: &str) {
        let value = self.input.value();
        let cursor = self.input.cursor();
        let byte_pos = value
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(value.len());
        let clean: String = text.chars().filter(|c| !c.is_control()).collect();
        let mut next = String::with_capacity(value.len() + clean.len());
        next.push_str(&value[..byte_pos]);
        next.push_str(&clean);
        next.push_str(&value[byte_pos..]);
        let new_cursor = cursor + clean.chars().count();
        self.input = Input::new(next).with_cursor(new_cursor);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> UrlAction {
        match key.code {
            KeyCode::Enter => UrlAction::Submit(self.input.value().trim().to_string()),
            KeyCode::Esc => {
                self.input.reset();
                UrlAction::Cleared
            }
            _ => match self.input.handle_event(&Event::Key(key)) {
                Some(_) => UrlAction::Edited,
                None => UrlAction::None,
            },
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border(focused))
            .title(" URL ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let width = inner.width.saturating_sub(1) as usize;
        let scroll = self.input.visual_scroll(width);
        let value = self.input.value();
        let span = if value.is_empty() {
            Span::styled(self.placeholder.as_str(), Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(visible, Style::default().fg(C_INPUT_FG))
        };
        frame.render_widget(
            Paragraph::new(Line::from(span)).style(Style::default().bg(C_INPUT_BG)),
            inner,
        );

        if focused && inner.width > 0 {
            let cursor_x = inner.x + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(inner.x + inner.width - 1), inner.y));
        }
    }
}
