//! Smooth Unicode progress bar for the download overlay.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_ERROR, C_MUTED, C_OK, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Render `percent` (0..=100) as a bar followed by a right-aligned label.
pub fn draw_progress(frame: &mut Frame, area: Rect, percent: u8, is_error: bool) {
    if area.width < 8 || area.height == 0 {
        return;
    }

    let label = format!("{:>4}%", percent.min(100));
    let bar_w = area.width.saturating_sub(label.len() as u16 + 1) as usize;
    let bar = render_bar(percent, bar_w);
    let fill = if is_error { C_ERROR } else { C_OK };

    let line = Line::from(vec![
        Span::styled(bar, Style::default().fg(fill).bg(C_MUTED)),
        Span::raw(" "),
        Span::styled(label, Style::default().fg(C_SECONDARY)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// `width` cells, filled in eighths.
pub fn render_bar(percent: u8, width: usize) -> String {
    let eighths = percent.min(100) as usize * width * 8 / 100;
    let full_blocks = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full_blocks {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}
