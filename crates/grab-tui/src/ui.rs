//! Frame layout: URL field, result card, progress overlay, status line.

use grab_client::controller::view::{STEP_DONE, STEP_DOWNLOAD, STEP_MERGE};
use grab_client::controller::{ProgressView, StepState};
use grab_client::quota::QuotaLevel;
use grab_proto::media::ResolvedMetadata;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, Focus};
use crate::theme::{
    parse_hex_color, style_border, style_default, style_muted, style_secondary, style_title,
    C_ACCENT, C_BG, C_ERROR, C_NUMBER_HINT, C_OK, C_OVERLAY_BG, C_PRIMARY, C_WARN,
};
use crate::widgets::progress_bar::draw_progress;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" mediagrab", Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)),
            Span::styled("  video · audio · tracks", style_muted()),
        ])),
        outer[0],
    );

    app.input
        .draw(frame, outer[1], app.focus == Focus::Input && !app.overlay.visible);

    let body = outer[2];
    if let Some(err) = &app.resolve_error {
        draw_resolve_error(frame, body, err);
    } else if let Some(meta) = &app.result {
        draw_card(frame, body, meta, app.focus == Focus::Card);
    } else if !app.resolving {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "  Ctrl+V pastes from the clipboard.",
                style_muted(),
            ))),
            body,
        );
    }

    draw_status(frame, outer[3], app);

    if app.overlay.visible {
        draw_overlay(frame, area, &app.overlay);
    }
    app.toast.draw(frame, area);
}

fn draw_resolve_error(frame: &mut Frame, area: Rect, message: &str) {
    let lines = vec![
        Line::default(),
        Line::from(vec![
            Span::styled("  ✗ ", Style::default().fg(C_ERROR).add_modifier(Modifier::BOLD)),
            Span::styled(message.to_string(), Style::default().fg(C_ERROR)),
        ]),
        Line::from(Span::styled("    Esc to dismiss", style_muted())),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

// ── Result card ───────────────────────────────────────────────────────────────

fn draw_card(frame: &mut Frame, area: Rect, meta: &ResolvedMetadata, focused: bool) {
    let platform_color = parse_hex_color(&meta.platform_config.color).unwrap_or(C_ACCENT);
    let border = if focused {
        Style::default().fg(platform_color)
    } else {
        style_border(false)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(
            format!(" {} ", meta.platform_config.name),
            Style::default().fg(platform_color).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width.saturating_sub(2) as usize;
    let mut details = vec![meta.uploader_name.clone()];
    if let Some(d) = &meta.duration_display {
        details.push(d.clone());
    }
    if let Some(v) = meta.view_count {
        details.push(format!("{} views", format_views(v)));
    }
    if meta.is_portrait {
        details.push("portrait".to_string());
    }

    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {}", truncate_to_width(&meta.title, width)),
            style_title(),
        )),
        Line::from(Span::styled(
            format!(" {}", truncate_to_width(&details.join(" · "), width)),
            style_secondary(),
        )),
        Line::default(),
    ];
    for (i, option) in meta.download_options().into_iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" [{}] ", i + 1), Style::default().fg(C_NUMBER_HINT)),
            Span::styled(meta.option_label(option), style_default()),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

// ── Progress overlay ──────────────────────────────────────────────────────────

fn draw_overlay(frame: &mut Frame, area: Rect, view: &ProgressView) {
    let popup = centered(area, 60, 11);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border(true))
        .style(Style::default().bg(C_OVERLAY_BG))
        .title(Span::styled(format!(" {} ", view.title), style_title()));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let steps = vec![
        step_line(view.steps[STEP_DOWNLOAD], "Downloading", &view.download_sub),
        step_line(view.steps[STEP_MERGE], &view.merge_label, &view.merge_sub),
        step_line(view.steps[STEP_DONE], "Done", "Saving to your downloads folder"),
    ];
    frame.render_widget(Paragraph::new(steps), rows[1]);

    let bar_area = Rect {
        x: rows[3].x + 1,
        width: rows[3].width.saturating_sub(2),
        ..rows[3]
    };
    draw_progress(frame, bar_area, view.percent, view.is_error);

    let message_style = if view.is_error {
        Style::default().fg(C_ERROR).add_modifier(Modifier::BOLD)
    } else {
        style_secondary()
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {}", view.message),
            message_style,
        )))
        .wrap(Wrap { trim: true }),
        rows[5],
    );
}

fn step_line<'a>(state: StepState, label: &'a str, sub: &'a str) -> Line<'a> {
    let (marker, style) = match state {
        StepState::Pending => ("○", style_muted()),
        StepState::Active => ("●", Style::default().fg(C_WARN).add_modifier(Modifier::BOLD)),
        StepState::Completed => ("✓", Style::default().fg(C_OK)),
    };
    let label_style = if state == StepState::Pending {
        style_muted()
    } else {
        style.fg(C_PRIMARY)
    };
    Line::from(vec![
        Span::styled(format!(" {} ", marker), style),
        Span::styled(format!("{:<22}", label), label_style),
        Span::styled(sub, style_secondary()),
    ])
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2));
    let h = height.min(area.height.saturating_sub(2));
    Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    }
}

// ── Status line ───────────────────────────────────────────────────────────────

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let hints = match app.focus {
        Focus::Input => " Enter resolve  Ctrl+V paste  Esc clear  Tab card  Ctrl+C quit",
        Focus::Card => " 1-4 download  Tab/Esc edit URL  q quit",
    };

    let badge = app.quota.map(|n| {
        let color = match QuotaLevel::from_remaining(n) {
            QuotaLevel::Normal => C_OK,
            QuotaLevel::Low => C_WARN,
            QuotaLevel::Depleted => C_ERROR,
        };
        let text = if n <= 0 {
            " No downloads left ".to_string()
        } else {
            format!(" {} downloads left ", n)
        };
        Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
    });

    let badge_w = badge.as_ref().map(|b| b.width() as u16).unwrap_or(0);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(badge_w)])
        .split(area);

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(hints, style_muted()))),
        cols[0],
    );
    if let Some(badge) = badge {
        frame.render_widget(Paragraph::new(Line::from(badge)), cols[1]);
    }
}

// ── Text helpers ──────────────────────────────────────────────────────────────

/// `1234567` → `1,234,567`.
pub fn format_views(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Cut `s` to at most `max` display columns, ending in `…` when shortened.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
