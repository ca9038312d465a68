//! Render the welcome screen, transcript, input line, and login overlay.
//!
//! Styling is deliberately plain; the layout exists so every operation is
//! reachable from the keyboard.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, LoginField, Tab, SUGGESTIONS};
use ikochat::Role;

const ACCENT: Color = Color::Rgb(0, 140, 120);
const DIM: Color = Color::Rgb(110, 110, 110);

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(frame.area());

    draw_transcript(frame, app, chunks[0]);
    draw_input(frame, app, chunks[1]);
    draw_status(frame, app, chunks[2]);

    if app.login.is_some() {
        draw_login_overlay(frame, app);
    } else {
        let inner_width = chunks[1].width.saturating_sub(2);
        let text_width = UnicodeWidthStr::width(app.composer.text()).min(u16::MAX as usize) as u16;
        let cursor_x = chunks[1]
            .x
            .saturating_add(1)
            .saturating_add(text_width.min(inner_width));
        frame.set_cursor_position(Position::new(cursor_x, chunks[1].y + 1));
    }
}

fn tab_title(app: &App) -> &'static str {
    match app.tab {
        Tab::Chat => " Ико ",
        Tab::Advisor => " Личен советник ",
    }
}

fn draw_transcript(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let text = if app.show_welcome() {
        let mut lines = vec![
            Line::from(Span::styled(
                "Здраво, јас сум Ико — дигиталниот асистент на банката.",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Постави прашање, или избери предлог:"),
            Line::from(""),
        ];
        for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("  {}. ", index + 1), Style::default().fg(ACCENT)),
                Span::raw(*suggestion),
            ]));
        }
        Text::from(lines)
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for message in app.session.messages() {
            let (speaker, style) = match message.role {
                Role::Human => ("Вие", Style::default().fg(ACCENT)),
                Role::Assistant => ("Ико", Style::default()),
            };
            let mut body = message.content.display_text().to_string();
            if message.content.has_media() {
                body.push_str("  [медиум]");
            }
            lines.push(Line::from(vec![
                Span::styled(format!("{speaker}: "), style.add_modifier(Modifier::BOLD)),
                Span::raw(body),
            ]));
        }
        if app.session.is_loading() {
            let status = app.session.status().unwrap_or("Ико пишува…");
            lines.push(Line::from(Span::styled(
                status.to_string(),
                Style::default().fg(DIM),
            )));
        }
        Text::from(lines)
    };

    let transcript = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(ACCENT))
                .title(Span::styled(
                    tab_title(app),
                    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
                )),
        )
        .scroll((app.scroll, 0));
    frame.render_widget(transcript, area);
}

fn draw_input(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let mut title = format!(" Порака · напор: {} ", app.effort.label());
    if app.recorder.is_recording() {
        title.push_str("· снимање ");
    }
    if app.composer.has_attachment() {
        title.push_str("· слика ");
    }

    let input = Paragraph::new(app.composer.text()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(ACCENT))
            .title(Span::styled(title, Style::default().fg(ACCENT))),
    );
    frame.render_widget(input, area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let line = if let Some(flash) = app.flash.as_deref() {
        Line::from(Span::styled(flash, Style::default().fg(Color::Yellow)))
    } else if let Some(err) = app.session.last_error() {
        Line::from(Span::styled(err, Style::default().fg(Color::Red)))
    } else {
        Line::from(Span::styled(
            "Enter испрати · Ctrl+R глас · Ctrl+E напор · Ctrl+T советник · Ctrl+N ново · Esc откажи",
            Style::default().fg(DIM),
        ))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_login_overlay(frame: &mut Frame<'_>, app: &App) {
    let Some(form) = app.login.as_ref() else {
        return;
    };
    let area = centered_rect(46, 8, frame.area());
    frame.render_widget(Clear, area);

    let focus_marker = |field: LoginField| {
        if form.focus == field {
            Span::styled("> ", Style::default().fg(ACCENT))
        } else {
            Span::raw("  ")
        }
    };
    let masked: String = "*".repeat(form.password.chars().count());
    let mut lines = vec![
        Line::from(vec![
            focus_marker(LoginField::Username),
            Span::raw(format!("Корисник: {}", form.username)),
        ]),
        Line::from(vec![
            focus_marker(LoginField::Password),
            Span::raw(format!("Лозинка:  {masked}")),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter потврди · Tab смени поле · Esc назад",
            Style::default().fg(DIM),
        )),
    ];
    if let Some(error) = form.error.as_deref() {
        lines.push(Line::from(Span::styled(
            error,
            Style::default().fg(Color::Red),
        )));
    }

    let overlay = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .border_style(Style::default().fg(ACCENT))
            .title(Span::styled(
                " Најава ",
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(overlay, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
