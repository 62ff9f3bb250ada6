use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use rebecca_core::{conversations, ChatRole};

use crate::app::{App, FocusPane, FormField, FormMessage, HistoryStatus, InputMode, Screen};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // Unclosed while the reply is still arriving, show it as typed
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Login | Screen::Register => render_form(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let user = match app.signed_in_user() {
        Some(name) => format!(" [{}]", name),
        None => String::new(),
    };
    let speech = if app.settings.speech_enabled { "" } else { " [muted]" };

    let title = Line::from(vec![
        Span::styled(
            format!(" {}'s Chat ", app.session.assistant_name()),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(user, Style::default().fg(Color::White)),
        Span::styled(speech, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Login => " LOGIN ",
        Screen::Register => " REGISTER ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = match (app.screen, app.input_mode) {
        (Screen::Login, _) => &[
            (" Tab ", " next field "),
            (" Enter ", " log in "),
            (" Ctrl-R ", " register "),
            (" Esc ", " quit "),
        ],
        (Screen::Register, _) => &[
            (" Tab ", " next field "),
            (" Enter ", " register "),
            (" Esc ", " back to login "),
        ],
        (Screen::Chat, InputMode::Editing) => &[
            (" Enter ", " send "),
            (" Esc ", " stop editing "),
        ],
        (Screen::Chat, InputMode::Normal) => match app.focus {
            FocusPane::History => &[
                (" j/k ", " select "),
                (" Enter ", " reuse prompt "),
                (" Tab ", " focus "),
                (" S ", " speech "),
                (" L ", " log out "),
                (" q ", " quit "),
            ],
            _ => &[
                (" j/k ", " scroll "),
                (" g/G ", " top/bottom "),
                (" i ", " type "),
                (" Tab ", " focus "),
                (" S ", " speech "),
                (" L ", " log out "),
                (" q ", " quit "),
            ],
        },
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    for (key, label) in pairs {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_form(app: &mut App, frame: &mut Frame, area: Rect) {
    let registering = app.screen == Screen::Register;
    let fields: Vec<(FormField, &str, &str)> = if registering {
        vec![
            (FormField::Username, "Username", app.register_form.username.as_str()),
            (FormField::Password, "Password", app.register_form.password.as_str()),
            (
                FormField::Confirm,
                "Confirm password",
                app.register_form.confirm_password.as_str(),
            ),
        ]
    } else {
        vec![
            (FormField::Username, "Username", app.login_form.username.as_str()),
            (FormField::Password, "Password", app.login_form.password.as_str()),
        ]
    };

    // Centered box: two rows per field, then a blank row and the message row
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = (fields.len() as u16) * 2 + 4;
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    frame.render_widget(Clear, popup_area);

    let title = if registering { " Register " } else { " Login " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;

    for (row, (field, label, value)) in fields.iter().enumerate() {
        let focused = *field == app.form_field;
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let shown = match field {
            FormField::Username => value.to_string(),
            _ => "*".repeat(value.chars().count()),
        };

        if focused {
            let x = (shown.chars().count() as u16).min(inner.width.saturating_sub(1));
            cursor = Some((inner.x + x, inner.y + (row as u16) * 2 + 1));
        }

        lines.push(Line::from(Span::styled(format!("{}:", label), label_style)));
        lines.push(Line::from(Span::styled(shown, Style::default().fg(Color::Cyan))));
    }

    lines.push(Line::default());
    match &app.form_message {
        Some(FormMessage::Error(message)) => {
            lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))));
        }
        Some(FormMessage::Info(message)) => {
            lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(Color::Green))));
        }
        None => {}
    }

    frame.render_widget(Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }), inner);

    if let Some(position) = cursor {
        frame.set_cursor_position(position);
    }
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [history_area, right_area] = Layout::horizontal([
        Constraint::Percentage(30),
        Constraint::Percentage(70),
    ])
    .areas(area);

    let status_height = if app.session.last_error().is_some() || app.status_message.is_some() {
        1
    } else {
        0
    };

    let [chat_area, status_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(status_height),
        Constraint::Length(3),
    ])
    .areas(right_area);

    // Store areas for mouse hit-testing
    app.history_area = Some(history_area);
    app.chat_area = Some(chat_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_history(app, frame, history_area);
    render_transcript(app, frame, chat_area);

    if status_height > 0 {
        let status = match app.session.last_error() {
            Some(err) => Span::styled(format!(" Error: {}", err), Style::default().fg(Color::Red)),
            None => Span::styled(
                format!(" {}", app.status_message.as_deref().unwrap_or_default()),
                Style::default().fg(Color::DarkGray),
            ),
        };
        frame.render_widget(Paragraph::new(Line::from(status)), status_area);
    }

    render_input(app, frame, input_area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::History;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversations ");

    let placeholder = match &app.history_status {
        HistoryStatus::Loading => Some("Loading...".to_string()),
        HistoryStatus::Failed(err) => Some(format!("Unavailable: {}", err)),
        HistoryStatus::Loaded if conversations::all().is_empty() => {
            Some("No conversations yet".to_string())
        }
        HistoryStatus::Loaded => None,
    };

    if let Some(text) = placeholder {
        let paragraph = Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = conversations::all()
        .iter()
        .map(|conversation| {
            let prompt = conversation.prompt.lines().next().unwrap_or_default();
            let response = conversation.response.lines().next().unwrap_or_default();
            ListItem::new(vec![
                Line::from(Span::styled(prompt.to_string(), Style::default().fg(Color::Cyan))),
                Line::from(Span::styled(response.to_string(), Style::default().fg(Color::DarkGray))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.history_state);
}

/// Split a styled line into rows of at most `width` characters.
///
/// Rows break after the last space that fits. A word wider than a row is cut.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let cells: Vec<(char, Style)> = line
        .spans
        .iter()
        .flat_map(|span| span.content.chars().map(move |c| (c, span.style)))
        .collect();

    if width == 0 || cells.len() <= width {
        return vec![line];
    }

    let mut rows = Vec::new();
    let mut start = 0;
    while cells.len() - start > width {
        let end = start + width;
        let cut = cells[start..end]
            .iter()
            .rposition(|(c, _)| *c == ' ')
            .map(|i| start + i + 1)
            .unwrap_or(end);
        rows.push(cells_to_line(&cells[start..cut], line.style));
        start = cut;
    }
    rows.push(cells_to_line(&cells[start..], line.style));
    rows
}

fn cells_to_line(cells: &[(char, Style)], style: Style) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut current = cells.first().map(|(_, s)| *s).unwrap_or_default();

    for &(c, cell_style) in cells {
        if cell_style != current && !text.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut text), current));
        }
        current = cell_style;
        text.push(c);
    }
    if !text.is_empty() {
        spans.push(Span::styled(text, current));
    }

    Line::from(spans).style(style)
}

/// Transcript rows as drawn at `width` columns, typing indicator included.
///
/// Scrolling counts these same rows, so the newest line always lands in view.
pub fn transcript_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.session.messages() {
        let name_color = match msg.role {
            ChatRole::User => Color::Cyan,
            ChatRole::Assistant => Color::Yellow,
        };
        lines.push(Line::from(Span::styled(
            format!("{}:", msg.display_name),
            Style::default().fg(name_color).add_modifier(Modifier::BOLD),
        )));

        let mut body: Vec<&str> = msg.content.lines().collect();
        if body.is_empty() {
            body.push("");
        }
        for line in body {
            let styled = match msg.role {
                ChatRole::User => Line::from(line.to_string()),
                ChatRole::Assistant => parse_markdown_line(line),
            };
            lines.extend(wrap_line(styled, width));
        }
        lines.push(Line::default());
    }

    if app.session.is_streaming() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let indicator = Line::from(Span::styled(
            format!("{} is typing{}", app.session.assistant_name(), dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ));
        lines.extend(wrap_line(indicator, width));
    }

    lines
}

fn render_transcript(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", app.session.model()));

    let text = if app.session.messages().is_empty() && !app.session.is_streaming() {
        Text::from(Span::styled(
            format!("Say hello to {}...", app.session.assistant_name()),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let width = area.width.saturating_sub(2) as usize;
        Text::from(transcript_lines(app, width))
    };

    // Rows are already wrapped to the inner width
    let chat = Paragraph::new(text)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.session.is_streaming() {
        " Message (waiting for reply) "
    } else {
        " Message "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .session
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use ratatui::{backend::TestBackend, Terminal};
    use rebecca_core::StreamEvent;

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut text = String::new();
        for (i, cell) in buffer.content.iter().enumerate() {
            text.push_str(cell.symbol());
            if (i + 1) % width == 0 {
                text.push('\n');
            }
        }
        text
    }

    #[test]
    fn test_bold_markdown() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_unclosed_bold_is_literal() {
        let line = parse_markdown_line("so **far");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "so **far");
    }

    #[test]
    fn test_login_masks_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, false);
        app.login_form.username = "ana".to_string();
        app.login_form.password = "secret".to_string();

        let text = screen_text(&mut app);
        assert!(text.contains("Login"));
        assert!(text.contains("ana"));
        assert!(text.contains("******"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_typing_indicator_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);
        app.session.input = "hi".to_string();
        app.session.begin_send().unwrap();

        let text = screen_text(&mut app);
        assert!(text.contains("Rebecca is typing."));

        app.apply_stream_event(StreamEvent::Chunk("Hello there".to_string()));
        app.apply_stream_event(StreamEvent::Finished { malformed: 0 });

        let text = screen_text(&mut app);
        assert!(text.contains("Hello there"));
        assert!(!text.contains("is typing"));
    }

    #[test]
    fn test_wrap_line_breaks_at_spaces_and_keeps_styles() {
        let line = parse_markdown_line("one **two** three");
        let rows = wrap_line(line, 8);

        let texts: Vec<String> = rows
            .iter()
            .map(|row| row.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        assert_eq!(texts, vec!["one two ", "three"]);
        assert!(rows[0].spans[1].style.add_modifier.contains(Modifier::BOLD));

        let rows = wrap_line(Line::from("abcdefghij"), 4);
        assert_eq!(rows.len(), 3);
        assert_eq!(wrap_line(Line::from("abcd"), 4).len(), 1);
    }

    #[test]
    fn test_scrolled_to_bottom_shows_newest_reply() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, true);
        screen_text(&mut app);

        for i in 0..12 {
            app.session.input = format!("question {} {}", i, "word ".repeat(30));
            app.session.begin_send().unwrap();
            app.apply_stream_event(StreamEvent::Chunk(format!("**answer** {}\n", i)));
            app.apply_stream_event(StreamEvent::Finished { malformed: 0 });
        }
        app.scroll_chat_to_bottom();

        let text = screen_text(&mut app);
        assert!(text.contains("answer 11"));
        assert!(!text.contains("answer 0 "));
    }
}
