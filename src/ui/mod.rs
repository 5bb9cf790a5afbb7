use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use chatsync::chat::{AuthorId, ChatState, Editable, Message};

use crate::app::{App, InputMode};

fn layout(size: Rect) -> (Rect, Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Input area
        ])
        .split(size);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(75), // Chat area
            Constraint::Percentage(25), // Info panel
        ])
        .split(chunks[1]);

    (chunks[0], main_chunks[0], main_chunks[1], chunks[2])
}

/// Rows available for messages in a terminal of `size`.
pub fn chat_rows(size: Rect) -> u16 {
    let (_, chat, _, _) = layout(size);
    chat.height.saturating_sub(2)
}

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let (title, chat, info, input) = layout(f.size());
    let state = app.current_state();

    draw_title_bar(f, app, state.as_ref(), title);
    draw_chat_area(f, app, state.as_ref(), chat);
    draw_info_panel(f, app, state.as_ref(), info);
    draw_input_area(f, app, state.as_ref(), input);
}

fn draw_title_bar(f: &mut Frame, app: &App, state: Option<&ChatState>, area: Rect) {
    let room = app
        .room
        .as_ref()
        .map(|r| r.handle.room_id().to_string())
        .unwrap_or_else(|| "no room".to_string());

    let mut title = format!(" chatsync v{} | {} ", env!("CARGO_PKG_VERSION"), room);
    if state.map_or(false, |s| s.is_new_messages) {
        title.push_str("| new messages ");
    }

    let title_block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green))
        .title(" chatsync ");

    let title_paragraph = Paragraph::new(title)
        .block(title_block)
        .alignment(Alignment::Center);

    f.render_widget(title_paragraph, area);
}

fn message_line<'a>(message: &'a Message, editing: bool) -> Line<'a> {
    let timestamp = chrono::DateTime::from_timestamp_millis(message.created)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    let nick_color = match message.author_id {
        AuthorId::Own => Color::Green,
        AuthorId::Service => Color::Yellow,
        AuthorId::User(_) => Color::Magenta,
    };
    let text_style = if editing {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(format!("[{timestamp}] "), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("<{}> ", message.display_author()),
            Style::default().fg(nick_color),
        ),
        Span::styled(message.content.text.as_str(), text_style),
    ];
    if message.modified.is_some() {
        spans.push(Span::styled(" (edited)", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

fn draw_chat_area(f: &mut Frame, app: &App, state: Option<&ChatState>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(match &app.room {
            Some(room) => format!(" Room: {} ", room.handle.room_id()),
            None => " Status ".to_string(),
        })
        .style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = inner.height as usize;
    let mut lines = Vec::new();

    match state {
        Some(state) => {
            let first = app.first_visible_row(state);
            let editing = state.editable.message().map(|m| m.created);
            for message in state.messages.iter().skip(first).take(rows) {
                lines.push(message_line(message, editing == Some(message.created)));
            }
            if lines.is_empty() {
                let hint = if state.initialized {
                    "No messages in this room yet. Press 'i' and type to send one."
                } else {
                    "Loading messages..."
                };
                lines.push(Line::from(Span::styled(
                    hint,
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                )));
            }
        }
        None => {
            let start = app.status_messages.len().saturating_sub(rows);
            for status in &app.status_messages[start..] {
                lines.push(Line::from(status.as_str()));
            }
        }
    }

    f.render_widget(Paragraph::new(lines), inner);

    if app.show_scroll_button() && inner.height > 0 && inner.width > 20 {
        let label = " [End] newest ";
        let button = Rect {
            x: inner.x + inner.width - label.len() as u16 - 1,
            y: inner.y + inner.height - 1,
            width: label.len() as u16,
            height: 1,
        };
        f.render_widget(
            Paragraph::new(label).style(Style::default().fg(Color::Black).bg(Color::Cyan)),
            button,
        );
    }
}

fn draw_info_panel(f: &mut Frame<'_>, app: &App, state: Option<&ChatState>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Room info
            Constraint::Length(8), // Room list
            Constraint::Min(0),    // Status messages
        ])
        .split(area);

    let room_block = Block::default()
        .borders(Borders::ALL)
        .title(" Room ")
        .style(Style::default().fg(Color::Blue));

    let room_text = match state {
        Some(state) => vec![
            Line::from(vec![
                Span::raw("Loaded: "),
                Span::styled(
                    format!("{}/{}", state.messages.len(), state.all_count),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(vec![
                Span::raw("Older: "),
                Span::styled(
                    if app.room.as_ref().map_or(false, |r| r.scroll.is_loading_older()) {
                        "loading"
                    } else if state.has_older() {
                        "scroll up"
                    } else {
                        "all loaded"
                    },
                    Style::default().fg(Color::Gray),
                ),
            ]),
            Line::from(vec![
                Span::raw("Mode: "),
                match &state.editable {
                    Editable::Editing(_) => Span::styled("editing", Style::default().fg(Color::Yellow)),
                    Editable::NotEditing => Span::styled("chat", Style::default().fg(Color::Green)),
                },
            ]),
        ],
        None => vec![Line::from(Span::styled(
            "/join <room>",
            Style::default().fg(Color::Gray),
        ))],
    };
    f.render_widget(Paragraph::new(room_text).block(room_block), chunks[0]);

    let rooms_block = Block::default()
        .borders(Borders::ALL)
        .title(" Rooms ")
        .style(Style::default().fg(Color::Blue));

    let current = app.room.as_ref().map(|r| r.handle.room_id().to_string());
    let items: Vec<ListItem> = {
        let cache = app.cache.read();
        cache
            .room_list()
            .rooms
            .iter()
            .map(|room| {
                let style = if current.as_deref() == Some(room.id.as_str()) {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                ListItem::new(format!("{} {}", room.id, room.name)).style(style)
            })
            .collect()
    };
    let rooms_list = if items.is_empty() {
        List::new(vec![
            ListItem::new("/rooms to list").style(Style::default().fg(Color::Gray))
        ])
    } else {
        List::new(items)
    }
    .block(rooms_block);
    f.render_widget(rooms_list, chunks[1]);

    let status_block = Block::default()
        .borders(Borders::ALL)
        .title(" Status ")
        .style(Style::default().fg(Color::Blue));
    let rows = chunks[2].height.saturating_sub(2) as usize;
    let start = app.status_messages.len().saturating_sub(rows);
    let status_lines: Vec<Line> = app.status_messages[start..]
        .iter()
        .map(|s| Line::from(s.as_str()))
        .collect();
    f.render_widget(
        Paragraph::new(status_lines)
            .block(status_block)
            .wrap(Wrap { trim: true }),
        chunks[2],
    );
}

fn draw_input_area(f: &mut Frame, app: &App, state: Option<&ChatState>, area: Rect) {
    let input_style = match app.input_mode {
        InputMode::Normal => Style::default().fg(Color::White),
        InputMode::Editing => Style::default().fg(Color::Green),
    };

    let editing_message = state.map_or(false, |s| s.editable != Editable::NotEditing);
    let mode_indicator = match app.input_mode {
        InputMode::Normal => "[NORMAL] Press 'i' to enter input mode".to_string(),
        InputMode::Editing if app.submitting => "[INPUT] sending...".to_string(),
        InputMode::Editing if editing_message => "[EDIT] ENTER=save, ESC=cancel".to_string(),
        InputMode::Editing => "[INPUT] ESC=normal, ENTER=send".to_string(),
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .title(mode_indicator)
        .style(input_style);

    let input_text = if app.input_mode == InputMode::Editing {
        app.input.as_str()
    } else {
        ""
    };

    let input_paragraph = Paragraph::new(input_text)
        .block(input_block)
        .wrap(Wrap { trim: false });

    f.render_widget(input_paragraph, area);

    if app.input_mode == InputMode::Editing {
        let column = app.input[..app.cursor_position].chars().count() as u16;
        f.set_cursor(area.x + column + 1, area.y + 1);
    }
}
