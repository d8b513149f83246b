//! Stateless rendering of the browser and board screens.

use super::app::{App, Screen};
use chrono::Utc;
use goterm::{BoardSnapshot, Cell, ClockEvent, PlayerId, SelectionCursor, Theme, coords};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

const KEY_HELP: &str =
    "arrow keys: move cursor\nReturn: play move\np: pass turn\nr: refresh board\nq: back";

/// Renders the current screen and the status line.
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    match app.screen() {
        Screen::Browser => draw_browser(frame, chunks[0], app),
        Screen::Game => draw_game(frame, chunks[0], app),
    }

    let status = if app.is_loading() {
        "Loading..."
    } else {
        app.status()
    };
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::Yellow)),
        chunks[1],
    );
}

fn draw_browser(frame: &mut Frame, area: Rect, app: &App) {
    let refreshed = app
        .last_refresh()
        .map_or_else(|| "never".to_string(), |t| t.format("%H:%M:%S").to_string());
    let block = Block::default()
        .title(format!(
            " goterm | r: refresh, q: quit. Last refresh: {refreshed} "
        ))
        .borders(Borders::ALL);

    if app.games().is_empty() {
        let text = if app.is_loading() {
            ""
        } else {
            "No active games."
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .games()
        .iter()
        .map(|game| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    game.name().clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("  {}", game.description())),
            ])
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    state.select(Some(app.selected_game()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_game(frame: &mut Frame, area: Rect, app: &App) {
    let view = app.view();
    let title = format!(" {} ", view.state);
    let Some(snapshot) = view.snapshot.as_deref() else {
        frame.render_widget(
            Paragraph::new("Waiting for board...")
                .block(Block::default().title(title).borders(Borders::ALL)),
            area,
        );
        return;
    };

    // Two columns per cell, a label gutter and the borders.
    let board_width = (snapshot.width() as u16).saturating_mul(2).saturating_add(6);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(board_width), Constraint::Min(20)])
        .split(area);

    let board = Paragraph::new(board_lines(snapshot, view.cursor, app.theme()))
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(board, cols[0]);

    let mut hint = String::new();
    if let Some(turn) = &view.turn {
        hint.push_str(&turn.hint());
        hint.push_str("\n\n");
    }
    if let Some(clock) = &view.clock {
        hint.push_str(&clock_line(clock, app.player_id()));
        hint.push_str("\n\n");
    }
    hint.push_str(KEY_HELP);
    frame.render_widget(
        Paragraph::new(hint)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL)),
        cols[1],
    );
}

fn clock_line(clock: &ClockEvent, local_player: PlayerId) -> String {
    let whose = if clock.current_player == local_player {
        "Your clock"
    } else {
        "Opponent's clock"
    };
    match clock.remaining(Utc::now()) {
        Some(left) => {
            let secs = left.num_seconds();
            format!("{whose}: {}:{:02}", secs / 60, secs % 60)
        }
        None => format!("{whose} is running."),
    }
}

fn board_lines(snapshot: &BoardSnapshot, cursor: SelectionCursor, theme: &Theme) -> Vec<Line<'static>> {
    let (width, height) = (snapshot.width(), snapshot.height());
    let colors = theme.colors();
    let last = snapshot.last_move();
    let selected = cursor.selected();
    let label_style = |is_selected: bool, is_last: bool| {
        if is_selected {
            Style::default().bg(Color::Indexed(*colors.cursor_bg()))
        } else if is_last {
            Style::default().bg(Color::Indexed(*colors.last_played_bg()))
        } else {
            Style::default()
        }
    };

    let mut lines = Vec::with_capacity(height + 1);
    for y in 0..height {
        let mut spans = Vec::with_capacity(width + 2);
        spans.push(Span::styled(
            format!("{:>2}", coords::display_row(y, height)),
            label_style(
                selected.is_some_and(|p| p.y == y as i32),
                last.y == y as i32,
            ),
        ));
        spans.push(Span::raw("  "));
        for x in 0..width {
            spans.push(cell_span(snapshot, theme, cursor, x, y));
        }
        lines.push(Line::from(spans));
    }

    let mut letters = vec![Span::raw("    ")];
    for x in 0..width {
        let letter = coords::column_label(x, *theme.fullwidth_letters());
        letters.push(Span::styled(
            pad_label(letter),
            label_style(
                selected.is_some_and(|p| p.x == x as i32),
                last.x == x as i32,
            ),
        ));
    }
    lines.push(Line::from(letters));
    lines
}

fn cell_span(
    snapshot: &BoardSnapshot,
    theme: &Theme,
    cursor: SelectionCursor,
    x: usize,
    y: usize,
) -> Span<'static> {
    let colors = theme.colors();
    let symbols = theme.symbols();
    let palette = [
        *colors.board(),
        *colors.black(),
        *colors.white(),
        *colors.board_alt(),
        *colors.black_alt(),
        *colors.white_alt(),
    ];

    let cell = snapshot.cell(x, y).unwrap_or_default();
    let stone = match cell {
        Cell::Empty => 0,
        Cell::Black => 1,
        Cell::White => 2,
    };
    let mut bg_index = if *theme.draw_stone_bg() { stone } else { 0 };
    let mut inverse_index = match bg_index {
        1 => 2,
        2 => 1,
        _ => 0,
    };
    // Checkerboard shading.
    if (x % 2 + y % 2) == 1 {
        bg_index += 3;
        inverse_index += 3;
    }

    let mut symbol = match cell {
        Cell::Empty => *symbols.board(),
        Cell::Black => *symbols.black(),
        Cell::White => *symbols.white(),
    };
    let fg = match cell {
        Cell::Empty => *colors.cursor_fg(),
        _ if *theme.draw_stone_bg() => palette[inverse_index],
        _ => palette[stone],
    };
    let mut bg = palette[bg_index];

    let last = snapshot.last_move();
    if cursor.is_at(x, y) {
        if *theme.draw_cursor_bg() {
            bg = *colors.cursor_bg();
        } else {
            symbol = *symbols.cursor();
        }
    } else if last.x == x as i32 && last.y == y as i32 {
        if *theme.draw_last_played_bg() {
            bg = *colors.last_played_bg();
        } else {
            symbol = *symbols.last_played();
        }
    }

    let mut style = Style::default()
        .fg(Color::Indexed(fg))
        .bg(Color::Indexed(bg));
    if snapshot.is_marked_for_removal(x, y) {
        style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
    }
    Span::styled(fill_cell(symbol), style)
}

/// A narrow symbol is drawn twice to fill the two-column cell.
fn fill_cell(symbol: char) -> String {
    if symbol.width() == Some(1) {
        format!("{symbol}{symbol}")
    } else {
        symbol.to_string()
    }
}

fn pad_label(letter: char) -> String {
    if letter.width() == Some(1) {
        format!("{letter} ")
    } else {
        letter.to_string()
    }
}
