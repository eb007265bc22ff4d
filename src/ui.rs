use cat_coin_flip::{
    GameSnapshot,
    Side,
    notices::{
        Notice,
        NoticeLevel,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::{
    Stdout,
    stdout,
};
use unicode_width::UnicodeWidthStr;

const HEADS_COLOR: Color = Color::Rgb(0xF3, 0x9C, 0x50);
const TAILS_COLOR: Color = Color::Rgb(0x5E, 0xCC, 0xE5);
const TOAST_WIDTH: u16 = 44;

const HEADS_CAT: [&str; 4] = [r" /\_/\ ", r"( o.o )", r" > ^ < ", r"  HEADS "];
const TAILS_CAT: [&str; 4] = [r" /\_/\     ", r"(     )    ", r" (    )_~~ ", r"  TAILS    "];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Select(Side),
    Flip,
    Claim,
    Connect,
    Disconnect,
    ToggleInstructions,
    DismissNotice,
    Redraw,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    QuitModal,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    frame: usize,
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
}

pub type InputEventStream = EventStream;

pub fn input_event_stream() -> InputEventStream {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventStream) -> Result<Event> {
    let event = events
        .next()
        .await
        .ok_or_else(|| eyre!("terminal input stream closed"))?;
    event.wrap_err("reading terminal input failed")
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // one persistent terminal so ratatui can diff buffers between draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

/// Steps the coin animation. Only moves while a flip is in flight.
pub fn advance_animation(state: &mut UiState, snap: &GameSnapshot) {
    if snap.flipping {
        state.frame = state.frame.wrapping_add(1);
    } else {
        state.frame = 0;
    }
}

pub fn draw(state: &mut UiState, snap: &GameSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let res = term.draw(|f| ui(f, state, snap)).map(|_| ());
        state.terminal = Some(term);
        res?;
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => interpret_key(state, key),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    // raw mode swallows SIGINT, so ctrl-c arrives as a key
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    if state.mode == Mode::QuitModal {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    let ev = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Char('h') | KeyCode::Left => UserEvent::Select(Side::Heads),
        KeyCode::Char('t') | KeyCode::Right => UserEvent::Select(Side::Tails),
        KeyCode::Enter | KeyCode::Char('f') => UserEvent::Flip,
        KeyCode::Char('c') => UserEvent::Claim,
        KeyCode::Char('w') => UserEvent::Connect,
        KeyCode::Char('d') => UserEvent::Disconnect,
        KeyCode::Char('?') => UserEvent::ToggleInstructions,
        KeyCode::Char('x') => UserEvent::DismissNotice,
        _ => return None,
    };
    Some(ev)
}

fn ui(f: &mut Frame, state: &UiState, snap: &GameSnapshot) {
    f.render_widget(Clear, f.area());
    let instructions_height = if snap.show_instructions { 6 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Length(3), // stats
            Constraint::Length(3), // history
            Constraint::Min(7),    // coin
            Constraint::Length(6), // cats
            Constraint::Length(instructions_height),
            Constraint::Length(3), // help
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_stats(f, chunks[1], snap);
    draw_history(f, chunks[2], snap);
    draw_coin(f, chunks[3], state, snap);
    draw_cats(f, chunks[4], snap);
    if snap.show_instructions {
        draw_instructions(f, chunks[5]);
    }
    draw_help(f, chunks[6], snap);
    draw_footer(f, chunks[7], snap);
    draw_notices(f, &snap.notices);
    if state.mode == Mode::QuitModal {
        draw_quit_modal(f);
    }
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Heads => HEADS_COLOR,
        Side::Tails => TAILS_COLOR,
    }
}

fn draw_header(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let wallet = if snap.wallet_connected {
        Span::styled(
            format!("● {}", snap.wallet_label),
            Style::default().fg(Color::Green),
        )
    } else {
        Span::styled("○ not connected (w to connect)", Style::default().fg(Color::DarkGray))
    };
    let lines = vec![
        Line::from(vec![
            Span::raw("Wallet: "),
            wallet,
            Span::raw(" | "),
            Span::styled(
                format!("Score: {}", snap.score),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(snap.status.clone()),
    ];
    let header = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                "Cat Coin Flip",
                Style::default().fg(HEADS_COLOR).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(header, area);
}

fn draw_stats(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let line = Line::from(vec![
        Span::raw(format!("Total Flips: {}   ", snap.stats.total())),
        Span::styled(
            format!("Heads: {}%", snap.stats.heads_percentage()),
            Style::default().fg(HEADS_COLOR).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("Tails: {}%", snap.stats.tails_percentage()),
            Style::default().fg(TAILS_COLOR).add_modifier(Modifier::BOLD),
        ),
    ]);
    let stats = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Stats"));
    f.render_widget(stats, area);
}

fn history_line(snap: &GameSnapshot) -> Line<'static> {
    if snap.history.is_empty() {
        return Line::styled("No flips yet. Start playing!", Style::default().fg(Color::DarkGray));
    }
    let spans = snap
        .history
        .iter()
        .map(|flip| {
            Span::styled(
                format!("({})", flip.side.glyph()),
                Style::default()
                    .fg(Color::Black)
                    .bg(side_color(flip.side))
                    .add_modifier(Modifier::BOLD),
            )
        })
        .interleave_shortest(std::iter::repeat_n(Span::raw(" "), snap.history.len() - 1))
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn draw_history(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let history = Paragraph::new(history_line(snap))
        .block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(history, area);
}

fn coin_face(face: &str) -> [String; 5] {
    [
        String::from("  .-----.  "),
        String::from(" /       \\ "),
        format!("|    {face}    |"),
        String::from(" \\       / "),
        String::from("  '-----'  "),
    ]
}

fn coin_half(face: &str) -> [String; 5] {
    [
        String::from("   .---.   "),
        String::from("  /     \\  "),
        format!("  |  {face}  |  "),
        String::from("  \\     /  "),
        String::from("   '---'   "),
    ]
}

fn coin_edge() -> [String; 5] {
    std::array::from_fn(|_| String::from("     |     "))
}

/// Art for one animation step. Spins H, edge, T, edge.
fn coin_frame(frame: usize) -> [String; 5] {
    match frame % 8 {
        0 => coin_face("H"),
        1 => coin_half("H"),
        2 | 6 => coin_edge(),
        3 => coin_half("T"),
        4 => coin_face("T"),
        5 => coin_half("T"),
        _ => coin_half("H"),
    }
}

fn draw_coin(f: &mut Frame, area: Rect, state: &UiState, snap: &GameSnapshot) {
    let (art, color, caption) = if snap.flipping {
        (coin_frame(state.frame), Color::Yellow, String::from("Flipping..."))
    } else if let Some(last) = snap.last_result() {
        (
            coin_face(last.side.glyph()),
            side_color(last.side),
            format!("Landed on {}", last.side),
        )
    } else {
        (coin_face("?"), Color::Gray, String::from("Pick a side and flip!"))
    };
    let mut lines: Vec<Line> = art
        .into_iter()
        .map(|row| Line::styled(row, Style::default().fg(color)))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(caption));
    let coin = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Coin"));
    f.render_widget(coin, area);
}

fn cat_panel(art: &[&str], side: Side, selected: bool) -> Paragraph<'static> {
    let style = if selected {
        Style::default().fg(side_color(side)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let lines: Vec<Line> = art
        .iter()
        .map(|row| Line::styled(row.to_string(), style))
        .collect();
    let title = if selected {
        format!("[{}] {}", side.glyph(), side)
    } else {
        format!(" {}  {}", side.glyph(), side)
    };
    let border = if selected {
        Style::default().fg(side_color(side))
    } else {
        Style::default()
    };
    Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Span::styled(title, style)),
    )
}

fn draw_cats(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(20),
            Constraint::Percentage(40),
        ])
        .split(area);
    let selected = snap.selection;
    f.render_widget(
        cat_panel(&HEADS_CAT, Side::Heads, selected == Some(Side::Heads)),
        cols[0],
    );
    let pick = match selected {
        Some(side) => Span::styled(
            format!("Your pick: {side}"),
            Style::default().fg(side_color(side)),
        ),
        None => Span::styled("No pick", Style::default().fg(Color::DarkGray)),
    };
    let middle = Paragraph::new(vec![Line::from(""), Line::from(pick)])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Bet"));
    f.render_widget(middle, cols[1]);
    f.render_widget(
        cat_panel(&TAILS_CAT, Side::Tails, selected == Some(Side::Tails)),
        cols[2],
    );
}

fn draw_instructions(f: &mut Frame, area: Rect) {
    let steps = [
        "1. Select heads or tails",
        "2. Press Enter to flip the coin",
        "3. If you guess correctly, you will earn 10 points!",
        "4. Try to get the highest score possible",
    ];
    let lines: Vec<Line> = steps.iter().map(|s| Line::from(*s)).collect();
    let help = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("How to Play"));
    f.render_widget(help, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let flip = if snap.flipping { "Flipping..." } else { "Enter/f Flip Coin!" };
    let instructions = if snap.show_instructions {
        "? Hide Instructions"
    } else {
        "? How to Play"
    };
    let wallet = if snap.wallet_connected { "d disconnect" } else { "w connect" };
    let text = [
        "h/← heads",
        "t/→ tails",
        flip,
        "c claim free coins",
        wallet,
        instructions,
        "x dismiss",
        "q/Esc quit",
    ]
    .iter()
    .join(" | ");
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_footer(f: &mut Frame, area: Rect, snap: &GameSnapshot) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("High Score: {}", snap.high_score),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("   Stake per flip: {}", snap.stake)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Success => Color::Green,
        NoticeLevel::Error => Color::Red,
    }
}

fn toast_rect(notice: &Notice, screen: Rect, top: u16) -> Rect {
    let content = notice
        .description
        .as_deref()
        .map_or(0, UnicodeWidthStr::width)
        .max(notice.title.width()) as u16;
    let width = (content + 4).clamp(20, TOAST_WIDTH).min(screen.width);
    let inner_width = width.saturating_sub(2).max(1);
    let description_rows = notice
        .description
        .as_deref()
        .map_or(0, |d| (d.width() as u16).div_ceil(inner_width));
    let height = (2 + description_rows).max(3);
    Rect::new(
        screen.x + screen.width.saturating_sub(width + 1),
        top,
        width,
        height,
    )
}

fn draw_notices(f: &mut Frame, notices: &[Notice]) {
    let screen = f.area();
    let mut top = screen.y + 1;
    for notice in notices {
        let area = toast_rect(notice, screen, top);
        if area.bottom() > screen.bottom() {
            break;
        }
        let color = notice_color(notice.level);
        let body = notice.description.clone().unwrap_or_default();
        let toast = Paragraph::new(body).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(Span::styled(
                    notice.title.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )),
        );
        f.render_widget(Clear, area);
        f.render_widget(toast, area);
        top = area.bottom();
    }
}

fn draw_quit_modal(f: &mut Frame) {
    let area = centered_rect(40, 20, f.area());
    let block = Block::default().borders(Borders::ALL).title("Quit");
    let p = Paragraph::new("Leave Cat Coin Flip?\ny = quit   n/Esc = stay")
        .alignment(Alignment::Center);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(p, block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use cat_coin_flip::{
        FlipResult,
        game::Stats,
    };

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn snapshot() -> GameSnapshot {
        GameSnapshot {
            wallet_connected: true,
            wallet_label: String::from("offline"),
            selection: None,
            flipping: false,
            score: 0,
            high_score: 0,
            stats: Stats::default(),
            history: Vec::new(),
            notices: Vec::new(),
            show_instructions: false,
            status: String::from("Ready"),
            stake: 100,
        }
    }

    #[test]
    fn interpret_event__maps_game_keys() {
        let mut state = UiState::default();
        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Left)),
            Some(UserEvent::Select(Side::Heads))
        );
        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char('t'))),
            Some(UserEvent::Select(Side::Tails))
        );
        assert_eq!(interpret_event(&mut state, key(KeyCode::Enter)), Some(UserEvent::Flip));
        assert_eq!(interpret_event(&mut state, key(KeyCode::Char('c'))), Some(UserEvent::Claim));
        assert_eq!(interpret_event(&mut state, key(KeyCode::Char('z'))), None);
    }

    #[test]
    fn interpret_event__quit_goes_through_confirmation() {
        // given
        let mut state = UiState::default();

        // when
        let first = interpret_event(&mut state, key(KeyCode::Char('q')));
        let ignored = interpret_event(&mut state, key(KeyCode::Char('h')));
        let cancel = interpret_event(&mut state, key(KeyCode::Char('n')));
        let _ = interpret_event(&mut state, key(KeyCode::Esc));
        let confirm = interpret_event(&mut state, key(KeyCode::Char('y')));

        // then
        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(ignored, None);
        assert_eq!(cancel, Some(UserEvent::Redraw));
        assert_eq!(confirm, Some(UserEvent::Quit));
    }

    #[test]
    fn interpret_event__ctrl_c_quits_immediately() {
        let mut state = UiState::default();
        let ev = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(interpret_event(&mut state, ev), Some(UserEvent::Quit));
    }

    #[test]
    fn history_line__shows_placeholder_when_empty() {
        let line = history_line(&snapshot());
        assert_eq!(line.to_string(), "No flips yet. Start playing!");
    }

    #[test]
    fn history_line__lists_glyphs_most_recent_first() {
        let mut snap = snapshot();
        snap.history = vec![
            FlipResult { side: Side::Tails, timestamp: 3 },
            FlipResult { side: Side::Heads, timestamp: 2 },
            FlipResult { side: Side::Heads, timestamp: 1 },
        ];
        assert_eq!(history_line(&snap).to_string(), "(T) (H) (H)");
    }

    #[test]
    fn advance_animation__only_moves_while_flipping() {
        let mut state = UiState::default();
        let mut snap = snapshot();
        snap.flipping = true;
        advance_animation(&mut state, &snap);
        advance_animation(&mut state, &snap);
        assert_eq!(state.frame, 2);
        snap.flipping = false;
        advance_animation(&mut state, &snap);
        assert_eq!(state.frame, 0);
    }

    #[test]
    fn ui__renders_board_on_test_backend() {
        // given
        let backend = ratatui::backend::TestBackend::new(100, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        let state = UiState::default();
        let mut snap = snapshot();
        snap.selection = Some(Side::Heads);

        // when
        terminal.draw(|f| ui(f, &state, &snap)).unwrap();

        // then
        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(rendered.contains("Cat Coin Flip"));
        assert!(rendered.contains("No flips yet. Start playing!"));
        assert!(rendered.contains("Your pick: heads"));
        assert!(rendered.contains("High Score: 0"));
    }
}
