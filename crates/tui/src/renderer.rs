use std::io::{Stdout, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::FixedOffset;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Cell, Paragraph, Row, Table},
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tuneline_core::fetch::{FetchResponse, HistoryRequest, HistorySource};
use tuneline_core::model::time_range::local_date;
use tuneline_core::model::{FetchStatus, PRESETS};
use tuneline_core::views::{PageNav, TimelineLayout};
use tuneline_core::TimelineSession;
use tuneline_protocol::{ScrobbleId, SelectionState};

/// Logical timeline pixels covered by one terminal column.
const PX_PER_COL: f64 = 10.0;
const STRIP_HEIGHT: u16 = 5;

/// Screen regions, derived from the terminal size alone so input handling
/// can hit-test against the same rectangles the last frame used.
#[derive(Debug, Clone, Copy)]
struct Areas {
    header: Rect,
    strip: Rect,
    list: Rect,
    footer: Rect,
}

impl Areas {
    fn new(area: Rect) -> Self {
        let [header, strip, list, footer] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(STRIP_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);
        Self {
            header,
            strip,
            list,
            footer,
        }
    }

    fn strip_inner(&self) -> Rect {
        Block::bordered().inner(self.strip)
    }

    /// Rows available for scrobbles inside the list border, below its header.
    fn list_rows(&self) -> Rect {
        let inner = Block::bordered().inner(self.list);
        Rect {
            y: inner.y.saturating_add(1),
            height: inner.height.saturating_sub(1),
            ..inner
        }
    }

    fn viewport_px(&self) -> f64 {
        f64::from(self.strip_inner().width) * PX_PER_COL
    }
}

struct App<S> {
    session: TimelineSession,
    source: Arc<S>,
    runtime: Handle,
    tx: UnboundedSender<FetchResponse>,
    rx: UnboundedReceiver<FetchResponse>,
    in_flight: Option<JoinHandle<()>>,
    scroll_x: f64,
    /// Row of the keyboard cursor within the current page.
    cursor: usize,
}

impl<S: HistorySource + Send + Sync + 'static> App<S> {
    fn new(session: TimelineSession, source: Arc<S>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session,
            source,
            runtime,
            tx,
            rx,
            in_flight: None,
            scroll_x: 0.0,
            cursor: 0,
        }
    }

    /// Run `request` in the background. The previous task is aborted; if it
    /// already finished, its response is discarded by the session instead.
    fn spawn(&mut self, request: HistoryRequest) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        tracing::debug!(seq = request.seq, "spawning history fetch");
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        self.in_flight = Some(self.runtime.spawn(async move {
            let response = request.run(&*source).await;
            let _ = tx.send(response);
        }));
    }

    fn edit(&mut self, request: Option<HistoryRequest>, viewport_px: f64) {
        if let Some(request) = request {
            self.spawn(request);
        }
        self.scroll_x = clamp_scroll(self.session.layout(), self.scroll_x, viewport_px);
    }

    fn drain(&mut self, viewport_px: f64) {
        while let Ok(response) = self.rx.try_recv() {
            if self.session.apply(response) {
                self.in_flight = None;
                self.scroll_x = clamp_scroll(self.session.layout(), self.scroll_x, viewport_px);
                self.cursor = self.cursor.min(self.session.page().items.len().saturating_sub(1));
            }
        }
    }

    fn scroll_by(&mut self, delta: f64, viewport_px: f64) {
        self.scroll_x = clamp_scroll(self.session.layout(), self.scroll_x + delta, viewport_px);
    }

    fn goto_page(&mut self, nav: PageNav) {
        self.session.goto_page(nav);
        self.cursor = 0;
        self.hover_cursor();
    }

    fn move_cursor(&mut self, down: bool) {
        let rows = self.session.page().items.len();
        if rows == 0 {
            return;
        }
        self.cursor = if down {
            (self.cursor + 1).min(rows - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
        self.hover_cursor();
    }

    fn hover_cursor(&mut self) {
        let id = self.session.page().items.get(self.cursor).map(|s| s.id.clone());
        self.session.set_hovered(id);
    }

    /// Select `id` and bring both views to it.
    fn locate(&mut self, id: ScrobbleId, viewport_px: f64) {
        let Some(target) = self.session.select(id) else {
            return;
        };
        self.scroll_x = self
            .session
            .layout()
            .center_scroll(target.timeline_offset, viewport_px);
        self.session.goto_page(PageNav::Goto(target.list_page));
        self.cursor = target.list_row.saturating_sub(self.session.page().first_row);
    }

    /// Nearest scrobble under a strip column, if any is close enough.
    fn scrobble_at_column(&self, areas: &Areas, column: u16) -> Option<ScrobbleId> {
        let inner = areas.strip_inner();
        let x = self.scroll_x + (f64::from(column.saturating_sub(inner.x)) + 0.5) * PX_PER_COL;
        self.session
            .layout()
            .nearest(x, PX_PER_COL)
            .map(|p| p.id.clone())
    }

    fn scrobble_at_row(&self, areas: &Areas, row: u16) -> Option<ScrobbleId> {
        let rows = areas.list_rows();
        let index = usize::from(row.checked_sub(rows.y)?);
        self.session.page().items.get(index).map(|s| s.id.clone())
    }

    /// Returns `false` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode, viewport_px: f64) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char(c @ '1'..='4') => {
                let slot = usize::from(c as u8 - b'1');
                if let Some(&days) = PRESETS.get(slot) {
                    let request = self.session.apply_preset(days);
                    self.edit(request, viewport_px);
                }
            }
            KeyCode::Char('[') => {
                let request = self.session.shift_start(-1);
                self.edit(request, viewport_px);
            }
            KeyCode::Char(']') => {
                let request = self.session.shift_start(1);
                self.edit(request, viewport_px);
            }
            KeyCode::Char('{') => {
                let request = self.session.shift_end(-1);
                self.edit(request, viewport_px);
            }
            KeyCode::Char('}') => {
                let request = self.session.shift_end(1);
                self.edit(request, viewport_px);
            }
            KeyCode::Char('r') => {
                let request = self.session.refresh();
                self.spawn(request);
            }
            KeyCode::Char('h') | KeyCode::Left => self.scroll_by(-viewport_px / 4.0, viewport_px),
            KeyCode::Char('l') | KeyCode::Right => self.scroll_by(viewport_px / 4.0, viewport_px),
            KeyCode::Char('n') => self.goto_page(PageNav::Next),
            KeyCode::Char('p') => self.goto_page(PageNav::Previous),
            KeyCode::Char('g') => self.goto_page(PageNav::First),
            KeyCode::Char('G') => self.goto_page(PageNav::Last),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(true),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(false),
            KeyCode::Enter => {
                if let Some(id) = self.session.selection().hovered.clone() {
                    self.locate(id, viewport_px);
                }
            }
            KeyCode::Char('x') => self.session.clear_selection(),
            _ => {}
        }
        true
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, areas: &Areas) {
        let viewport_px = areas.viewport_px();
        let at = Position::new(mouse.column, mouse.row);
        let on_strip = areas.strip_inner().contains(at);
        let on_list = areas.list_rows().contains(at);
        match mouse.kind {
            MouseEventKind::Moved if on_strip => {
                let id = self.scrobble_at_column(areas, mouse.column);
                self.session.set_hovered(id);
            }
            MouseEventKind::Moved if on_list => {
                let id = self.scrobble_at_row(areas, mouse.row);
                if let Some(row) = mouse.row.checked_sub(areas.list_rows().y) {
                    self.cursor = usize::from(row);
                }
                self.session.set_hovered(id);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let id = if on_strip {
                    self.scrobble_at_column(areas, mouse.column)
                } else if on_list {
                    self.scrobble_at_row(areas, mouse.row)
                } else {
                    None
                };
                if let Some(id) = id {
                    self.locate(id, viewport_px);
                }
            }
            MouseEventKind::ScrollLeft | MouseEventKind::ScrollUp if on_strip => {
                self.scroll_by(-PX_PER_COL * 4.0, viewport_px);
            }
            MouseEventKind::ScrollRight | MouseEventKind::ScrollDown if on_strip => {
                self.scroll_by(PX_PER_COL * 4.0, viewport_px);
            }
            MouseEventKind::ScrollDown if on_list => self.goto_page(PageNav::Next),
            MouseEventKind::ScrollUp if on_list => self.goto_page(PageNav::Previous),
            _ => {}
        }
    }
}

pub fn render_tui<S>(mut session: TimelineSession, source: Arc<S>, runtime: Handle) -> Result<()>
where
    S: HistorySource + Send + Sync + 'static,
{
    session.subscribe(|state: &SelectionState| {
        tracing::debug!(
            hovered = ?state.hovered,
            selected = ?state.selected,
            "selection changed"
        );
    });

    let mut app = App::new(session, source, runtime);
    let request = app.session.refresh();
    app.spawn(request);

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

fn run<S>(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App<S>) -> Result<()>
where
    S: HistorySource + Send + Sync + 'static,
{
    loop {
        let size = terminal.size()?;
        let areas = Areas::new(Rect::new(0, 0, size.width, size.height));
        let viewport_px = areas.viewport_px();
        app.drain(viewport_px);

        terminal.draw(|frame| draw(frame, app, &areas))?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !app.handle_key(key.code, viewport_px) {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, &areas),
                _ => {}
            }
        }
    }
    if let Some(handle) = app.in_flight.take() {
        handle.abort();
    }
    Ok(())
}

fn draw<S>(frame: &mut Frame<'_>, app: &App<S>, areas: &Areas) {
    let session = &app.session;
    let offset = session.config().offset();

    let range = session.range();
    let preset = session
        .range_model()
        .active_preset()
        .map_or_else(|| "custom".to_string(), |d| format!("{d}d"));
    let status = match session.status() {
        FetchStatus::Idle => String::new(),
        FetchStatus::Loading => " | loading...".to_string(),
        FetchStatus::Failed(msg) => format!(" | {msg}"),
    };
    let header = Paragraph::new(format!(
        " tuneline | {} | {} to {} ({preset}) | {} scrobbles{status}",
        session.user(),
        local_date(range.start, offset),
        local_date(range.end, offset),
        session.events().len(),
    ))
    .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    frame.render_widget(header, areas.header);

    draw_strip(frame, app, areas);
    draw_list(frame, session, areas, offset);

    let footer = Paragraph::new(
        " 1-4 preset  [ ] start  { } end  h/l scroll  n/p/g/G page  j/k hover  Enter select  x clear  q quit",
    )
    .style(Style::default().fg(Color::Gray).bg(Color::Black));
    frame.render_widget(footer, areas.footer);
}

fn draw_strip<S>(frame: &mut Frame<'_>, app: &App<S>, areas: &Areas) {
    let layout = app.session.layout();
    let selection = app.session.selection();
    let block = Block::bordered().title(format!(
        " timeline {:.0}/{:.0}px, {} ",
        app.scroll_x,
        layout.width,
        layout.interval.label()
    ));
    frame.render_widget(block, areas.strip);

    let inner = areas.strip_inner();
    if inner.width == 0 || inner.height < 3 {
        return;
    }
    let viewport_px = areas.viewport_px();
    let label_row = inner.y;
    let axis_row = inner.y + 1;
    let event_row = inner.y + 2;
    let buf = frame.buffer_mut();

    for x in inner.x..inner.x + inner.width {
        buf[(x, axis_row)].set_char('─').set_fg(Color::DarkGray);
    }
    for marker in layout.visible_markers(app.scroll_x, viewport_px) {
        let Some(col) = column_of(marker.offset, app.scroll_x, inner.width) else {
            continue;
        };
        let x = inner.x + col;
        buf[(x, axis_row)].set_char('┼').set_fg(Color::Gray);
        let room = usize::from(inner.width - col);
        for (i, ch) in marker.label.chars().take(room).enumerate() {
            let cx = x + i as u16;
            buf[(cx, label_row)].set_char(ch).set_fg(Color::Gray);
        }
    }

    let glyphs = strip_columns(layout, selection, app.scroll_x, inner.width);
    for (col, glyph) in glyphs.iter().enumerate() {
        let color = match glyph {
            Glyph::Empty => continue,
            Glyph::Event => Color::Cyan,
            Glyph::Hovered => Color::Yellow,
            Glyph::Selected => Color::Green,
        };
        buf[(inner.x + col as u16, event_row)]
            .set_char('●')
            .set_fg(color);
    }
}

fn draw_list(frame: &mut Frame<'_>, session: &TimelineSession, areas: &Areas, offset: FixedOffset) {
    let page = session.page();
    let selection = session.selection();
    let rows: Vec<Row<'_>> = page
        .items
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let style = if selection.is_selected(&s.id) {
                Style::default().fg(Color::Black).bg(Color::Green)
            } else if selection.is_hovered(&s.id) {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(format!("{:>4}", page.first_row + i + 1)),
                Cell::from(
                    s.listened_at
                        .with_timezone(&offset)
                        .format("%b %-d %H:%M")
                        .to_string(),
                ),
                Cell::from(s.artist.to_string()),
                Cell::from(s.track.to_string()),
                Cell::from(s.album.as_deref().unwrap_or("").to_string()),
            ])
            .style(style)
        })
        .collect();

    let header = Row::new(vec!["#", "Listened", "Artist", "Track", "Album"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(13),
            Constraint::Percentage(25),
            Constraint::Percentage(35),
            Constraint::Fill(1),
        ],
    )
    .header(header)
    .block(Block::bordered().title(format!(
        " page {}/{} ",
        page.current_page, page.total_pages
    )));
    frame.render_widget(table, areas.list);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Glyph {
    Empty,
    Event,
    Hovered,
    Selected,
}

/// Terminal column for a strip offset, if it is on screen.
fn column_of(offset: f64, scroll_x: f64, width: u16) -> Option<u16> {
    let col = ((offset - scroll_x) / PX_PER_COL).floor();
    if col < 0.0 || col >= f64::from(width) {
        return None;
    }
    Some(col as u16)
}

/// What to draw in each visible column. Several scrobbles can share a
/// column; the most prominent one wins.
fn strip_columns(
    layout: &TimelineLayout,
    selection: &SelectionState,
    scroll_x: f64,
    width: u16,
) -> Vec<Glyph> {
    let mut glyphs = vec![Glyph::Empty; usize::from(width)];
    for p in &layout.positions {
        let Some(col) = column_of(p.offset, scroll_x, width) else {
            continue;
        };
        let glyph = if selection.is_selected(&p.id) {
            Glyph::Selected
        } else if selection.is_hovered(&p.id) {
            Glyph::Hovered
        } else {
            Glyph::Event
        };
        let slot = &mut glyphs[usize::from(col)];
        *slot = (*slot).max(glyph);
    }
    glyphs
}

fn clamp_scroll(layout: &TimelineLayout, scroll_x: f64, viewport_px: f64) -> f64 {
    scroll_x.clamp(0.0, (layout.width - viewport_px).max(0.0))
}

#[cfg(test)]
mod tests {
    use tuneline_core::views::time_axis::MarkerInterval;
    use tuneline_protocol::PositionedScrobble;

    use super::*;

    fn layout(offsets: &[f64]) -> TimelineLayout {
        TimelineLayout {
            width: 1400.0,
            days_in_range: 7,
            positions: offsets
                .iter()
                .enumerate()
                .map(|(index, &offset)| PositionedScrobble {
                    id: ScrobbleId::new(format!("s{index}")),
                    index,
                    offset,
                })
                .collect(),
            markers: Vec::new(),
            interval: MarkerInterval::SixHours,
        }
    }

    #[test]
    fn columns_follow_scroll() {
        assert_eq!(column_of(105.0, 0.0, 80), Some(10));
        assert_eq!(column_of(105.0, 100.0, 80), Some(0));
        assert_eq!(column_of(95.0, 100.0, 80), None);
        assert_eq!(column_of(900.0, 100.0, 80), None);
    }

    #[test]
    fn selected_wins_a_shared_column() {
        let layout = layout(&[12.0, 15.0, 40.0]);
        let selection = SelectionState {
            hovered: Some(ScrobbleId::from("s2")),
            selected: Some(ScrobbleId::from("s1")),
        };
        let glyphs = strip_columns(&layout, &selection, 0.0, 6);
        assert_eq!(
            glyphs,
            [
                Glyph::Empty,
                Glyph::Selected,
                Glyph::Empty,
                Glyph::Empty,
                Glyph::Hovered,
                Glyph::Empty,
            ]
        );
    }

    #[test]
    fn scroll_stays_on_the_strip() {
        let layout = layout(&[]);
        assert!((clamp_scroll(&layout, -50.0, 800.0)).abs() < f64::EPSILON);
        assert!((clamp_scroll(&layout, 900.0, 800.0) - 600.0).abs() < f64::EPSILON);
        assert!((clamp_scroll(&layout, 900.0, 2000.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn regions_stack_top_to_bottom() {
        let areas = Areas::new(Rect::new(0, 0, 100, 30));
        assert_eq!(areas.header.height, 1);
        assert_eq!(areas.strip.y, 1);
        assert_eq!(areas.strip.height, STRIP_HEIGHT);
        assert_eq!(areas.footer.y, 29);
        assert_eq!(areas.strip_inner().width, 98);
        assert!((areas.viewport_px() - 980.0).abs() < f64::EPSILON);
        assert_eq!(areas.list_rows().y, areas.list.y + 2);
    }
}
