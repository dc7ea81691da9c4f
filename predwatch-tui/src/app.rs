use crate::{config::ViewConfig, view::ViewWindow};
use chrono::{DateTime, Utc};
use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use predwatch_data::{
    CycleReport, FeedError, FeedEvent, PollStatus, SharedContext, StreamKind, StreamMap,
    StreamOutcome,
};
use ratatui::layout::Rect;
use smol_str::SmolStr;
use tracing::{debug, info};

/// Fraction of the visible span moved by one arrow key press.
const KEY_PAN_FRACTION: f64 = 0.1;

/// Feed health pill, derived from the latest settled cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Health {
    /// No cycle has settled for the current symbol yet
    Connecting,
    /// Every stream fetched successfully
    Live,
    /// Some streams failed, at least one succeeded
    Degraded,
    /// Every stream failed
    Down,
}

impl Health {
    /// `None` when the report carries no verdict (every outcome discarded).
    pub fn from_report(report: &CycleReport) -> Option<Self> {
        let mut ingested = 0;
        let mut failed = 0;
        for outcome in report.outcomes.values() {
            match outcome {
                StreamOutcome::Ingested { .. } => ingested += 1,
                StreamOutcome::Failed(_) => failed += 1,
                StreamOutcome::Discarded => {}
            }
        }
        match (ingested, failed) {
            (0, 0) => None,
            (_, 0) => Some(Self::Live),
            (0, _) => Some(Self::Down),
            _ => Some(Self::Degraded),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Live => "LIVE",
            Self::Degraded => "DEGRADED",
            Self::Down => "DOWN",
        }
    }
}

/// What the event loop must do after an input event.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AppAction {
    Continue,
    Quit,
    /// Stop polling, wipe the context and bootstrap `symbol` from scratch.
    Restart { symbol: SmolStr },
}

/// Interaction state of the terminal dashboard: one [`ViewWindow`] per chart plus the
/// last known feed health.
#[derive(Debug)]
pub struct App {
    context: SharedContext,
    views: StreamMap<ViewWindow>,
    /// Plot areas of the last drawn frame, used to map pointer cells to views.
    plots: StreamMap<Rect>,
    focused: StreamKind,
    dragging: Option<StreamKind>,
    hovered: Option<StreamKind>,
    symbols: Vec<SmolStr>,
    health: Health,
    status: PollStatus,
    last_error: Option<(StreamKind, FeedError)>,
    last_update: Option<DateTime<Utc>>,
}

impl App {
    pub fn new(context: SharedContext, config: ViewConfig, symbols: Vec<SmolStr>) -> Self {
        Self {
            context,
            views: StreamMap::from_fn(|_| ViewWindow::new(config)),
            plots: StreamMap::default(),
            focused: StreamKind::Hft,
            dragging: None,
            hovered: None,
            symbols,
            health: Health::Connecting,
            status: PollStatus::Idle,
            last_error: None,
            last_update: None,
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn view(&self, stream: StreamKind) -> &ViewWindow {
        &self.views[stream]
    }

    pub fn view_mut(&mut self, stream: StreamKind) -> &mut ViewWindow {
        &mut self.views[stream]
    }

    pub fn focused(&self) -> StreamKind {
        self.focused
    }

    pub fn hovered(&self) -> Option<StreamKind> {
        self.hovered
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn status(&self) -> PollStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&(StreamKind, FeedError)> {
        self.last_error.as_ref()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn set_status(&mut self, status: PollStatus) {
        self.status = status;
    }

    pub fn set_plot_area(&mut self, stream: StreamKind, area: Rect) {
        self.plots[stream] = area;
    }

    fn timeline_len(&self) -> usize {
        self.context.read().timeline().len()
    }

    /// Apply a poll loop notification. Reports from a generation that has since been
    /// reset are ignored.
    pub fn on_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::FetchFailed {
                stream,
                generation,
                error,
            } => {
                if !self.is_current(generation) {
                    debug!(%stream, generation, "ignoring failure of reset context");
                    return;
                }
                self.last_error = Some((stream, error));
            }
            FeedEvent::Cycle(report) => {
                if !self.is_current(report.generation) {
                    debug!(generation = report.generation, "ignoring report of reset context");
                    return;
                }
                if let Some(health) = Health::from_report(&report) {
                    self.health = health;
                }
                if is_clean(&report) {
                    self.last_error = None;
                }
                if report.added() > 0 {
                    let len = self.timeline_len();
                    for stream in StreamKind::ALL {
                        self.views[stream].on_data(len);
                    }
                    self.last_update = Some(Utc::now());
                }
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.context.read().generation()
    }

    /// Wipe every view after the context was reset for a new or reloaded symbol.
    pub fn on_restart(&mut self) {
        for stream in StreamKind::ALL {
            self.views[stream].reset(0);
        }
        self.dragging = None;
        self.hovered = None;
        self.health = Health::Connecting;
        self.last_error = None;
        self.last_update = None;
    }

    pub fn on_key(&mut self, key: KeyEvent) -> AppAction {
        if key.kind != KeyEventKind::Press {
            return AppAction::Continue;
        }

        let len = self.timeline_len();
        let view = &mut self.views[self.focused];
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return AppAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return AppAction::Quit;
            }
            KeyCode::Tab => {
                self.focused = next_stream(self.focused);
            }
            KeyCode::Left => view.pan_by(-view.span() * KEY_PAN_FRACTION, len),
            KeyCode::Right => view.pan_by(view.span() * KEY_PAN_FRACTION, len),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => view.zoom(true, 0.5, len),
            KeyCode::Char('-') | KeyCode::Char('_') | KeyCode::Down => view.zoom(false, 0.5, len),
            KeyCode::Char('f') | KeyCode::Char('F') => {
                for stream in StreamKind::ALL {
                    self.views[stream].follow(len);
                }
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let symbol = self.context.read().symbol().clone();
                info!(%symbol, "reloading symbol");
                return AppAction::Restart { symbol };
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                if let Some(symbol) = self.next_symbol() {
                    info!(%symbol, "switching symbol");
                    return AppAction::Restart { symbol };
                }
            }
            _ => {}
        }
        AppAction::Continue
    }

    fn next_symbol(&self) -> Option<SmolStr> {
        let current = self.context.read().symbol().clone();
        let position = self.symbols.iter().position(|symbol| *symbol == current);
        let next = match position {
            Some(index) => self.symbols.get((index + 1) % self.symbols.len()),
            None => self.symbols.first(),
        }?;
        (*next != current).then(|| next.clone())
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent) {
        let len = self.timeline_len();
        let target = self.locate(mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some((stream, _)) = target {
                    self.focused = stream;
                    self.dragging = Some(stream);
                    self.views[stream].begin_drag(f64::from(mouse.column));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(stream) = self.dragging {
                    let width = travel(self.plots[stream]);
                    self.views[stream].drag_to(f64::from(mouse.column), width, len);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(stream) = self.dragging.take() {
                    self.views[stream].end_drag();
                }
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                if let Some((stream, ratio)) = target {
                    let zoom_in = matches!(mouse.kind, MouseEventKind::ScrollUp);
                    self.views[stream].zoom(zoom_in, ratio, len);
                }
            }
            MouseEventKind::Moved => {}
            _ => return,
        }

        self.track_hover(target, len);
    }

    fn track_hover(&mut self, target: Option<(StreamKind, f64)>, len: usize) {
        if let Some(previous) = self.hovered.filter(|hovered| Some(*hovered) != target.map(|(s, _)| s)) {
            self.views[previous].leave();
        }
        self.hovered = target.map(|(stream, ratio)| {
            self.views[stream].hover(ratio, len);
            stream
        });
    }

    /// Chart under a terminal cell and the horizontal position within its plot area.
    fn locate(&self, column: u16, row: u16) -> Option<(StreamKind, f64)> {
        self.plots.iter().find_map(|(stream, area)| {
            let inside = area.width > 0
                && column >= area.x
                && column < area.x + area.width
                && row >= area.y
                && row < area.y + area.height;
            inside.then(|| (stream, f64::from(column - area.x) / travel(*area)))
        })
    }
}

fn is_clean(report: &CycleReport) -> bool {
    report.failures().next().is_none() && report.is_ok()
}

/// Cells a pointer can move across a plot, first column to last.
fn travel(area: Rect) -> f64 {
    f64::from(area.width.saturating_sub(1).max(1))
}

fn next_stream(stream: StreamKind) -> StreamKind {
    match stream {
        StreamKind::Hft => StreamKind::Idt,
        StreamKind::Idt => StreamKind::Snapshot,
        StreamKind::Snapshot => StreamKind::Hft,
    }
}
