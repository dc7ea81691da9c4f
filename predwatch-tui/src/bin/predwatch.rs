/// Predwatch Dashboard
///
/// Live hft/idt prediction curves and market snapshot prices for one symbol, polled from
/// the prediction service and drawn on a shared timeline.
/// Logs go to `PREDWATCH_LOG_FILE` (default `predwatch.log`) so they never tear the UI.
use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use predwatch_data::{
    FeedConfig, FeedContext, FeedEvent, HttpFeedClient, PollHandle, PollScheduler, SharedContext,
};
use predwatch_tui::{
    App, AppAction, TuiError, ViewConfig,
    config::{log_file_path, symbols_from_env},
    render,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::info;

type Backend = CrosstermBackend<io::Stdout>;

#[tokio::main]
async fn main() -> Result<(), TuiError> {
    init_logging()?;

    let feed_config = FeedConfig::from_env();
    let symbols = symbols_from_env(&feed_config.symbol);
    let client = Arc::new(HttpFeedClient::new(&feed_config)?);
    let context = FeedContext::shared(feed_config.symbol.clone(), feed_config.capacity);
    let mut app = App::new(context.clone(), ViewConfig::from_env(), symbols);

    info!(
        url = %feed_config.base_url,
        symbol = %feed_config.symbol,
        "starting predwatch"
    );

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let poller = Poller::start(Arc::clone(&client), context, feed_config);
    let result = run(&mut terminal, &mut app, poller).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// The running poll loop and the pieces needed to restart it for another symbol.
struct Poller {
    client: Arc<HttpFeedClient>,
    context: SharedContext,
    config: FeedConfig,
    handle: PollHandle,
    events: mpsc::Receiver<FeedEvent>,
}

impl Poller {
    fn start(client: Arc<HttpFeedClient>, context: SharedContext, config: FeedConfig) -> Self {
        let (handle, events) =
            PollScheduler::new(Arc::clone(&client), context.clone(), config.clone()).start();
        Self {
            client,
            context,
            config,
            handle,
            events,
        }
    }

    /// Stop the current loop, wipe the context and bootstrap `symbol`. Results of fetches
    /// still in flight belong to the previous generation and are discarded.
    fn restart(&mut self, symbol: smol_str::SmolStr) {
        self.handle.stop();
        self.context.write().reset(symbol.clone());
        self.config = self.config.clone().with_symbol(symbol);

        let (handle, events) = PollScheduler::new(
            Arc::clone(&self.client),
            self.context.clone(),
            self.config.clone(),
        )
        .start();
        self.handle = handle;
        self.events = events;
    }
}

async fn run(
    terminal: &mut Terminal<Backend>,
    app: &mut App,
    mut poller: Poller,
) -> Result<(), TuiError> {
    let mut last_draw = Instant::now();
    let draw_interval = Duration::from_millis(50);

    let result = loop {
        while let Ok(event) = poller.events.try_recv() {
            app.on_feed_event(event);
        }
        app.set_status(poller.handle.status());

        if event::poll(Duration::from_millis(5))? {
            match event::read()? {
                Event::Key(key) => match app.on_key(key) {
                    AppAction::Quit => break Ok(()),
                    AppAction::Restart { symbol } => {
                        poller.restart(symbol);
                        app.on_restart();
                    }
                    AppAction::Continue => {}
                },
                Event::Mouse(mouse) => app.on_mouse(mouse),
                _ => {}
            }
        }

        if last_draw.elapsed() >= draw_interval {
            terminal.draw(|frame| render::draw(frame, app))?;
            last_draw = Instant::now();
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    poller.handle.shutdown().await;
    result
}

// Initialise an INFO `Subscriber` for `Tracing` logs, written to the log file
fn init_logging() -> Result<(), TuiError> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path())?;

    tracing_subscriber::fmt()
        // Filter messages based on the INFO level
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Escape codes would end up in the file
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        // Install this Tracing subscriber as global default
        .init();
    Ok(())
}
