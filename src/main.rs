use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use topicwatch::ui::{self, Theme};
use topicwatch::{events, App, BusHub, Settings, StreamSource, TopicPanel, TopicSource};

#[derive(Parser, Debug)]
#[command(name = "topicwatch")]
#[command(about = "Terminal monitor for message bus topics")]
struct Args {
    /// Follow a capture file of newline-delimited bus events
    #[arg(short, long, conflicts_with = "connect")]
    file: Option<PathBuf>,

    /// Connect to a TCP endpoint streaming bus events (host:port)
    #[arg(short, long, conflicts_with = "file")]
    connect: Option<String>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of .msg definitions (repeatable)
    #[arg(short, long = "msg-path")]
    msg_path: Vec<PathBuf>,

    /// Refresh interval in milliseconds
    #[arg(short, long)]
    refresh_ms: Option<u64>,

    /// Start monitoring every topic as soon as it appears
    #[arg(long)]
    monitor_all: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let mut settings = Settings::load(args.config.as_deref())?;
    settings.msg_paths.extend(args.msg_path.iter().cloned());
    if let Some(refresh_ms) = args.refresh_ms {
        settings.refresh_ms = refresh_ms;
    }
    if args.monitor_all {
        settings.monitor_on_start = true;
    }

    let types = Arc::new(settings.type_registry()?);
    info!("{} message types known", types.len());

    // Background readers run on this runtime while the TUI owns the main thread
    let rt = tokio::runtime::Runtime::new()?;

    if let Some(ref addr) = args.connect {
        let hub = BusHub::new(types.clone(), settings.hub_options(), addr);
        let source = rt.block_on(async {
            use tokio::net::TcpStream;

            println!("Connecting to {}...", addr);
            match TcpStream::connect(addr).await {
                Ok(stream) => Ok(StreamSource::spawn(stream, hub.clone(), addr)),
                Err(e) => Err(anyhow::anyhow!("Failed to connect to {}: {}", addr, e)),
            }
        })?;
        return run_tui(Box::new(source), hub, settings, types);
    }

    let Some(ref path) = args.file else {
        bail!("Nothing to monitor: pass --file or --connect");
    };
    let hub = BusHub::new(types.clone(), settings.hub_options(), &path.display().to_string());
    let _guard = rt.enter();
    let source = StreamSource::follow_file(path, hub.clone());
    run_tui(Box::new(source), hub, settings, types)
}

/// Send tracing output to `path`; without a path logging stays off, since
/// the terminal belongs to the TUI.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file =
        File::create(path).with_context(|| format!("Cannot create log file {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("topicwatch=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Run the TUI over the given topic source
fn run_tui(
    source: Box<dyn TopicSource>,
    hub: BusHub,
    settings: Settings,
    types: Arc<topicwatch::TypeRegistry>,
) -> Result<()> {
    let panel = TopicPanel::new(source, Box::new(hub), types, settings.panel_options());
    let mut app = App::new(panel, Theme::auto_detect()).with_columns(settings.columns());

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app);

    // Stop monitors before the terminal is handed back
    app.panel.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 8;

    while app.running {
        app.tick(Instant::now());

        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Min(4),    // Topic tree
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::tree_view::render(frame, app, chunks[1]);
            ui::common::render_status_bar(frame, app, chunks[2]);

            if app.context_menu.is_some() {
                // Border and table header sit above the first row
                let row_y = app.selected_row().map_or(chunks[1].y + 2, |row| {
                    let offset = row.saturating_sub(app.table_state.offset());
                    chunks[1].y + 2 + offset as u16
                });
                ui::common::render_context_menu(frame, app, chunks[1], row_y);
            }

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                // Table header sits below the header bar and the block border
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse, 2),
                _ => {}
            }
        }
    }

    Ok(())
}
