mod app;
mod audit;
mod blog_json;
mod catalog;
mod config;
mod dom;
mod error;
mod filter;
mod frontmatter;
mod loader;
mod markup;
mod modal;
mod render;
mod router;
mod scheduler;
mod session;
mod ui;
mod watcher;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use app::App;
use catalog::ArticleCatalog;
use clap::{Parser, Subcommand};
use config::SiteConfig;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use loader::ContentLoader;
use session::{FileSession, MemorySession, SessionStore};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;

/// Terminal front end for a personal site: pages, filterable sections and
/// an article reader
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a site.toml (defaults to the user config dir, then the built-in site)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL or directory articles are read from (overrides the config)
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// Named session to persist the active page in
    #[arg(long, global = true)]
    session: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the site in the terminal (default)
    Browse,
    /// Load one article and print it
    Open {
        /// Article slug
        slug: String,
        /// Print the stripped markdown instead of HTML
        #[arg(long)]
        markdown: bool,
    },
    /// Print the page markup after activating a page and filter
    Snapshot {
        /// Page to activate
        #[arg(short, long)]
        page: Option<String>,
        /// Category to filter that page's section by
        #[arg(short = 'f', long)]
        category: Option<String>,
    },
    /// Print the article catalog as JSON
    Catalog,
    /// Write a .json record next to every markdown file in a directory
    BlogJson {
        /// Directory holding the markdown files
        #[arg(short, long, default_value = "blog")]
        dir: PathBuf,
        /// File name pattern
        #[arg(long, default_value = blog_json::DEFAULT_PATTERN)]
        pattern: String,
    },
    /// Compare article metadata blocks against the catalog
    Audit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Browse);
    init_tracing(cli.verbose, matches!(command, Commands::Browse))?;

    let mut config = match SiteConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(1);
        }
    };
    if let Some(source) = cli.source {
        config.article_base = source;
    }
    let catalog = ArticleCatalog::builtin();

    match command {
        Commands::Browse => {
            let loader = loader_for(&config)?;
            let session = open_session(cli.session.as_deref())?;
            let mut app = App::new(config, catalog, loader, session)?;

            // Init terminal
            let mut terminal = ratatui::init();
            execute!(std::io::stdout(), EnableMouseCapture)?;

            // Main loop
            let result = run_app(&mut terminal, &mut app).await;
            app.shutdown();

            // Restore terminal
            let _ = execute!(std::io::stdout(), DisableMouseCapture);
            ratatui::restore();

            if let Err(e) = result {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Open { slug, markdown } => {
            let Some(meta) = catalog.find(&slug) else {
                eprintln!("Error: no article called '{}'", slug);
                std::process::exit(1);
            };
            let loader = loader_for(&config)?;
            match loader.open(meta).await {
                loader::LoadOutcome::Rendered(article) if markdown => println!("{}", article.markdown),
                outcome => {
                    let failed = !outcome.is_rendered();
                    println!("{}", outcome.body_html());
                    if failed {
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Snapshot { page, category } => {
            let loader = loader_for(&config)?;
            let mut app = App::new(config, catalog, loader, Box::new(MemorySession::new()))?;
            if let Some(page) = page {
                app.navigate(&page);
            }
            if let Some(category) = category {
                let section = filter::FilterController::active_section(&app.doc, app.current_page())?;
                app.filters.select_control(&mut app.doc, &section, &category)?;
            }
            println!("{}", app.doc.to_html(app.doc.root()));
        }
        Commands::Catalog => {
            println!("{}", serde_json::to_string_pretty(catalog.list())?);
        }
        Commands::BlogJson { dir, pattern } => {
            let report = blog_json::export_dir(&dir, &pattern, true)?;
            if report.total == 0 {
                eprintln!("No files matching {} in {}", pattern, dir.display());
                return Ok(());
            }
            for (path, reason) in &report.failures {
                eprintln!("✗ {}: {}", path.display(), reason);
            }
            eprintln!(
                "Conversion complete: {}/{} files converted successfully.",
                report.converted(),
                report.total
            );
        }
        Commands::Audit => {
            let source = loader::source_for(&config.article_base)?;
            let results = audit::audit(&catalog, source.as_ref()).await;
            let mut dirty = 0;
            for result in &results {
                if result.is_clean() {
                    println!("✓ {}", result.slug);
                    continue;
                }
                dirty += 1;
                for finding in &result.findings {
                    println!("✗ {}: {}", result.slug, finding);
                }
            }
            eprintln!("{}/{} articles agree with the catalog", results.len() - dirty, results.len());
        }
    }

    Ok(())
}

/// Log to stderr, or to a file in the cache dir while the TUI owns the terminal.
fn init_tracing(verbose: bool, tui: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into())
    };

    if !tui {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(());
    }

    let Some(dir) = SiteConfig::cache_dir() else {
        // No cache dir, so logging stays off.
        return Ok(());
    };
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("sitedeck.log"))?;
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn loader_for(config: &SiteConfig) -> Result<ContentLoader, error::SiteError> {
    Ok(ContentLoader::new(
        loader::source_for(&config.article_base)?,
        config.render.engine(),
    ))
}

fn open_session(name: Option<&str>) -> Result<Box<dyn SessionStore>, Box<dyn std::error::Error>> {
    let Some(name) = name else {
        return Ok(Box::new(MemorySession::new()));
    };
    let dir = SiteConfig::cache_dir().ok_or("Could not determine home directory")?;
    let session = FileSession::open(&dir, name)?;
    info!("Using session {}", session.path().display());
    Ok(Box::new(session))
}

async fn run_app(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.poll_loads();
        app.run_deferred(Instant::now());
        terminal.draw(|frame| ui::render(app, frame))?;

        if app.should_quit {
            return Ok(());
        }

        // Poll for events with a 250ms timeout
        if crossterm::event::poll(Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    handle_key(app, key);
                }
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    handle_mouse(app, mouse, ratatui::layout::Rect::new(0, 0, size.width, size.height));
                }
                _ => {}
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Help toggle (global)
    if key.code == KeyCode::Char('?') {
        app.show_help = !app.show_help;
        return;
    }

    // If help is showing, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.modal.is_open() {
        handle_reader_key(app, key);
    } else if app.loader.is_busy() {
        if key.code == KeyCode::Esc {
            app.cancel_load();
        }
    } else if app.dropdown_open() {
        handle_dropdown_key(app, key);
    } else {
        handle_page_key(app, key);
    }
}

fn handle_reader_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.scroll_reader(1),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_reader(-1),
        KeyCode::PageDown => app.scroll_reader(10),
        KeyCode::PageUp => app.scroll_reader(-10),
        code => {
            app.dispatch_key(code);
        }
    }
}

fn handle_dropdown_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => app.dropdown_move(1),
        KeyCode::Up | KeyCode::Char('k') => app.dropdown_move(-1),
        KeyCode::Enter => app.dropdown_choose(),
        KeyCode::Esc | KeyCode::Char('c') => app.close_dropdown(),
        _ => {}
    }
}

fn handle_page_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => app.next_page(),
        KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => app.prev_page(),
        KeyCode::Char(c @ '1'..='9') => {
            app.goto_page(c as usize - '1' as usize);
        }
        KeyCode::Backspace => app.back(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::PageDown => app.scroll_page(5),
        KeyCode::PageUp => app.scroll_page(-5),
        KeyCode::Char('f') => app.cycle_filter(true),
        KeyCode::Char('F') => app.cycle_filter(false),
        KeyCode::Char('c') => app.toggle_dropdown(),
        KeyCode::Char('s') => app.toggle_sidebar(),
        KeyCode::Enter => app.open_selected(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent, area: ratatui::layout::Rect) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {}
        MouseEventKind::ScrollDown if app.modal.is_open() => {
            app.scroll_reader(3);
            return;
        }
        MouseEventKind::ScrollUp if app.modal.is_open() => {
            app.scroll_reader(-3);
            return;
        }
        _ => return,
    }

    if app.modal.is_open() {
        app.modal_click(ui::modal_hit(area, mouse.column, mouse.row));
    } else if let Some(page) = ui::nav_hit(app, area, mouse.column, mouse.row) {
        app.navigate(&page);
    } else {
        debug!("Unhandled click at {},{}", mouse.column, mouse.row);
    }
}
