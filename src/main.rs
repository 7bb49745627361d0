use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{Event as TermEvent, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    env,
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

mod app;
mod config;
mod dialog;
mod dispatch;
mod error;
mod git;
mod git_ops;
mod keymap;
mod layout;
mod pane;
mod parse;
mod patch_cache;
mod ui;

use app::{App, Event};
use config::Config;
use dispatch::{Dispatcher, Executor, Limits};
use error::StartupError;
use git::{GitRunner, Timeouts};
use patch_cache::PatchCache;

#[derive(Parser, Debug)]
#[command(name = "gitzen", version, about = "A terminal UI for everyday git work")]
struct Cli {
    /// Path to the git repository (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    repo: Option<PathBuf>,

    /// Remove the installed gitzen executable
    #[arg(long)]
    uninstall: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Use an alternate config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Everything the event loop needs once the environment checks pass.
struct Session {
    repo_root: PathBuf,
    config: Config,
}

fn init_logging(debug: bool) {
    let Some(path) = config::log_file_path() else {
        return;
    };
    if let Some(parent) = path.parent()
        && fs::create_dir_all(parent).is_err()
    {
        return;
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let default_filter = if debug { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn uninstall() -> ExitCode {
    let exec_path = match env::current_exe() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: could not find executable path: {e}");
            return ExitCode::from(1);
        }
    };
    let real_path = fs::canonicalize(&exec_path).unwrap_or(exec_path);

    println!("Uninstalling gitzen from {}", real_path.display());
    match fs::remove_file(&real_path) {
        Ok(()) => {
            println!("GitZen has been uninstalled successfully!");
            ExitCode::SUCCESS
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            eprintln!("Permission denied. Try: sudo gitzen --uninstall");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("Error: could not remove {}: {e}", real_path.display());
            ExitCode::from(1)
        }
    }
}

async fn start(cli: &Cli) -> Result<Session, StartupError> {
    let check_timeout = Timeouts::default().short;

    git::locate_git(check_timeout).await.map_err(|e| {
        if e.is_not_found() {
            log::error!("no git executable on PATH");
        } else {
            log::error!("git is not runnable: {e}");
        }
        StartupError::GitNotFound
    })?;

    let start_path = match &cli.repo {
        Some(p) => p.clone(),
        None => env::current_dir()?,
    };
    let repo_root = git::detect_repo_root(&start_path, check_timeout).await.map_err(|e| {
        log::info!("{} is not a repository: {e}", start_path.display());
        StartupError::NotARepository
    })?;

    let config = Config::load(cli.config.as_deref())?;
    Ok(Session { repo_root, config })
}

fn repo_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string())
}

async fn run_tui(session: Session) -> anyhow::Result<()> {
    let Session { repo_root, config } = session;
    log::info!("opening {}", repo_root.display());

    let gateway = Arc::new(GitRunner::new(repo_root.clone()));
    let executor = Executor::new(
        gateway,
        Limits::from_config(&config),
        PatchCache::new(config.patch_cache_capacity),
    );
    let (dispatcher, mut outcomes) = Dispatcher::new(executor);
    let mut app = App::new(repo_name(&repo_root), &config);

    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("entering alternate screen");
    }
    let backend = CrosstermBackend::new(stdout);
    let result = match Terminal::new(backend) {
        Ok(mut terminal) => {
            let result = event_loop(&mut terminal, &mut app, &dispatcher, &mut outcomes).await;
            let _ = terminal.show_cursor();
            result
        }
        Err(e) => Err(e).context("creating terminal"),
    };

    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    log::info!("exiting");
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    dispatcher: &Dispatcher,
    outcomes: &mut tokio::sync::mpsc::Receiver<dispatch::Outcome>,
) -> anyhow::Result<()> {
    let size = terminal.size().context("reading terminal size")?;
    dispatcher.dispatch_all(app.update(Event::Resize {
        width: size.width,
        height: size.height,
    }));
    dispatcher.dispatch_all(app.initial_operations());

    let mut event_stream = EventStream::new();

    loop {
        app.maybe_expire_status();
        terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;
        if app.should_quit {
            return Ok(());
        }

        let poll_timeout = tokio::time::sleep(Duration::from_millis(100));
        tokio::pin!(poll_timeout);

        tokio::select! {
            Some(outcome) = outcomes.recv() => {
                dispatcher.dispatch_all(app.update(Event::Outcome(outcome)));
            }
            maybe_event = event_stream.next() => match maybe_event {
                Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                    dispatcher.dispatch_all(app.update(Event::Key(key)));
                }
                Some(Ok(TermEvent::Resize(width, height))) => {
                    dispatcher.dispatch_all(app.update(Event::Resize { width, height }));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("reading terminal events"),
                None => return Ok(()),
            },
            _ = &mut poll_timeout => {}
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_logging(cli.debug);

    if cli.uninstall {
        return uninstall();
    }

    let session = match start(&cli).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("gitzen: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match run_tui(session).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("gitzen: {e:#}");
            ExitCode::from(1)
        }
    }
}
