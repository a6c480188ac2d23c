use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use mmconsole::config::fetch_config;
use mmconsole::console::Console;
use mmconsole::event::{Event, Message};
use mmconsole::session::{SessionStore, open_backend};
use mmconsole::tls::load_ca_config;
use mmconsole::tui::{
    Action, Tui, handle_key, render, restore_terminal, setup_terminal, spawn_event_reader,
    spawn_tick_timer,
};
use mmconsole::{ConsoleError, Result};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const REDRAW_INTERVAL_MS: u64 = 250;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let app_config = fetch_config()?;
    init_tracing(&app_config.log_file)?;

    let tls_config = app_config
        .server
        .ca_cert
        .as_deref()
        .map(load_ca_config)
        .transpose()?;
    let session = Arc::new(SessionStore::open(open_backend(&app_config.session)?));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut console = Console::new(&app_config.server, session, tls_config, tx.clone())?;

    if !console.resume() {
        let Some(login) = &app_config.login else {
            return Err(ConsoleError::Config(
                "no stored session; set MMCONSOLE_USERNAME and MMCONSOLE_PASSWORD to log in"
                    .to_string(),
            ));
        };
        console.login(&login.username, &login.password).await?;
    }

    let mut terminal = setup_terminal()?;
    spawn_event_reader(tx.clone());
    spawn_tick_timer(tx, REDRAW_INTERVAL_MS);

    let result = run(&mut terminal, &mut console, &mut rx).await;
    restore_terminal(&mut terminal)?;
    if let Err(e) = &result {
        error!(error = %e, "Console exited with an error");
    }
    result
}

/// Writes logs to a file so they never land on the terminal UI.
fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run(
    terminal: &mut Tui,
    console: &mut Console,
    rx: &mut mpsc::UnboundedReceiver<Message>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, console.view(), console.poll_interval()))?;

        let Some(message) = rx.recv().await else {
            return Ok(());
        };
        let key = match message {
            Message::Input(Event::Key(key)) => key,
            Message::Input(_) => continue,
            update @ Message::Update { .. } => {
                console.handle(update);
                continue;
            }
        };

        let Some(action) = handle_key(key) else {
            continue;
        };
        match action {
            Action::Quit => return Ok(()),
            Action::Logout => {
                console.logout();
                info!("Exiting after logout");
                return Ok(());
            }
            Action::StartEngine | Action::StopEngine | Action::Refresh => {
                let Some(dispatcher) = console.dispatcher() else {
                    continue;
                };
                tokio::spawn(async move {
                    match action {
                        Action::StartEngine => {
                            let _ = dispatcher.start().await;
                        }
                        Action::StopEngine => {
                            let _ = dispatcher.stop().await;
                        }
                        _ => dispatcher.refresh().await,
                    }
                });
            }
        }
    }
}
