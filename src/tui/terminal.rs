//! Entering and leaving the full-screen console.

use std::io::{self, IsTerminal, Stdout};

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::Result;
use crate::error::ConsoleError;

/// The terminal the console draws into.
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Takes over stdout: raw key input and a private screen buffer.
///
/// Raw mode is switched back off if a later step fails, so an error here
/// leaves the shell usable.
///
/// # Errors
///
/// [`ConsoleError::Io`] when stdout is redirected or the terminal refuses
/// one of the mode changes.
pub fn setup_terminal() -> Result<Tui> {
    ensure_interactive(io::stdout().is_terminal())?;

    enable_raw_mode().map_err(|e| ConsoleError::Io(format!("cannot read raw keys: {e}")))?;

    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(ConsoleError::Io(format!("cannot open console screen: {e}")));
    }

    Terminal::new(CrosstermBackend::new(stdout)).map_err(|e| {
        let _ = disable_raw_mode();
        ConsoleError::Io(format!("cannot draw to terminal: {e}"))
    })
}

/// Hands the terminal back to the shell with the cursor visible.
///
/// # Errors
///
/// [`ConsoleError::Io`] from any of the teardown writes.
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn ensure_interactive(is_tty: bool) -> Result<()> {
    if is_tty {
        Ok(())
    } else {
        Err(ConsoleError::Io(
            "stdout is not a terminal; run mmconsole interactively".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirected_stdout_is_refused() {
        let err = ensure_interactive(false).unwrap_err();
        assert!(matches!(err, ConsoleError::Io(_)));
        assert!(err.to_string().contains("not a terminal"));
        assert!(ensure_interactive(true).is_ok());
    }
}
