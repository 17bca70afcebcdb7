//! Local terminal: raw mode, size, and a [`TerminalSink`] over stdout.

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, Stdout, Write};
use webterm_client::TerminalSink;
use webterm_core::TermResult;

/// RAII guard that restores the terminal to cooked mode on drop.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Current terminal size as (columns, rows), falling back to 80x24.
pub fn get_terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}

/// Writes session output to stdout.
pub struct StdoutTerminal {
    out: Stdout,
}

impl StdoutTerminal {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }

    fn emit(&mut self, text: &str) -> TermResult<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

impl Default for StdoutTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink for StdoutTerminal {
    fn reset(&mut self, replay: &str) -> TermResult<()> {
        self.out.queue(Clear(ClearType::All))?;
        self.out.queue(Clear(ClearType::Purge))?;
        self.out.queue(MoveTo(0, 0))?;
        self.emit(replay)
    }

    fn write(&mut self, text: &str) -> TermResult<()> {
        self.emit(text)
    }

    fn show_status(&mut self, _status: &str) -> TermResult<()> {
        // The status line was already rendered inline.
        self.out.flush()?;
        Ok(())
    }
}

/// True for the detach key, Ctrl+].
pub fn is_detach_key(event: &KeyEvent) -> bool {
    event.modifiers.contains(KeyModifiers::CONTROL) && event.code == KeyCode::Char(']')
}

/// Convert a crossterm key event to the bytes a shell expects.
pub fn key_event_to_bytes(event: &KeyEvent) -> Option<String> {
    let seq = match event.code {
        KeyCode::Char(c) => {
            if event.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() {
                // Ctrl+A = 0x01 ... Ctrl+Z = 0x1a
                let byte = (c.to_ascii_lowercase() as u8) - b'a' + 1;
                return Some(char::from(byte).to_string());
            }
            let mut text = String::new();
            if event.modifiers.contains(KeyModifiers::ALT) {
                text.push('\x1b');
            }
            text.push(c);
            return Some(text);
        }
        KeyCode::Enter => "\r",
        KeyCode::Backspace => "\x7f",
        KeyCode::Tab => "\t",
        KeyCode::BackTab => "\x1b[Z",
        KeyCode::Esc => "\x1b",
        KeyCode::Up => "\x1b[A",
        KeyCode::Down => "\x1b[B",
        KeyCode::Right => "\x1b[C",
        KeyCode::Left => "\x1b[D",
        KeyCode::Home => "\x1b[H",
        KeyCode::End => "\x1b[F",
        KeyCode::PageUp => "\x1b[5~",
        KeyCode::PageDown => "\x1b[6~",
        KeyCode::Insert => "\x1b[2~",
        KeyCode::Delete => "\x1b[3~",
        KeyCode::F(n) => match n {
            1 => "\x1bOP",
            2 => "\x1bOQ",
            3 => "\x1bOR",
            4 => "\x1bOS",
            5 => "\x1b[15~",
            6 => "\x1b[17~",
            7 => "\x1b[18~",
            8 => "\x1b[19~",
            9 => "\x1b[20~",
            10 => "\x1b[21~",
            11 => "\x1b[23~",
            12 => "\x1b[24~",
            _ => return None,
        },
        _ => return None,
    };
    Some(seq.to_string())
}
