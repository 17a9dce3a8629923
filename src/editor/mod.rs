//! Interactive line editing.
//!
//! [`LineEditor`] is a byte-at-a-time state machine: the REPL reads one byte
//! from the raw terminal, feeds it in and acts on the returned [`Action`].
//! It never touches the terminal itself, so it is driven directly in tests.

pub mod terminal;

use crate::history::SharedHistory;
use crate::utils::visible_width;
use log::debug;
use std::sync::PoisonError;

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;

/// Where the editor is inside a (possibly partial) escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Escape,
    EscapeBracket { digit: Option<u8> },
    /// Inside a sequence the editor does not handle, waiting for its final byte
    EscapeParams,
}

/// Parameter and intermediate bytes of a CSI sequence.
fn is_csi_param(byte: u8) -> bool {
    (0x20..=0x3f).contains(&byte)
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing visible changed
    Continue,
    /// Buffer or cursor changed; redisplay with [`LineEditor::render`]
    Redraw,
    /// Enter was pressed; the line has been handed to the history
    Commit(String),
    /// Ctrl-D on an empty line
    Eof,
    /// Ctrl-C; the buffer was abandoned
    Interrupted,
}

/// The history as the editor sees it.
pub trait HistoryView {
    /// Commands most recent first.
    fn snapshot(&self) -> Vec<String>;
    /// Records a committed line.
    fn commit(&mut self, line: &str);
}

impl HistoryView for SharedHistory {
    fn snapshot(&self) -> Vec<String> {
        let store = self.lock().unwrap_or_else(PoisonError::into_inner);
        store.recent(store.len()).map(String::from).collect()
    }

    fn commit(&mut self, line: &str) {
        let directory = std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        let mut store = self.lock().unwrap_or_else(PoisonError::into_inner);
        let command = line.trim();
        if let Some(evicted) = store.add_or_touch(command, &directory) {
            debug!("Evicted history entry: {}", evicted.command);
        }
        if let Some(item) = store.get(command) {
            debug!("history: {:?} used {} times", item.command, item.usage_count);
        }
    }
}

/// Walk through a snapshot of the history started by the first Up.
struct Navigation {
    entries: Vec<String>,
    index: usize,
    /// What the user was typing before navigation started
    scratch: String,
}

pub struct LineEditor {
    buf: String,
    cursor: usize,
    mode: Mode,
    nav: Option<Navigation>,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            cursor: 0,
            mode: Mode::Normal,
            nav: None,
        }
    }

    pub fn feed<H: HistoryView + ?Sized>(&mut self, byte: u8, history: &mut H) -> Action {
        match self.mode {
            Mode::Normal => self.feed_normal(byte, history),
            Mode::Escape => {
                self.mode = if byte == b'[' {
                    Mode::EscapeBracket { digit: None }
                } else {
                    Mode::Normal
                };
                Action::Continue
            }
            Mode::EscapeBracket { digit: None } => {
                self.mode = Mode::Normal;
                match byte {
                    b'A' => self.history_up(history),
                    b'B' => self.history_down(),
                    b'C' => self.move_right(),
                    b'D' => self.move_left(),
                    b'0'..=b'9' => {
                        self.mode = Mode::EscapeBracket { digit: Some(byte) };
                        Action::Continue
                    }
                    b if is_csi_param(b) => {
                        self.mode = Mode::EscapeParams;
                        Action::Continue
                    }
                    _ => Action::Continue,
                }
            }
            Mode::EscapeBracket { digit: Some(digit) } => {
                self.mode = Mode::Normal;
                match byte {
                    b'~' if digit == b'3' => self.delete_forward(),
                    b if is_csi_param(b) => {
                        self.mode = Mode::EscapeParams;
                        Action::Continue
                    }
                    _ => Action::Continue,
                }
            }
            Mode::EscapeParams => {
                // The final byte (0x40..=0x7e), or anything malformed, ends it
                if !is_csi_param(byte) {
                    self.mode = Mode::Normal;
                }
                Action::Continue
            }
        }
    }

    fn feed_normal<H: HistoryView + ?Sized>(&mut self, byte: u8, history: &mut H) -> Action {
        match byte {
            ESC => {
                self.mode = Mode::Escape;
                Action::Continue
            }
            b'\n' | b'\r' => {
                let line = std::mem::take(&mut self.buf);
                self.cursor = 0;
                self.nav = None;
                history.commit(&line);
                Action::Commit(line)
            }
            DEL | BACKSPACE => {
                if self.cursor == 0 {
                    return Action::Continue;
                }
                self.cursor -= 1;
                self.buf.remove(self.cursor);
                Action::Redraw
            }
            CTRL_D if self.buf.is_empty() => Action::Eof,
            CTRL_C => self.interrupt(),
            0x20..=0x7e => {
                self.buf.insert(self.cursor, byte as char);
                self.cursor += 1;
                Action::Redraw
            }
            _ => Action::Continue,
        }
    }

    /// Abandons the current buffer and any navigation in progress.
    pub fn interrupt(&mut self) -> Action {
        self.buf.clear();
        self.cursor = 0;
        self.mode = Mode::Normal;
        self.nav = None;
        Action::Interrupted
    }

    fn history_up<H: HistoryView + ?Sized>(&mut self, history: &H) -> Action {
        match &mut self.nav {
            None => {
                let entries = history.snapshot();
                if entries.is_empty() {
                    return Action::Continue;
                }
                let scratch = std::mem::take(&mut self.buf);
                self.nav = Some(Navigation {
                    entries,
                    index: 0,
                    scratch,
                });
            }
            Some(nav) if nav.index + 1 < nav.entries.len() => nav.index += 1,
            Some(_) => return Action::Continue,
        }
        self.load_current();
        Action::Redraw
    }

    fn history_down(&mut self) -> Action {
        let Some(nav) = &mut self.nav else {
            return Action::Continue;
        };
        if nav.index == 0 {
            let scratch = std::mem::take(&mut nav.scratch);
            self.nav = None;
            self.set_buffer(scratch);
        } else {
            nav.index -= 1;
            self.load_current();
        }
        Action::Redraw
    }

    fn load_current(&mut self) {
        if let Some(entry) = self.nav.as_ref().and_then(|nav| nav.entries.get(nav.index)) {
            let entry = entry.clone();
            self.set_buffer(entry);
        }
    }

    fn set_buffer(&mut self, text: String) {
        self.buf = text;
        self.cursor = self.buf.len();
    }

    fn move_left(&mut self) -> Action {
        if self.cursor == 0 {
            return Action::Continue;
        }
        self.cursor -= 1;
        Action::Redraw
    }

    fn move_right(&mut self) -> Action {
        if self.cursor >= self.buf.len() {
            return Action::Continue;
        }
        self.cursor += 1;
        Action::Redraw
    }

    fn delete_forward(&mut self) -> Action {
        if self.cursor >= self.buf.len() {
            return Action::Continue;
        }
        self.buf.remove(self.cursor);
        Action::Redraw
    }

    /// Terminal bytes that clear the line, redraw prompt and buffer, and
    /// park the cursor at its logical position.
    pub fn render(&self, prompt: &str) -> String {
        let col = visible_width(prompt) + self.cursor;
        let mut out = format!("\x1b[2K\r{}{}\r", prompt, self.buf);
        if col > 0 {
            out.push_str(&format!("\x1b[{}C", col));
        }
        out
    }
}
