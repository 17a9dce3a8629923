//! Raw terminal input on fd 0.

use log::warn;
use nix::errno::Errno;
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use std::io;

const STDIN_FILENO: i32 = 0;

/// Keeps the terminal in non-canonical, no-echo mode until dropped.
///
/// ISIG is cleared as well, so Ctrl-C reaches the editor as a byte instead of
/// a signal while a line is being edited.
pub struct RawMode {
    original: Termios,
}

impl RawMode {
    pub fn enable() -> nix::Result<Self> {
        let stdin = io::stdin();
        let original = termios::tcgetattr(&stdin)?;
        let mut raw = original.clone();
        raw.local_flags
            .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;
        Ok(Self { original })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.original) {
            warn!("Failed to restore terminal mode: {}", err);
        }
    }
}

/// Blocks for the next byte on stdin. `None` at end of input.
pub fn read_byte() -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match nix::unistd::read(STDIN_FILENO, &mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
