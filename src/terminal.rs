//! Raw-mode terminal handling and the SIGINT restore path.
//!
//! The LC-3 keyboard trap routines and the memory-mapped keyboard status register
//! both expect standard input to be unbuffered and unechoed. We flip the terminal
//! into that mode once at startup and guarantee it's flipped back on every exit
//! path, including a SIGINT delivered while a trap is blocked in a read.

use nix::sys::select::{select, FdSet};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use nix::sys::time::{TimeVal, TimeValLike};
use std::sync::OnceLock;

static ORIGINAL_TERMIOS: OnceLock<Termios> = OnceLock::new();

/// Saves the current terminal attributes and switches stdin to non-canonical,
/// no-echo mode. Must be paired with [`restore_terminal`] on every exit path.
pub fn configure_terminal() {
    let original = termios::tcgetattr(libc::STDIN_FILENO).unwrap_or_else(|err| {
        println!("failed to read terminal attributes: {}", err);
        std::process::exit(1);
    });

    let mut raw = original.clone();
    raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO);

    termios::tcsetattr(libc::STDIN_FILENO, SetArg::TCSANOW, &raw).unwrap_or_else(|err| {
        println!("failed to configure terminal: {}", err);
        std::process::exit(1);
    });

    // Only the first call wins; configure_terminal is meant to run once at startup.
    let _ = ORIGINAL_TERMIOS.set(original);
}

/// Restores the terminal attributes saved by [`configure_terminal`]. A no-op if
/// the terminal was never configured.
pub fn restore_terminal() {
    if let Some(original) = ORIGINAL_TERMIOS.get() {
        let _ = termios::tcsetattr(libc::STDIN_FILENO, SetArg::TCSANOW, original);
    }
}

/// True when at least one byte is available on stdin without blocking.
pub fn input_ready() -> bool {
    let mut readfds = FdSet::new();
    readfds.insert(libc::STDIN_FILENO);

    match select(None, &mut readfds, None, None, &mut TimeVal::zero()) {
        Ok(n) => n == 1,
        Err(_) => false,
    }
}

/// Installs a SIGINT handler that restores the terminal, emits a trailing
/// newline, and exits with a distinguished status. Runs only async-signal-safe
/// operations: no allocation, no locks (`OnceLock::get` after first write never
/// blocks).
pub fn install_interrupt_handler() {
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_interrupt))
            .expect("failed to install SIGINT handler");
    }
}

extern "C" fn handle_interrupt(_signal: libc::c_int) {
    restore_terminal();
    // write(2), not println!, to stay signal-safe.
    let _ = nix::unistd::write(1, b"\n");
    std::process::exit(-2);
}
