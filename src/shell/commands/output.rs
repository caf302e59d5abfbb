//! Stdout helpers for shell commands.
//!
//! Output is often piped into `head` or a pager that exits early; a
//! `BrokenPipe` then ends the command quietly instead of reporting an error.

/// `println!` that returns `Ok(())` from the enclosing function on
/// `BrokenPipe` and propagates any other I/O error.
macro_rules! print_line {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match writeln!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

/// Writes a block of already formatted text with the same `BrokenPipe`
/// handling as [`print_line!`].
macro_rules! print_block {
    ($text:expr) => {{
        use std::io::Write;
        match std::io::stdout().write_all($text.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }};
}

pub(crate) use print_block;
pub(crate) use print_line;
