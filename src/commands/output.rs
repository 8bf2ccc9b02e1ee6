//! Stdout helpers for commands whose output is often piped into `head`.
//!
//! A closed pipe ends the command quietly with `Ok(())`; any other write
//! failure is returned to the caller.

/// `println!` that returns `Ok(())` from the enclosing function on BrokenPipe.
macro_rules! print_line {
    ($($arg:tt)*) => {{
        use std::io::Write;
        match writeln!(std::io::stdout(), $($arg)*) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }};
}

/// Raw byte variant of [`print_line!`].
macro_rules! print_bytes {
    ($bytes:expr) => {{
        use std::io::Write;
        match std::io::stdout().write_all($bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }};
}

pub(crate) use print_bytes;
pub(crate) use print_line;
