// Terminal output for matrix commands
// All progress lines go to stderr; reports go to stdout

use matrix_service::Status;

const RESET: &str = "\x1b[0m";

/// ANSI colour used for a status symbol
fn palette(status: Status) -> &'static str {
    match status {
        Status::Pass => "\x1b[1;32m",
        Status::Fail => "\x1b[1;31m",
        Status::Running => "\x1b[36m",
        Status::Partial => "\x1b[33m",
        Status::Untested | Status::Skipped => "\x1b[2m",
    }
}

/// Right-aligned action word followed by a message, e.g. `     Running local.native`
pub fn step(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}{} {}", action, RESET, message);
}

/// A line prefixed with the coloured symbol of `status`
pub fn outcome(status: Status, message: &str) {
    eprintln!("{}  {}{} {}", palette(status), status.symbol(), RESET, message);
}

pub fn banner(message: &str) {
    eprintln!("\x1b[1m==> {}{}", message, RESET);
}

pub fn note(message: &str) {
    eprintln!("\x1b[36m  i{} {}", RESET, message);
}

pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !{} {}", RESET, message);
}

pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:{} {}", RESET, message);
}

pub fn muted(message: &str) {
    eprintln!("\x1b[2m{}{}", message, RESET);
}

/// One captured log line of a running leaf, indented under it
pub fn leaf_log(line: &str) {
    eprintln!("\x1b[2m        | {}{}", line, RESET);
}
