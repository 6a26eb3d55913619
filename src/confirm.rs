//! Overwrite confirmation.
//!
//! The run asks a [`Confirm`] implementation before replacing an existing
//! file and never talks to the terminal itself. The CLI passes a
//! [`TerminalPrompt`] over stdin/stderr, or [`AssumeYes`] for `--yes`.

use std::io::{self, BufRead, Write};

/// Answers a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Accepts everything without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _question: &str) -> bool {
        true
    }
}

/// Parse an answer: `y`/`yes` or `n`/`no`, any case, surrounding blanks ignored.
pub fn parse_answer(answer: &str) -> Option<bool> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

/// Asks on a reader/writer pair until it gets a yes or a no.
///
/// End of input or a read error counts as "no".
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalPrompt<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        loop {
            let _ = write!(self.output, "{question} (y/n) ");
            let _ = self.output.flush();

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    let _ = writeln!(self.output);
                    return false;
                }
                Ok(_) => {}
            }
            match parse_answer(&line) {
                Some(answer) => return answer,
                None => {
                    let _ = writeln!(self.output, "Please answer yes or no.");
                }
            }
        }
    }
}
