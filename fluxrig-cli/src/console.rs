//! Console Front End
//!
//! Colored rendering of store events and the blocking operator prompt.

use chrono::{DateTime, Local, Utc};
use colored::*;
use fluxrig_core::{AbortFlag, Ui, Verdict, display_value};
use fluxrig_report::{BundleEvent, Reporter, ResultEvent};
use std::io::{BufRead, Write};

const TIME_FORMAT: &str = "%d %B %Y %H:%M:%S";

/// How a verdict changed relative to the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First run, or same verdict as before
    Unchanged,
    /// Was not passing, passes now
    Fixed,
    /// Was passing, does not pass now
    Broke,
    /// Changed between two non-passing verdicts
    Changed,
}

impl Transition {
    /// Classify `old -> new`
    pub fn of(old: Option<Verdict>, new: Verdict) -> Self {
        match old {
            None => Transition::Unchanged,
            Some(old) if old == new => Transition::Unchanged,
            Some(_) if new.is_pass() => Transition::Fixed,
            Some(old) if old.is_pass() => Transition::Broke,
            Some(_) => Transition::Changed,
        }
    }
}

fn paint_verdict(verdict: Verdict) -> ColoredString {
    let text = format!("{:>7}", verdict);
    match verdict {
        Verdict::NotApplicable => text.blue(),
        Verdict::Aborted => text.yellow(),
        Verdict::Fail => text.red(),
        Verdict::Pass => text.green(),
    }
}

fn paint_label(label: &str, transition: Transition) -> ColoredString {
    let text = format!("{:>50}", label);
    match transition {
        Transition::Unchanged => text.bold(),
        Transition::Fixed => text.green(),
        Transition::Broke => text.red(),
        Transition::Changed => text.yellow(),
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// One console line for a recorded outcome
pub fn format_result(event: &ResultEvent) -> String {
    let transition = Transition::of(event.previous_verdict(), event.verdict);

    let mut line = format!(
        "[{}] {}:  {}",
        stamp(event.timestamp),
        paint_label(&event.label, transition),
        paint_verdict(event.verdict)
    );
    if let Some(old) = event.previous_verdict() {
        line.push_str(&format!(" ({:>7})", old));
        if let Some(delta) = event.delta {
            line.push_str(&format!(" [{:+.6}]", delta));
        }
    }
    if let Some(reason) = &event.reason {
        line.push_str(&format!(" ({})", reason));
    }
    if let Some(value) = display_value(&event.value) {
        line.push_str(&format!(" ({})", value));
    }
    line
}

/// One console line for an entered bundle
pub fn format_bundle(event: &BundleEvent) -> String {
    format!(
        "[{}] Bundle {}:  {}",
        stamp(event.timestamp),
        format!("{:>50}", format!("{}/{}", event.path, event.name)).blue(),
        event.description
    )
}

/// Reporter printing colored lines to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn output_progress(&mut self, message: &str) {
        println!("{}", message);
    }

    fn enter_bundle(&mut self, event: &BundleEvent) {
        println!("{}", format_bundle(event));
    }

    fn record_result(&mut self, event: &ResultEvent) {
        println!("{}", format_result(event));
    }
}

/// Whether an operator answer confirms the question (`s`kip and `c`ancel do not)
pub fn is_confirmation(answer: &str) -> bool {
    !matches!(answer.trim(), "s" | "c")
}

/// Blocking terminal prompt
#[derive(Debug, Clone)]
pub struct ConsoleUi {
    abort: AbortFlag,
}

impl ConsoleUi {
    /// Prompt that refuses every question once `abort` is raised
    pub fn new(abort: AbortFlag) -> Self {
        Self { abort }
    }
}

impl Ui for ConsoleUi {
    fn ask(&mut self, text: &str) -> bool {
        if self.abort.is_raised() {
            println!("Abort ui '{}'", text);
            return false;
        }

        drain_stdin();
        println!(" ");
        println!("~~~~~~~~~~~~~~~~~~~~~~~~~~~");
        print!("{} ", text);
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        let read = std::io::stdin().lock().read_line(&mut answer);
        println!("~~~~~~~~~~~~~~~~~~~~~~~~~~~");
        println!(" ");

        match read {
            Ok(0) | Err(_) => false,
            Ok(_) => !self.abort.is_raised() && is_confirmation(&answer),
        }
    }
}

/// Discard keystrokes typed before the prompt appeared
#[cfg(unix)]
fn drain_stdin() {
    let mut pollfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    let mut buf = [0u8; 4096];
    loop {
        let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };
        if ready <= 0 || pollfd.revents & libc::POLLIN == 0 {
            break;
        }
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        if n <= 0 {
            break;
        }
    }
}

#[cfg(not(unix))]
fn drain_stdin() {}
