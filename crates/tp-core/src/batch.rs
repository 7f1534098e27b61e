//! Non-interactive runs: send one request, report progress on stderr, print
//! the itinerary on stdout, and exit.

use std::future::Future;
use std::io::{IsTerminal, Write};
use std::time::{Duration, Instant};

use tp_backend::{ChatClient, StreamHandler, TransportError};
use tp_protocol::{EventKind, SessionId, StreamEvent};
use tracing::warn;

use crate::display::{ItineraryView, ViewStatus};

const SUMMARY_CHARS: usize = 60;

/// Encapsulates all stderr formatting for a run.
///
/// TTY output overwrites a single receiving line between persistent lines.
/// Non-TTY output uses plain text with one line per event and no ANSI codes.
pub struct BatchOutput<W: Write> {
    writer: W,
    is_tty: bool,
    start_time: Instant,
    request_summary: String,
    receiving: bool,
    term_width: usize,
}

impl<W: Write> BatchOutput<W> {
    pub fn new(writer: W, is_tty: bool, request: &str) -> Self {
        let term_width = if is_tty {
            std::env::var("COLUMNS")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(80)
        } else {
            80
        };

        // Prompts are multi-line; summarise the first line only.
        let first_line = request.lines().next().unwrap_or_default().trim();
        let summary: String = first_line.chars().take(SUMMARY_CHARS).collect();
        let request_summary = if first_line.chars().count() > SUMMARY_CHARS {
            format!("{summary}...")
        } else {
            summary
        };

        Self {
            writer,
            is_tty,
            start_time: Instant::now(),
            request_summary,
            receiving: false,
            term_width,
        }
    }

    fn prefix(&self) -> &'static str {
        "[tp]"
    }

    /// Prefix with dim cyan color for TTY mode.
    fn colored_prefix(&self) -> String {
        if self.is_tty {
            format!("\x1b[2m\x1b[36m{}\x1b[0m", self.prefix())
        } else {
            self.prefix().to_string()
        }
    }

    /// First line of `s`, cut to fit the terminal after the prefix.
    fn truncate_to_width(&self, s: &str) -> String {
        let line = s.trim().lines().next().unwrap_or_default();
        let max_content = self.term_width.saturating_sub(self.prefix().len() + 1);
        if line.chars().count() > max_content && max_content > 3 {
            let mut truncated: String = line.chars().take(max_content - 3).collect();
            truncated.push_str("...");
            truncated
        } else {
            line.to_string()
        }
    }

    /// Clear a pending receiving line so the next line persists cleanly.
    fn line_start(&self) -> &'static str {
        if self.is_tty {
            "\r\x1b[K"
        } else {
            ""
        }
    }

    /// Emit the start boundary line (persists).
    pub fn emit_start(&mut self) {
        if self.is_tty {
            let _ = writeln!(
                self.writer,
                "{} \x1b[36m---\x1b[0m \"{}\"",
                self.colored_prefix(),
                self.request_summary
            );
        } else {
            let _ = writeln!(
                self.writer,
                "{} --- \"{}\"",
                self.prefix(),
                self.request_summary
            );
        }
    }

    /// Emit tool activity (persists, dim).
    pub fn emit_tool(&mut self, content: &str) {
        let shown = self.truncate_to_width(content);
        if shown.is_empty() {
            return;
        }
        if self.is_tty {
            let _ = writeln!(
                self.writer,
                "{}{} \x1b[2m{}\x1b[0m",
                self.line_start(),
                self.colored_prefix(),
                shown,
            );
        } else {
            let _ = writeln!(self.writer, "{} {}", self.prefix(), shown);
        }
    }

    /// Emit a receiving indicator (overwritten in TTY mode, once otherwise).
    pub fn emit_receiving(&mut self, chars: usize) {
        if self.is_tty {
            let _ = write!(
                self.writer,
                "\r\x1b[K{} \x1b[2mreceiving itinerary ({chars} chars)\x1b[0m",
                self.colored_prefix(),
            );
            let _ = self.writer.flush();
        } else if !self.receiving {
            let _ = writeln!(self.writer, "{} receiving itinerary...", self.prefix());
        }
        self.receiving = true;
    }

    /// Emit an error reported inside the stream (persists, yellow).
    pub fn emit_warning(&mut self, msg: &str) {
        let shown = self.truncate_to_width(msg);
        if self.is_tty {
            let _ = writeln!(
                self.writer,
                "{}{} \x1b[33mwarning: {}\x1b[0m",
                self.line_start(),
                self.colored_prefix(),
                shown,
            );
        } else {
            let _ = writeln!(self.writer, "{} warning: {}", self.prefix(), shown);
        }
    }

    /// Emit an error (persists, red).
    pub fn emit_error(&mut self, msg: &str) {
        if self.is_tty {
            let _ = writeln!(
                self.writer,
                "{}{} \x1b[31merror: {}\x1b[0m",
                self.line_start(),
                self.colored_prefix(),
                msg,
            );
        } else {
            let _ = writeln!(self.writer, "{} error: {}", self.prefix(), msg);
        }
    }

    /// Emit a plain message meant for the user (persists).
    pub fn emit_message(&mut self, msg: &str) {
        let _ = writeln!(self.writer, "{}{}", self.line_start(), msg);
    }

    /// Emit the done boundary line (persists).
    pub fn emit_done(&mut self, events: Option<usize>) {
        let elapsed = self.start_time.elapsed().as_secs();
        let detail = match events {
            Some(n) => format!("{elapsed}s, {n} events"),
            None => format!("{elapsed}s"),
        };
        if self.is_tty {
            let _ = writeln!(
                self.writer,
                "\r\x1b[K{} \x1b[36m---\x1b[0m \x1b[2mdone ({detail})\x1b[0m",
                self.colored_prefix(),
            );
        } else {
            let _ = writeln!(self.writer, "{} --- done ({detail})", self.prefix());
        }
    }
}

/// Options shared by every run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Give up on a streamed answer after this long.
    pub deadline: Option<Duration>,
    /// Report tool activity and status lines.
    pub show_progress: bool,
}

/// Handler for one streamed run: keeps the view and reports progress.
pub struct BatchRun<W: Write> {
    pub view: ItineraryView,
    output: BatchOutput<W>,
    show_progress: bool,
    events: usize,
}

impl<W: Write> BatchRun<W> {
    pub fn new(output: BatchOutput<W>, show_progress: bool) -> Self {
        Self {
            view: ItineraryView::new(),
            output,
            show_progress,
            events: 0,
        }
    }

    pub fn start(&mut self) {
        if self.show_progress {
            self.output.emit_start();
        }
    }

    /// Settle the run and write the itinerary to `stdout`. Returns the exit
    /// code. `finished` is false when the deadline cut the stream short.
    pub fn finish(&mut self, finished: bool, stdout: &mut impl Write) -> i32 {
        if !finished {
            self.view.on_deadline();
            self.output.emit_error("timed out waiting for the itinerary");
        }

        match self.view.status {
            ViewStatus::Done => {
                if self.show_progress {
                    self.output.emit_done(Some(self.events));
                }
                write_answer(stdout, self.view.text())
            }
            _ => {
                self.output.emit_message(self.view.text());
                1
            }
        }
    }
}

impl<W: Write> StreamHandler for BatchRun<W> {
    fn on_event(&mut self, event: &StreamEvent) {
        self.events += 1;
        self.view.on_event(event);
        if !self.show_progress {
            return;
        }
        match event.kind {
            EventKind::ToolCall | EventKind::ToolResult => self.output.emit_tool(&event.content),
            EventKind::Token => self.output.emit_receiving(self.view.text().chars().count()),
            EventKind::Final => {}
            EventKind::Error => self.output.emit_warning(&event.content),
        }
    }

    fn on_complete(&mut self, final_text: String) {
        self.view.on_complete(final_text);
    }

    fn on_error(&mut self, error: TransportError) {
        self.output.emit_error(&error.to_string());
        self.view.on_error(error);
    }
}

fn write_answer(stdout: &mut impl Write, text: &str) -> i32 {
    let written = writeln!(stdout, "{}", text.trim_end()).and_then(|()| stdout.flush());
    match written {
        Ok(()) => 0,
        Err(e) => {
            warn!(error = %e, "failed to write itinerary");
            1
        }
    }
}

/// Run `fut` to completion, or until `deadline` passes. Returns whether it
/// completed. An expired future is dropped, which closes its stream.
pub async fn within_deadline<F>(deadline: Option<Duration>, fut: F) -> bool
where
    F: Future<Output = ()>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.is_ok(),
        None => {
            fut.await;
            true
        }
    }
}

/// Stream an answer for `prompt` and print it. Returns the exit code.
pub async fn run_streaming(
    client: &ChatClient,
    session: &SessionId,
    prompt: &str,
    options: &RunOptions,
) -> i32 {
    let is_tty = std::io::stderr().is_terminal();
    let output = BatchOutput::new(std::io::stderr(), is_tty, prompt);
    let mut run = BatchRun::new(output, options.show_progress);

    run.start();
    let finished = within_deadline(
        options.deadline,
        client.stream_chat(session, prompt, &mut run),
    )
    .await;
    run.finish(finished, &mut std::io::stdout())
}

/// Ask for the whole answer in one response and print it. Returns the exit
/// code.
pub async fn run_blocking(
    client: &ChatClient,
    session: &SessionId,
    prompt: &str,
    options: &RunOptions,
) -> i32 {
    let is_tty = std::io::stderr().is_terminal();
    let mut output = BatchOutput::new(std::io::stderr(), is_tty, prompt);
    if options.show_progress {
        output.emit_start();
    }

    match client.send_chat_message(session, prompt).await {
        Ok(response) => {
            if options.show_progress {
                output.emit_done(None);
            }
            write_answer(&mut std::io::stdout(), &response.response)
        }
        Err(e) => {
            output.emit_error(&e.to_string());
            output.emit_message(crate::display::RETRY_MESSAGE);
            1
        }
    }
}
