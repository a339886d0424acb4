//! Line-oriented presentation of chat events

use regex::Regex;
use sage_ai::Turn;
use sage_chat::{ChatEvent, FAILURE_NOTICE, SendOutcome};
use std::borrow::Cow;
use std::future::Future;
use std::io::{self, Write};
use std::sync::LazyLock;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-z][a-z0-9]*(?:\s[^>]*)?/?>").unwrap());

const BOLD: (&str, &str) = ("\x1b[1m", "\x1b[22m");
const ITALIC: (&str, &str) = ("\x1b[3m", "\x1b[23m");

/// Turn formatter markup into terminal text.
///
/// Control characters from the model are dropped first. With `styled` set,
/// bold, italic and headers then become ANSI attributes; otherwise every
/// tag is dropped.
pub fn render(markup: &str, styled: bool) -> String {
    let mut text = strip_controls(markup)
        .replace("</li><br/>", "\n")
        .replace("</li>", "\n")
        .replace("<li>", "• ")
        .replace("<br/>", "\n");

    if styled {
        for (tag, (on, off)) in [
            ("strong", BOLD),
            ("em", ITALIC),
            ("h1", BOLD),
            ("h2", BOLD),
            ("h3", BOLD),
            ("h4", BOLD),
            ("h5", BOLD),
            ("h6", BOLD),
        ] {
            text = text
                .replace(&format!("<{tag}>"), on)
                .replace(&format!("</{tag}>"), off);
        }
    }

    let text = LINK.replace_all(&text, |caps: &regex::Captures| {
        let (href, label) = (&caps[1], &caps[2]);
        if href == label {
            label.to_string()
        } else {
            format!("{label} ({href})")
        }
    });
    let text = TAG.replace_all(&text, "");
    unescape(&text)
}

/// Drop control characters other than newline and tab
pub fn strip_controls(text: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c.is_control() && c != '\n' && c != '\t';
    if text.chars().any(unsafe_char) {
        Cow::Owned(text.chars().filter(|&c| !unsafe_char(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Reverse the formatter's HTML escaping
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Writes streamed replies; diagnostics go to stderr.
///
/// Tracks the markup of the current attempt that has been shown, so a reply
/// whose events were dropped by a lagging receiver is completed from the
/// committed turn.
pub struct Printer<W: Write> {
    out: W,
    styled: bool,
    shown: String,
    in_sync: bool,
}

impl Printer<io::Stdout> {
    pub fn stdout(styled: bool) -> Self {
        Self::new(io::stdout(), styled)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            shown: String::new(),
            in_sync: true,
        }
    }

    pub fn event(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Delta { markup, offset } => {
                if *offset == 0 {
                    if !self.shown.is_empty() {
                        self.write("\n");
                    }
                    self.shown.clear();
                    self.in_sync = true;
                }
                if self.in_sync && *offset == self.shown.len() {
                    let text = render(markup, self.styled);
                    self.write(&text);
                    self.shown.push_str(markup);
                } else {
                    self.in_sync = false;
                }
            }
            ChatEvent::Failed {
                message,
                will_retry,
            } => {
                if !self.shown.is_empty() {
                    self.write("\n");
                }
                self.shown.clear();
                self.in_sync = true;
                eprintln!("\nError: {}", strip_controls(message));
                if !will_retry {
                    self.write(&format!(
                        "{}\n(/retry to resend, /dismiss to clear the error)\n",
                        FAILURE_NOTICE
                    ));
                }
            }
            ChatEvent::RetryScheduled { retry, delay } => {
                eprintln!("[retry {} in {}s]", retry, delay.as_secs_f32());
            }
            ChatEvent::Cleared => {
                self.write("Cleared conversation.\n");
            }
            ChatEvent::TurnCommitted { .. }
            | ChatEvent::StateChanged { .. }
            | ChatEvent::RequestStart { .. } => {}
        }
    }

    /// The receiver dropped `skipped` events
    pub fn lagged(&mut self, skipped: u64) {
        tracing::debug!("Display lagged, {} events skipped", skipped);
        self.in_sync = false;
    }

    /// Show whatever part of the committed turn has not been shown yet
    pub fn finish(&mut self, turn: &Turn) {
        let rest = match turn.content.strip_prefix(self.shown.as_str()) {
            Some(rest) => render(rest, self.styled),
            None => format!("\n{}", render(&turn.content, self.styled)),
        };
        self.write(&rest);
        self.write("\n");
        self.shown.clear();
        self.in_sync = true;
    }

    fn write(&mut self, text: &str) {
        self.out.write_all(text.as_bytes()).ok();
        self.out.flush().ok();
    }
}

/// Run a send or retry while printing its events as they arrive
pub async fn drive<F, W>(
    request: F,
    receiver: &mut broadcast::Receiver<ChatEvent>,
    printer: &mut Printer<W>,
) -> sage_chat::Result<SendOutcome>
where
    F: Future<Output = sage_chat::Result<SendOutcome>>,
    W: Write,
{
    tokio::pin!(request);
    let result = loop {
        tokio::select! {
            result = &mut request => break result,
            event = receiver.recv() => match event {
                Ok(event) => printer.event(&event),
                Err(RecvError::Lagged(skipped)) => printer.lagged(skipped),
                Err(RecvError::Closed) => break (&mut request).await,
            },
        }
    };

    loop {
        match receiver.try_recv() {
            Ok(event) => printer.event(&event),
            Err(TryRecvError::Lagged(skipped)) => printer.lagged(skipped),
            Err(_) => break,
        }
    }
    if let Ok(SendOutcome::Completed(turn)) = &result {
        printer.finish(turn);
    }
    result
}
