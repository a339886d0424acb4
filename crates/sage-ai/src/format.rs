//! Markdown-ish fragment formatting
//!
//! Each streamed delta is turned into a small piece of HTML markup by an
//! ordered list of regex rules. Order matters: bold must consume `**` spans
//! before italic sees single asterisks, and header rules run from the
//! shortest `#` prefix to the longest.
//!
//! Input is HTML-escaped before any rule runs, so the only tags that can
//! appear in the output are the ones generated here.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Which part of a fragment a rule operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Ordinary text outside fenced code blocks
    Text,
    /// The raw text of one fenced code block, backticks included
    Fence,
}

#[derive(Clone, Copy)]
enum Replacement {
    Template(&'static str),
    With(fn(&Captures<'_>) -> String),
}

/// One substitution in the formatting pipeline
pub struct Rule {
    pub name: &'static str,
    pub scope: Scope,
    pattern: Regex,
    replacement: Replacement,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl Rule {
    fn new(name: &'static str, scope: Scope, pattern: &str, replacement: Replacement) -> Self {
        Self {
            name,
            scope,
            // Patterns are literals in this file and covered by tests.
            pattern: Regex::new(pattern).unwrap(),
            replacement,
        }
    }

    /// Apply this rule alone to already-escaped text
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self.replacement {
            Replacement::Template(template) => self.pattern.replace_all(text, template),
            Replacement::With(f) => self.pattern.replace_all(text, f),
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use Replacement::{Template, With};
    use Scope::{Fence, Text};

    vec![
        Rule::new("bold", Text, r"\*\*(.+?)\*\*", Template("<strong>${1}</strong>")),
        // Opening asterisk must touch a word so "* item" bullets survive.
        Rule::new(
            "italic",
            Text,
            r"\*([^\s*](?:[^*\n]*[^\s*])?)\*",
            Template("<em>${1}</em>"),
        ),
        Rule::new("inline-code", Text, r"`([^`\n]+)`", Template("<code>${1}</code>")),
        Rule::new(
            "fenced-code",
            Fence,
            r"(?s)\A```[^\n]*\n(.*?)```\z",
            Template("<pre><code>${1}</code></pre>"),
        ),
        Rule::new("ordered-item", Text, r"(?m)^\d+\.[ \t]+(.*)$", Template("<li>${1}</li>")),
        Rule::new("unordered-item", Text, r"(?m)^[-*][ \t]+(.*)$", Template("<li>${1}</li>")),
        Rule::new("h1", Text, r"(?m)^#[ \t]+(.*)$", Template("<h1>${1}</h1>")),
        Rule::new("h2", Text, r"(?m)^#{2}[ \t]+(.*)$", Template("<h2>${1}</h2>")),
        Rule::new("h3", Text, r"(?m)^#{3}[ \t]+(.*)$", Template("<h3>${1}</h3>")),
        Rule::new("h4", Text, r"(?m)^#{4}[ \t]+(.*)$", Template("<h4>${1}</h4>")),
        Rule::new("h5", Text, r"(?m)^#{5}[ \t]+(.*)$", Template("<h5>${1}</h5>")),
        Rule::new("h6", Text, r"(?m)^#{6}[ \t]+(.*)$", Template("<h6>${1}</h6>")),
        Rule::new("link", Text, r"\[([^\]\n]*)\]\(([^)\s]+)\)", With(render_link)),
        Rule::new("line-break", Text, r"\n", Template("<br/>")),
    ]
});

/// Splits a fragment into text and fenced-code segments
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n.*?```").unwrap());

static ORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\s+").unwrap());
static UNORDERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-*]\s+").unwrap());

/// The formatting pipeline in application order
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// Look up a single rule by name
pub fn rule(name: &str) -> Option<&'static Rule> {
    RULES.iter().find(|r| r.name == name)
}

/// Format one raw text fragment into markup
pub fn format(fragment: &str) -> String {
    let normalized = fragment.replace("\r\n", "\n");
    let escaped = escape_html(&normalized);

    let mut segments: Vec<(Scope, String)> = Vec::new();
    let mut last = 0;
    for m in FENCE.find_iter(&escaped) {
        if m.start() > last {
            segments.push((Scope::Text, escaped[last..m.start()].to_string()));
        }
        segments.push((Scope::Fence, m.as_str().to_string()));
        last = m.end();
    }
    if last < escaped.len() {
        segments.push((Scope::Text, escaped[last..].to_string()));
    }

    for rule in rules() {
        for (scope, text) in segments.iter_mut() {
            if *scope != rule.scope {
                continue;
            }
            let replaced = match rule.apply(text) {
                Cow::Owned(replaced) => Some(replaced),
                Cow::Borrowed(_) => None,
            };
            if let Some(replaced) = replaced {
                *text = replaced;
            }
        }
    }

    segments.into_iter().map(|(_, text)| text).collect()
}

/// Escape characters that would otherwise be interpreted as markup
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_link(caps: &Captures<'_>) -> String {
    let label = &caps[1];
    let target = &caps[2];
    if is_safe_link_target(target) {
        format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            target, label
        )
    } else {
        label.to_string()
    }
}

/// http(s), mailto, or a relative reference without any scheme
fn is_safe_link_target(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
    {
        return true;
    }
    let scheme_end = lower.find(['/', '?', '#']).unwrap_or(lower.len());
    !lower[..scheme_end].contains(':')
}

/// Kind of list container a fragment's leading item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    pub fn open_tag(&self) -> &'static str {
        match self {
            ListKind::Ordered => "<ol>",
            ListKind::Unordered => "<ul>",
        }
    }

    pub fn close_tag(&self) -> &'static str {
        match self {
            ListKind::Ordered => "</ol>",
            ListKind::Unordered => "</ul>",
        }
    }
}

/// Classify a raw (unformatted) fragment by its leading list marker
pub fn list_item_kind(fragment: &str) -> Option<ListKind> {
    if ORDERED_ITEM.is_match(fragment) {
        Some(ListKind::Ordered)
    } else if UNORDERED_ITEM.is_match(fragment) {
        Some(ListKind::Unordered)
    } else {
        None
    }
}
