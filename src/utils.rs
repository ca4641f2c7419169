//! Text helpers shared by the formatter and the Telegram transport.
//!
//! Model output arrives as loose Markdown; Telegram accepts a small HTML
//! subset. Patterns are compiled lazily through `lazy_regex!`.

// lazy_regex! relies on once_cell statics
#![allow(clippy::non_std_lazy_statics)]

use anyhow::Result;
use lazy_regex::lazy_regex;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;
use uuid::Uuid;

/// Fenced blocks or inline spans, whose content is escaped when rendered
static RE_CODE_SPANS: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"```[\s\S]*?```|`[^`\n]+?`");

static RE_FENCED_LANG: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"```(\w+)?\n?([\s\S]*?)```");

/// Markdown headings (`## Identification`) become bold lines
static RE_HEADING: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?m)^#{1,6}\s+(.+)$");

static RE_BULLET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?m)^[*-] ");

static RE_BOLD: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*\*(.+?)\*\*");

static RE_ITALIC: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*([^*\n]+?)\*");

static RE_INLINE_CODE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"`([^`\n]+?)`");

static RE_EXTRA_NEWLINES: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\n{3,}");

/// Tags Telegram's HTML parse mode understands
const TELEGRAM_TAGS: &[&str] = &[
    "b", "i", "u", "s", "code", "pre", "a", "/b", "/i", "/u", "/s", "/code", "/pre", "/a",
];

/// Escape `<` and `>` unless they delimit a Telegram-supported tag.
fn escape_brackets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut inside_tag = false;

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let mut name = String::new();
                if let Some(slash) = chars.next_if_eq(&'/') {
                    name.push(slash);
                }
                while let Some(ch) = chars.next_if(char::is_ascii_alphanumeric) {
                    name.push(ch);
                }

                if TELEGRAM_TAGS.contains(&name.as_str()) {
                    out.push('<');
                    inside_tag = true;
                } else {
                    out.push_str("&lt;");
                }
                out.push_str(&name);
            }
            '>' if inside_tag => {
                out.push('>');
                inside_tag = false;
            }
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes stray angle brackets while leaving code and Telegram tags alone.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::utils::clean_html;
/// let cleaned = clean_html("Depth < 20cm is typical for <b>coins</b>");
/// assert_eq!(cleaned, "Depth &lt; 20cm is typical for <b>coins</b>");
/// ```
#[must_use]
pub fn clean_html(text: &str) -> String {
    // Random placeholders so user text can never collide with them
    let mut spans: Vec<(String, &str)> = Vec::new();
    let mut masked = String::with_capacity(text.len());
    let mut last = 0;
    for m in RE_CODE_SPANS.find_iter(text) {
        masked.push_str(&text[last..m.start()]);
        let placeholder = format!("__CODE_{}__", Uuid::new_v4().as_simple());
        masked.push_str(&placeholder);
        spans.push((placeholder, m.as_str()));
        last = m.end();
    }
    masked.push_str(&text[last..]);

    let mut escaped = escape_brackets(&masked);
    for (placeholder, block) in spans {
        escaped = escaped.replace(&placeholder, block);
    }
    escaped
}

/// Renders model Markdown as Telegram HTML.
///
/// Handles fenced and inline code, headings, bullets, bold and italic, and
/// collapses runs of blank lines. The result is trimmed.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::utils::format_text;
/// let html = format_text("## Identification\n**Likely** a *Roman* `denarius`");
/// assert_eq!(html, "<b>Identification</b>\n<b>Likely</b> a <i>Roman</i> <code>denarius</code>");
/// ```
#[must_use]
pub fn format_text(text: &str) -> String {
    let cleaned = clean_html(text);

    let html = RE_FENCED_LANG.replace_all(&cleaned, |caps: &regex::Captures| {
        let lang = caps.get(1).map_or("", |m| m.as_str());
        let code = html_escape::encode_text(caps.get(2).map_or("", |m| m.as_str()).trim());
        if lang.is_empty() {
            format!("<pre>{code}</pre>")
        } else {
            format!("<pre><code class=\"language-{lang}\">{code}</code></pre>")
        }
    });
    let html = RE_HEADING.replace_all(&html, "<b>$1</b>");
    let html = RE_BULLET.replace_all(&html, "• ");
    let html = RE_BOLD.replace_all(&html, "<b>$1</b>");
    let html = RE_ITALIC.replace_all(&html, "<i>$1</i>");
    let html = RE_INLINE_CODE.replace_all(&html, |caps: &regex::Captures| {
        format!(
            "<code>{}</code>",
            html_escape::encode_text(caps.get(1).map_or("", |m| m.as_str()))
        )
    });
    let html = RE_EXTRA_NEWLINES.replace_all(&html, "\n\n");

    html.trim().to_string()
}

/// Strips the tags produced by [`format_text`] and decodes entities.
///
/// Used when Telegram rejects a message's HTML and it is re-sent as plain text.
#[must_use]
pub fn strip_html(html: &str) -> String {
    static RE_TAG: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"</?[a-z]+(?:\s[^>]*)?>");
    html_escape::decode_html_entities(&RE_TAG.replace_all(html, "")).into_owned()
}

/// Truncates to at most `max_chars` characters without splitting UTF-8.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::utils::truncate_str;
/// assert_eq!(truncate_str("Золото", 3), "Зол");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Bot API rejections that will fail the same way on every attempt
const PERMANENT_ERROR_MARKERS: &[&str] = &["Bad Request", "Forbidden", "Unauthorized"];

/// True if retrying `err` cannot help
#[must_use]
pub fn is_permanent_telegram_error(err: &anyhow::Error) -> bool {
    let text = err.to_string();
    PERMANENT_ERROR_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}

/// Retries a Telegram API call with jittered exponential backoff.
///
/// Intended for idempotent calls such as `get_file`, file downloads and
/// message sends. Permanent rejections (see [`is_permanent_telegram_error`])
/// are returned immediately. Delays start at `TELEGRAM_API_INITIAL_BACKOFF_MS`
/// and are capped at `TELEGRAM_API_MAX_BACKOFF_MS`.
///
/// # Errors
///
/// Returns the last error once `TELEGRAM_API_MAX_RETRIES` retries are spent,
/// or the first permanent error.
///
/// # Examples
///
/// ```no_run
/// use treasure_hunter_bot::utils::retry_telegram_operation;
///
/// # async fn example() -> anyhow::Result<()> {
/// let bytes: Vec<u8> = retry_telegram_operation(|| async { Ok(vec![0xFF, 0xD8]) }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    RetryIf::spawn(strategy, operation, |e: &anyhow::Error| {
        !is_permanent_telegram_error(e)
    })
    .await
    .inspect_err(|e| {
        warn!(
            retries = TELEGRAM_API_MAX_RETRIES,
            error = %e,
            "Telegram API operation failed"
        );
    })
}
