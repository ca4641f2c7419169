//! Splitting responses into Telegram-sized chunks
//!
//! Chunks are contiguous slices of the input, so joining them gives back the
//! original text byte for byte. Sizes are counted in UTF-16 code units, the
//! unit Telegram measures message length in; an astral emoji counts as two.
//! Each break is placed at the latest "natural"
//! boundary inside the size window: paragraph, line, sentence, then any
//! whitespace. A word is only cut when it alone exceeds the window, and even
//! then grapheme clusters stay intact.

use crate::config::TELEGRAM_MESSAGE_LIMIT;
use crate::utils::format_text;
use unicode_segmentation::UnicodeSegmentation;

/// Preferred break sequences, strongest first
const SOFT_BREAKS: &[&str] = &["\n\n", "\n", ". "];

/// Lazy, restartable iterator over message-sized slices of a text
///
/// Cloning the iterator restarts from the clone's position, so a fresh
/// [`chunks`] call or a clone taken up front replays the whole sequence.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
    limit: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let cut = split_point(self.rest, self.limit);
        let (head, tail) = self.rest.split_at(cut);
        self.rest = tail;
        Some(head)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Split `text` into slices of at most `limit` UTF-16 code units.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::formatter::chunks;
///
/// let text = "First paragraph.\n\nSecond paragraph.";
/// let parts: Vec<&str> = chunks(text, 20).collect();
/// assert_eq!(parts, vec!["First paragraph.\n\n", "Second paragraph."]);
/// assert_eq!(parts.concat(), text);
/// ```
#[must_use]
pub fn chunks(text: &str, limit: usize) -> Chunks<'_> {
    Chunks {
        rest: text,
        limit: limit.max(1),
    }
}

/// Split `text` with the Telegram message limit.
#[must_use]
pub fn format(text: &str) -> Chunks<'_> {
    chunks(text, TELEGRAM_MESSAGE_LIMIT)
}

/// Split and render each chunk as Telegram HTML, dropping blank chunks.
///
/// Splitting happens on the raw text first so that formatting tags are
/// always opened and closed within the same message.
#[must_use]
pub fn to_html_messages(text: &str, limit: usize) -> Vec<String> {
    chunks(text, limit)
        .filter(|chunk| !chunk.trim().is_empty())
        .map(format_text)
        .collect()
}

/// Byte offset at which the next chunk of `text` ends.
fn split_point(text: &str, limit: usize) -> usize {
    let Some(window_end) = window_end(text, limit) else {
        return text.len();
    };
    let window = &text[..window_end];

    // Soft breaks only count in the second half, to avoid tiny chunks
    let min_end = window.len() / 2;
    for sep in SOFT_BREAKS {
        if let Some(pos) = window.rfind(sep) {
            let end = pos + sep.len();
            if end > min_end {
                return end;
            }
        }
    }

    if let Some((pos, ch)) = window.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        return pos + ch.len_utf8();
    }

    // A single run longer than the window: cut at a grapheme boundary
    let grapheme_end = text
        .grapheme_indices(true)
        .map(|(idx, g)| idx + g.len())
        .take_while(|end| *end <= window_end)
        .last()
        .unwrap_or(0);

    if grapheme_end > 0 {
        grapheme_end
    } else {
        window_end
    }
}

/// Byte offset of the longest prefix that fits in `limit` UTF-16 units, or
/// `None` if the whole text fits.
///
/// Never returns zero: a first character wider than the limit is taken whole.
fn window_end(text: &str, limit: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > limit {
            return Some(if idx == 0 { ch.len_utf8() } else { idx });
        }
    }
    None
}

/// Length of `text` as Telegram counts it.
#[must_use]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}
