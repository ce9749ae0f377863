//! Helpers for keeping feedback text out of places it doesn't belong.
//!
//! Span fields only get a fingerprint or a short preview of a text, never
//! the full comment. Prompt rendering neutralizes chat-template control
//! tokens so a comment cannot impersonate the system or user turn.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default number of characters kept by [`preview`].
pub const PREVIEW_CHARS: usize = 48;

/// Short deterministic hash of a text for correlating log lines.
pub fn text_fingerprint(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// First `max_chars` characters of `text` with whitespace collapsed, plus
/// an ellipsis when truncated. Never splits a UTF-8 character.
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Break up chat-template control tokens (ChatML, Llama `[INST]`, `<<SYS>>`)
/// inside user-supplied text.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}
