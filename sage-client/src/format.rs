//! Answer text normalizer.
//!
//! The service returns free text whose structure survives transport only as
//! ad hoc markers: `-` / `•` bullets (sometimes broken across a rewrap),
//! inline `Label:` segments, `1.` numbered markers, and uneven blank lines.
//! This module reshapes that into consistent markdown-like text for display.
//!
//! The transform is a fixed, ordered pipeline of rewrite passes. Order
//! matters: each pass assumes the normal form produced by the passes before
//! it (for example, bullet splitting assumes whitespace runs are already
//! collapsed). The whole pipeline is idempotent: running it on its own
//! output changes nothing.
//!
//! # Rewrite rules
//!
//! | Input                          | Output                      |
//! |--------------------------------|-----------------------------|
//! | `work • life` (mid-phrase)     | `work-life`                 |
//! | `text - Item`                  | `text` + newline + `- Item` |
//! | `- Label: rest`                | `- **Label:** rest`         |
//! | `• Item` (line start)          | `- Item`                    |
//! | `Header Text:` (bare line)     | `**Header Text:**` + blank  |
//! | `text 1. First 2. Second`      | each marker on its own paragraph |
//! | 3+ consecutive line breaks     | exactly one blank line      |
//! | `**Header:** content`          | content moved to its own line |

use regex::Regex;
use std::sync::LazyLock;

/// Horizontal whitespace runs (never newlines).
static HSPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
/// A space hugging either side of a line break.
static SPACE_AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n ?").unwrap());
/// A bullet glyph dropped into the middle of a hyphenated phrase.
static BROKEN_BULLET_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z]) • ([a-z])").unwrap());
/// Same, with the glyph landing right after a rewrap line break.
static BROKEN_BULLET_WRAPPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])\n• ?([a-z])").unwrap());
/// Bulleted line opening with a `Label:` segment.
static LABELED_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-•] ?([A-Za-z][^:\n*]{0,60}?): (.+)$").unwrap());
/// Bullet marker stranded mid-line.
static INLINE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([^\n]) [-•] ").unwrap());
/// Non-canonical bullet glyph at line start.
static STRAY_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^• ?").unwrap());
/// A line holding nothing but `Header Text:`.
static BARE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([A-Za-z][A-Za-z ]*):$").unwrap());
/// Numbered marker stranded mid-line.
static NUMBERED_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n]) (\d{1,2}\.) ").unwrap());
/// Numbered marker on its own line but glued to the previous paragraph.
static NUMBERED_GLUED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n])\n(\d{1,2}\.) ").unwrap());
/// Three or more consecutive line breaks.
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize raw answer text for display.
///
/// Total over all inputs: never fails, and unrecognized structure passes
/// through untouched. Empty input is returned unchanged.
pub fn format_answer(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = collapse_spacing(raw);
    let text = repair_wrapped_bullets(&text);
    let text = promote_labeled_bullets(&text);
    let text = split_inline_bullets(&text);
    let text = canonicalize_markers(&text);
    let text = isolate_numbered_items(&text);
    let text = promote_bare_headers(&text);
    let text = collapse_blank_runs(&text);
    let text = break_after_bold_header(&text);
    let text = separate_bullet_blocks(&text);
    tighten_bullet_runs(&text)
}

/// Collapse horizontal whitespace runs to a single space and trim the ends.
///
/// Line breaks are a structural signal for the later passes and are kept.
/// Post-condition: no tabs, no double spaces, no space adjacent to a newline.
fn collapse_spacing(text: &str) -> String {
    let text = HSPACE_RUN.replace_all(text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Rejoin hyphenated phrases that a rewrap broke around a bullet glyph
/// (`work • life` or `work` + newline + `• life` becomes `work-life`).
///
/// Case is the discriminator: genuine list items start capitalized or follow
/// a line/label boundary, while rewrap debris sits between lowercase letters.
fn repair_wrapped_bullets(text: &str) -> String {
    let text = BROKEN_BULLET_INLINE.replace_all(text, "${1}-${2}");
    BROKEN_BULLET_WRAPPED.replace_all(&text, "${1}-${2}").to_string()
}

/// Bold the leading `Label:` segment of a bulleted line: `- Label: rest`
/// becomes `- **Label:** rest`, at string start and after any newline.
///
/// Already-bolded labels don't match again, so the pass is stable.
fn promote_labeled_bullets(text: &str) -> String {
    LABELED_BULLET.replace_all(text, "- **${1}:** ${2}").to_string()
}

/// Move bullet markers stranded mid-line onto their own lines, carrying
/// their content up to the next marker, blank line, or end of string.
///
/// Pre-condition: whitespace already collapsed, so a marker is exactly
/// ` - ` or ` • `. Spaced hyphens in prose also match; that is the same
/// trade the rest of the pipeline makes in favor of list recovery.
fn split_inline_bullets(text: &str) -> String {
    INLINE_BULLET.replace_all(text, "${1}\n- ").to_string()
}

/// Rewrite any remaining `•` at a line start to the canonical `- `.
fn canonicalize_markers(text: &str) -> String {
    STRAY_MARKER.replace_all(text, "- ").to_string()
}

/// Force each `1.` / `2.` marker onto its own paragraph by inserting a
/// blank line before it, whether it was stranded mid-line or glued to the
/// previous line.
///
/// Markers are one or two digits followed by `. `; a sentence ending in a
/// bare small number is the known false positive.
fn isolate_numbered_items(text: &str) -> String {
    let text = NUMBERED_INLINE.replace_all(text, "${1}\n\n${2} ");
    NUMBERED_GLUED.replace_all(&text, "${1}\n\n${2} ").to_string()
}

/// Bold a line holding nothing but `Header Text:` (letters and spaces only)
/// and open a blank line after it.
///
/// Runs after numbered-item isolation so a header freed by that split is
/// promoted in the same application.
fn promote_bare_headers(text: &str) -> String {
    BARE_HEADER.replace_all(text, "**${1}:**\n").to_string()
}

/// Collapse three or more consecutive line breaks to exactly two.
fn collapse_blank_runs(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").to_string()
}

/// Push content trailing a line-start `**Header:**` onto its own line.
///
/// Non-bullet content gets a blank line after the header; bullet content
/// moves down one line and the block-separation pass supplies the blank.
/// Lines whose bold segment is not a plain header (nested `*`) are left
/// alone.
fn break_after_bold_header(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let Some(rest) = line.strip_prefix("**") else {
            out.push(line.to_string());
            continue;
        };
        let Some(idx) = rest.find(":** ") else {
            out.push(line.to_string());
            continue;
        };
        let label = &rest[..idx];
        if label.contains('*') {
            out.push(line.to_string());
            continue;
        }

        let content = rest[idx + ":** ".len()..].trim_start();
        out.push(format!("**{label}:**"));
        if content.is_empty() {
            continue;
        }
        if !content.starts_with("- ") {
            out.push(String::new());
        }
        out.push(content.to_string());
    }
    out.join("\n")
}

/// Ensure exactly one blank line separates a bullet block from preceding
/// non-bullet text.
fn separate_bullet_blocks(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("- ") && i > 0 {
            let prev = lines[i - 1];
            if !prev.is_empty() && !prev.starts_with("- ") {
                out.push("");
            }
        }
        out.push(line);
    }
    out.join("\n")
}

/// Final cleanup: drop blank lines between consecutive bullets, drop one
/// leading newline if present, and trim surrounding whitespace.
fn tighten_bullet_runs(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty()
            && i > 0
            && i + 1 < lines.len()
            && lines[i - 1].starts_with("- ")
            && lines[i + 1].starts_with("- ")
        {
            continue;
        }
        out.push(line);
    }

    let joined = out.join("\n");
    let joined = joined.strip_prefix('\n').unwrap_or(&joined);
    joined.trim().to_string()
}
