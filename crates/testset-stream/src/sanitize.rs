// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Terminal output sanitization
//!
//! Test runners colorize their console output and overwrite progress lines
//! with carriage returns. Everything downstream of this module matches on
//! plain text, so each incoming line is cleaned here before any rule sees it.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// CSI sequences (`ESC [ ... cmd`), OSC sequences (`ESC ] ... BEL/ST`), and
/// single-character escapes (`ESC c`).
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][A-B0-2]|\x1b[a-zA-Z<=>]")
        .expect("ANSI pattern is valid")
});

/// Strip ANSI escape sequences from a single line.
///
/// If the line contains carriage returns, only the text after the last one is
/// kept (a runner overwriting a progress bar leaves the final content there).
/// Unmatched text passes through unchanged; this never fails.
#[must_use]
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    let line: Cow<'_, str> = if line.contains('\r') {
        Cow::Owned(line.rsplit('\r').next().unwrap_or("").to_string())
    } else {
        Cow::Borrowed(line)
    };

    match line {
        Cow::Borrowed(s) => ANSI_RE.replace_all(s, ""),
        Cow::Owned(s) => Cow::Owned(ANSI_RE.replace_all(&s, "").into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(strip_ansi("Test set: Foo"), "Test set: Foo");
    }

    #[test]
    fn test_strips_color_codes() {
        assert_eq!(
            strip_ansi("\x1b[31mTest Failed at a.jl:5\x1b[0m"),
            "Test Failed at a.jl:5"
        );
    }

    #[test]
    fn test_strips_cursor_and_mode_sequences() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1Gdone"), "done");
        assert_eq!(strip_ansi("\x1b[?25hvisible"), "visible");
    }

    #[test]
    fn test_strips_osc_title() {
        assert_eq!(strip_ansi("\x1b]0;title\x07text"), "text");
    }

    #[test]
    fn test_keeps_text_after_last_carriage_return() {
        assert_eq!(strip_ansi("Progress 50%\rProgress 100%"), "Progress 100%");
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn test_lone_escape_without_sequence() {
        // A bare ESC followed by ordinary text loses only the escape
        assert_eq!(strip_ansi("\x1bcreset"), "reset");
    }
}
