// SPDX-License-Identifier: MIT
//! Response normalization: pull a usable code payload out of free-form
//! model output.
//!
//! Extraction is priority-ordered, first match wins:
//!   1. fenced code blocks (longest block wins),
//!   2. a complete declaration with balanced braces,
//!   3. an unterminated declaration, repaired and flagged as truncated,
//!   4. the raw text as-is.
//!
//! `parse` is total — it never errors and never panics, whatever the model
//! produced. Scoring is heuristic: brace balancing is a plain depth counter
//! and can be fooled by braces inside string literals.

use once_cell::sync::Lazy;
use regex::Regex;

// ─── Extraction patterns ──────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+#.-]*[ \t]*\r?\n?(.*?)\r?\n?```").expect("fence regex")
});

static RE_DECL_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?(?:function(?:\s+\w+)?\s*\(|class\s+\w+|interface\s+\w+|enum\s+\w+|(?:const|let|var)\s+\w+\s*=)",
    )
    .expect("declaration regex")
});

// An import with no source string, or a `type X =` with no right-hand side.
static RE_DANGLING_STMT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[ \t]*(?:import\b[^;'"]*|(?:export[ \t]+)?type[ \t]+\w+[ \t]*=?[ \t]*)$"#)
        .expect("dangling statement regex")
});

// ─── Payload ──────────────────────────────────────────────────────────────────

/// Normalized model output. Derived per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPayload {
    /// The extracted code (or the whole raw text in the fallback case).
    pub code: String,
    /// Prose found around the code, or a repair warning when truncated.
    pub explanation: Option<String>,
    /// True when the output was detected as cut off and patched up.
    pub was_truncated: bool,
}

/// Normalize one raw model response.
pub fn parse(raw: &str) -> ParsedPayload {
    if let Some(payload) = extract_fenced(raw) {
        return payload;
    }
    if let Some(payload) = extract_complete_declaration(raw) {
        return payload;
    }
    if let Some(payload) = repair_truncated(raw) {
        return payload;
    }
    ParsedPayload {
        code: raw.trim().to_string(),
        explanation: None,
        was_truncated: false,
    }
}

// ─── Step 1: fenced blocks ────────────────────────────────────────────────────

fn extract_fenced(raw: &str) -> Option<ParsedPayload> {
    let mut best: Option<(std::ops::Range<usize>, &str)> = None;
    for caps in RE_FENCE.captures_iter(raw) {
        let whole = caps.get(0)?;
        let body = caps.get(1)?.as_str();
        if body.trim().is_empty() {
            continue;
        }
        let longer = best
            .as_ref()
            .map(|(_, b)| body.len() > b.len())
            .unwrap_or(true);
        if longer {
            best = Some((whole.range(), body));
        }
    }

    let (range, body) = best?;
    let explanation = join_prose(&raw[..range.start], &raw[range.end..]);
    Some(ParsedPayload {
        code: body.to_string(),
        explanation,
        was_truncated: false,
    })
}

// ─── Step 2: complete declarations ────────────────────────────────────────────

fn extract_complete_declaration(raw: &str) -> Option<ParsedPayload> {
    let mut best: Option<std::ops::Range<usize>> = None;
    for m in RE_DECL_START.find_iter(raw) {
        let Some(open_rel) = raw[m.start()..].find('{') else {
            continue;
        };
        let open = m.start() + open_rel;
        let Some(close) = matching_brace(raw, open) else {
            continue;
        };
        let candidate = m.start()..close + 1;
        let longer = best
            .as_ref()
            .map(|b| candidate.len() > b.len())
            .unwrap_or(true);
        if longer {
            best = Some(candidate);
        }
    }

    let range = best?;
    let explanation = join_prose(&raw[..range.start], &raw[range.end..]);
    Some(ParsedPayload {
        code: raw[range].to_string(),
        explanation,
        was_truncated: false,
    })
}

// ─── Step 3: truncation repair ────────────────────────────────────────────────

fn repair_truncated(raw: &str) -> Option<ParsedPayload> {
    for m in RE_DECL_START.find_iter(raw) {
        let Some(open_rel) = raw[m.start()..].find('{') else {
            continue;
        };
        let open = m.start() + open_rel;
        if matching_brace(raw, open).is_some() {
            continue;
        }

        let depth = unclosed_depth(raw, open);
        let mut code = raw[m.start()..].trim_end().to_string();
        code.push_str("\n  /* truncated */\n");
        code.push_str(&"}".repeat(depth));
        return Some(ParsedPayload {
            code,
            explanation: Some(format!(
                "output looks truncated: {depth} unclosed brace(s) were closed with a placeholder body"
            )),
            was_truncated: true,
        });
    }

    // A statement cut off mid-line at the very end, with nothing to close.
    let last_line = raw.lines().rev().find(|l| !l.trim().is_empty())?;
    if RE_DANGLING_STMT.is_match(last_line) {
        return Some(ParsedPayload {
            code: raw.trim().to_string(),
            explanation: Some("output looks truncated: the final statement is cut off".to_string()),
            was_truncated: true,
        });
    }

    None
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Index of the `}` matching the `{` at `open`, or `None` if it never closes.
/// Byte scan is safe: both braces are ASCII.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth: usize = 0;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// How many braces opened at or after `open` are still unclosed at the end.
fn unclosed_depth(text: &str, open: usize) -> usize {
    let mut depth: usize = 0;
    for b in text.bytes().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

fn join_prose(before: &str, after: &str) -> Option<String> {
    let before = before.trim();
    let after = after.trim();
    let joined = match (before.is_empty(), after.is_empty()) {
        (true, true) => return None,
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (false, false) => format!("{before}\n{after}"),
    };
    Some(joined)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
