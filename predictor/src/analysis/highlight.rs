//! Inline HTML rendering of a sequence with its mutated windows marked.

use serde::{Deserialize, Serialize};

use crate::error::PredictorResult;
use crate::mutation_detection::{marker_for, validate_sequence};
use crate::models::{Mutation, MutationFlags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    /// Every active window in red.
    #[default]
    SingleColour,
    /// m1 red, m2 orange, m3 purple, m4 blue, m5 green.
    PerMutation,
}

impl Palette {
    pub fn colour(self, mutation: Mutation) -> &'static str {
        match (self, mutation) {
            (Palette::SingleColour, _) => "red",
            (Palette::PerMutation, Mutation::M1) => "red",
            (Palette::PerMutation, Mutation::M2) => "orange",
            (Palette::PerMutation, Mutation::M3) => "purple",
            (Palette::PerMutation, Mutation::M4) => "blue",
            (Palette::PerMutation, Mutation::M5) => "green",
        }
    }
}

fn push_escaped(out: &mut String, base: char) {
    match base {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '\'' => out.push_str("&#39;"),
        '"' => out.push_str("&quot;"),
        other => out.push(other),
    }
}

/// Wrap every window of every active marker in a coloured `<span>`.
///
/// Text outside the spans is passed through (HTML-escaped), so removing the
/// markup gives back the input sequence.
pub fn highlight(sequence: &str, flags: &MutationFlags, palette: Palette) -> PredictorResult<String> {
    validate_sequence(sequence)?;

    let mut spans: Vec<(usize, usize, Mutation)> = flags
        .active()
        .flat_map(|m| {
            marker_for(m)
                .windows
                .iter()
                .map(move |w| (w.start, w.end, m))
        })
        .collect();
    spans.sort_by_key(|(start, _, _)| *start);

    let mut out = String::with_capacity(sequence.len() + spans.len() * 32);
    let mut next = spans.iter().peekable();
    let mut open_until: Option<usize> = None;

    for (pos, base) in sequence.chars().enumerate() {
        if open_until == Some(pos) {
            out.push_str("</span>");
            open_until = None;
        }
        if let Some(&&(start, end, m)) = next.peek() {
            if start == pos {
                out.push_str("<span style='color:");
                out.push_str(palette.colour(m));
                out.push_str("'>");
                open_until = Some(end);
                next.next();
            }
        }
        push_escaped(&mut out, base);
    }
    if open_until.is_some() {
        out.push_str("</span>");
    }

    Ok(out)
}
