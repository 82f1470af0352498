//! xLights `.xtiming` timing-track export
//!
//! One track produces a standalone `<timing>` document; several are wrapped
//! in `<timings>`. Labeled marks keep their spans. Onsets become unlabeled
//! effects of a fixed length.

use std::io::{self, Write};

use crate::analysis::result::{BeatTrack, TrackMarks};

const SOURCE_VERSION: &str = "2024.x";

pub const DEFAULT_MARK_MS: u64 = 50;

/// Write `tracks` as xtiming XML. Nothing is written for an empty slice.
pub fn write_xtiming<W: Write>(tracks: &[BeatTrack], mark_ms: u64, out: &mut W) -> io::Result<()> {
    match tracks {
        [] => Ok(()),
        [track] => {
            writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
            writeln!(
                out,
                r#"<timing offset="0" name="{}" SourceVersion="{}">"#,
                escape(&track.name),
                SOURCE_VERSION
            )?;
            write_layer(track, mark_ms, 1, out)?;
            write!(out, "</timing>")
        }
        _ => {
            writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
            writeln!(out, "<timings>")?;
            for track in tracks {
                writeln!(
                    out,
                    r#"  <timing name="{}" SourceVersion="{}">"#,
                    escape(&track.name),
                    SOURCE_VERSION
                )?;
                write_layer(track, mark_ms, 2, out)?;
                writeln!(out, "  </timing>")?;
            }
            write!(out, "</timings>")
        }
    }
}

pub fn to_xtiming_string(tracks: &[BeatTrack], mark_ms: u64) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write_xtiming(tracks, mark_ms, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_layer<W: Write>(track: &BeatTrack, mark_ms: u64, depth: usize, out: &mut W) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    writeln!(out, "{indent}<EffectLayer>")?;
    match &track.marks {
        TrackMarks::Labeled(marks) => {
            for mark in marks {
                write_effect(out, &indent, &mark.label, mark.start_ms, mark.end_ms)?;
            }
        }
        TrackMarks::Onsets(marks) => {
            for mark in marks {
                write_effect(out, &indent, "", mark.time_ms, mark.time_ms + mark_ms)?;
            }
        }
    }
    writeln!(out, "{indent}</EffectLayer>")
}

fn write_effect<W: Write>(out: &mut W, indent: &str, label: &str, start: u64, end: u64) -> io::Result<()> {
    writeln!(
        out,
        r#"{indent}  <Effect label="{}" starttime="{}" endtime="{}"/>"#,
        escape(label),
        start,
        end
    )
}

/// Escape the characters that are unsafe inside a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `Artist_Title_LumaBeat.xtiming`, keeping only ASCII letters and digits.
pub fn export_filename(artist: &str, title: &str) -> String {
    fn clean(s: &str) -> String {
        s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
    format!("{}_{}_LumaBeat.xtiming", clean(artist), clean(title))
}
