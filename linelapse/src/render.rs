//! Terminal and JSON output for reconstructed timelapses.

use colored::Colorize;
use linelapse_core::{Disposition, Timelapse};
use serde::Serialize;

/// Text rendering switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    pub color: bool,
    pub line_numbers: bool,
}

/// Renders `timelapse` as text: present lines numbered, deleted lines marked
/// with `-` and shown in red when color is on.
pub fn text(path: &str, timelapse: &Timelapse, style: TextStyle) -> String {
    let mut out = String::new();
    let header = format!(
        "{} ({} lines, {} deleted)",
        path,
        timelapse.present_line_count(),
        timelapse.deleted_line_count()
    );
    out.push_str(&paint(&header, style.color, |s| s.bold().to_string()));
    out.push('\n');

    for run in timelapse.runs() {
        match (run.disposition, run.first_line) {
            (Disposition::Present, Some(first)) => {
                for (offset, line) in run.lines.iter().enumerate() {
                    if style.line_numbers {
                        let number = format!("{:>6}", first + offset);
                        out.push_str(&paint(&number, style.color, |s| s.dimmed().to_string()));
                        out.push_str(" | ");
                    }
                    out.push_str(line);
                    out.push('\n');
                }
            }
            _ => {
                for line in &run.lines {
                    let marked = if style.line_numbers {
                        format!("{:>6} - {}", "", line)
                    } else {
                        format!("- {line}")
                    };
                    out.push_str(&paint(&marked, style.color, |s| s.red().to_string()));
                    out.push('\n');
                }
            }
        }
    }
    out
}

fn paint(s: &str, color: bool, f: impl Fn(&str) -> String) -> String {
    if color {
        f(s)
    } else {
        s.to_owned()
    }
}

/// One file's reconstruction as emitted by `show --format json`.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub path: &'a str,
    pub present_lines: usize,
    pub deleted_lines: usize,
    pub segments: &'a Timelapse,
}

impl<'a> Report<'a> {
    pub fn new(path: &'a str, timelapse: &'a Timelapse) -> Self {
        Self {
            path,
            present_lines: timelapse.present_line_count(),
            deleted_lines: timelapse.deleted_line_count(),
            segments: timelapse,
        }
    }
}

/// Failure entry for a file in `show --format json`.
#[derive(Debug, Serialize)]
pub struct Failure<'a> {
    pub path: &'a str,
    pub error: String,
}
