//! Plain-text peal files turned into ringing schedules.
//!
//! The format is one row per line, one digit per bell, with optional
//! `# key: value` metadata lines:
//!
//! ```text
//! # title: Plain Bob Doubles
//! # tags: bob, doubles
//! # stage: 5
//! 12345
//! 21354
//! 23145
//! ```
//!
//! Rows are one-based unless any row contains `0`, in which case every row
//! is read as zero-based.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use tracing::warn;

use crate::engine::ringing::{RingingSchedule, StrikeEvent};
use crate::error::{EngineError, Result};

/// Consonant ratios stacked by octave to tune the bells.
pub const PENTATONIC_RATIOS: [f32; 9] = [
    1.0,
    9.0 / 8.0,
    5.0 / 4.0,
    3.0 / 2.0,
    5.0 / 3.0,
    2.0,
    9.0 / 4.0,
    5.0 / 2.0,
    3.0,
];

/// Pitch of zero-based bell `index` over `base` Hz.
pub fn bell_frequency(index: usize, base: f32) -> f32 {
    let octave = (index / PENTATONIC_RATIOS.len()) as i32;
    base * PENTATONIC_RATIOS[index % PENTATONIC_RATIOS.len()] * 2f32.powi(octave)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PealMetadata {
    pub title: Option<String>,
    /// File name the peal was read from.
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub comment: Option<String>,
    pub stage: Option<usize>,
    pub rows: Option<usize>,
    /// Row length to how many rows have it.
    pub length_histogram: BTreeMap<usize, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Peal {
    pub title: String,
    pub stage: usize,
    /// Zero-based bell indices, one row per change.
    pub rows: Vec<Vec<usize>>,
    /// Whether the source numbered bells from 0.
    pub zero_based: bool,
    pub metadata: PealMetadata,
}

/// What a peal contains, without its rows.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PealSummary {
    pub title: String,
    pub source: Option<String>,
    pub rows: usize,
    pub stage: usize,
    pub length_histogram: BTreeMap<usize, usize>,
    pub comment: Option<String>,
    pub tags: Vec<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PealTiming {
    /// Pitch of the treble (bell 0) in Hz.
    pub base_frequency: f32,
    /// Seconds between consecutive strikes.
    pub strike_interval: f64,
    /// Extra pause after every second row.
    pub handstroke_gap: f64,
    pub strike_duration: f32,
    pub attack: f32,
    pub release: f32,
}

impl Default for PealTiming {
    fn default() -> Self {
        Self {
            base_frequency: 220.0,
            strike_interval: 0.3,
            handstroke_gap: 0.0,
            strike_duration: 0.3,
            attack: 0.005,
            release: 0.6,
        }
    }
}

impl Peal {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut peal = Self::parse(&text)?;
        peal.metadata.source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        if peal.metadata.title.is_none() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                peal.title = title_from_stem(stem);
            }
        }
        Ok(peal)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut metadata = PealMetadata::default();
        let mut raw_rows: Vec<Vec<u32>> = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                read_metadata(&mut metadata, comment.trim());
                continue;
            }
            let digits: Option<Vec<u32>> = line
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_digit(10))
                .collect();
            match digits {
                Some(row) if !row.is_empty() => raw_rows.push(row),
                _ => warn!(line = number + 1, row = line, "skipping invalid peal row"),
            }
        }

        if raw_rows.is_empty() {
            return Err(EngineError::InvalidPeal("no rows found".into()));
        }

        for row in &raw_rows {
            *metadata.length_histogram.entry(row.len()).or_default() += 1;
        }
        let zero_based = raw_rows.iter().flatten().any(|bell| *bell == 0);
        let rows: Vec<Vec<usize>> = raw_rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|bell| (if zero_based { bell } else { bell - 1 }) as usize)
                    .collect()
            })
            .collect();

        let stage = metadata
            .stage
            .unwrap_or_else(|| most_common_len(&metadata.length_histogram));
        Ok(Self {
            title: metadata
                .title
                .clone()
                .unwrap_or_else(|| "Untitled peal".to_string()),
            stage,
            rows,
            zero_based,
            metadata,
        })
    }

    pub fn summary(&self) -> PealSummary {
        PealSummary {
            title: self.title.clone(),
            source: self.metadata.source.clone(),
            rows: self.rows.len(),
            stage: self.stage,
            length_histogram: self.metadata.length_histogram.clone(),
            comment: self.metadata.comment.clone(),
            tags: self.metadata.tags.clone(),
        }
    }

    /// Header, numbered rows in their original numbering, then the row
    /// length histogram.
    pub fn to_plain_text(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Peal: {}", self.title);
        let source = self.metadata.source.as_deref().unwrap_or("-");
        let _ = writeln!(text, "Source file: {source}");
        let _ = writeln!(text, "Rows: {}", self.rows.len());
        let _ = writeln!(text, "Stage: {}", self.stage);
        if !self.metadata.tags.is_empty() {
            let _ = writeln!(text, "Tags: {}", self.metadata.tags.join(", "));
        }
        if let Some(comment) = &self.metadata.comment {
            text.push_str("Comment:\n");
            for line in comment.lines() {
                let _ = writeln!(text, "  {line}");
            }
        }
        text.push('\n');

        let first = usize::from(!self.zero_based);
        let width = self.rows.len().to_string().len();
        for (index, row) in self.rows.iter().enumerate() {
            let bells: String = row.iter().map(|bell| (bell + first).to_string()).collect();
            let _ = writeln!(text, "{:>width$} | {bells}", index + 1);
        }

        if !self.metadata.length_histogram.is_empty() {
            text.push_str("\nRow length histogram:\n");
            for (len, count) in &self.metadata.length_histogram {
                let _ = writeln!(text, "  {len}: {count}");
            }
        }
        text
    }

    /// Strike every row in order; the first strike of a row leads it.
    /// Bells outside the stage are skipped.
    pub fn to_schedule(&self, timing: &PealTiming) -> RingingSchedule {
        let interval = timing.strike_interval.max(1e-3);
        let gap = timing.handstroke_gap.max(0.0);
        let mut events = Vec::new();
        let mut time = 0.0;

        for (index, row) in self.rows.iter().enumerate() {
            let mut lead = true;
            for &bell in row {
                if bell >= self.stage {
                    warn!(bell, stage = self.stage, "bell outside stage");
                    time += interval;
                    continue;
                }
                events.push(StrikeEvent {
                    time,
                    bell,
                    frequency: bell_frequency(bell, timing.base_frequency),
                    is_row_lead: lead,
                });
                lead = false;
                time += interval;
            }
            if index % 2 == 1 {
                time += gap;
            }
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("title".to_string(), self.title.clone());
        metadata.insert("rows".to_string(), self.rows.len().to_string());
        metadata.insert("stage".to_string(), self.stage.to_string());
        if let Some(source) = &self.metadata.source {
            metadata.insert("source".to_string(), source.clone());
        }
        if !self.metadata.length_histogram.is_empty() {
            let histogram: Vec<String> = self
                .metadata
                .length_histogram
                .iter()
                .map(|(len, count)| format!("{len}:{count}"))
                .collect();
            metadata.insert("length_histogram".to_string(), histogram.join(", "));
        }
        if !self.metadata.tags.is_empty() {
            metadata.insert("tags".to_string(), self.metadata.tags.join(", "));
        }
        if let Some(comment) = &self.metadata.comment {
            metadata.insert("comment".to_string(), comment.clone());
        }

        RingingSchedule {
            stage: self.stage,
            events,
            strike_duration: timing.strike_duration,
            attack: timing.attack,
            release: timing.release,
            metadata,
        }
    }
}

fn read_metadata(metadata: &mut PealMetadata, comment: &str) {
    if comment.is_empty() {
        return;
    }
    let Some((key, value)) = comment.split_once(':') else {
        append_comment(metadata, comment);
        return;
    };
    let value = value.trim();
    match key.trim().to_ascii_lowercase().as_str() {
        "title" => metadata.title = Some(value.to_string()),
        "tag" | "tags" => {
            for tag in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                if !metadata.tags.iter().any(|t| t == tag) {
                    metadata.tags.push(tag.to_string());
                }
            }
        }
        "note" | "comment" => append_comment(metadata, value),
        "stage" => metadata.stage = value.parse().ok().filter(|s| *s > 0),
        "rows" => metadata.rows = value.parse().ok(),
        _ => append_comment(metadata, comment),
    }
}

fn append_comment(metadata: &mut PealMetadata, text: &str) {
    match &mut metadata.comment {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(text);
        }
        None => metadata.comment = Some(text.to_string()),
    }
}

fn most_common_len(histogram: &BTreeMap<usize, usize>) -> usize {
    // Ties go to the longer row so no bell is dropped.
    histogram
        .iter()
        .max_by_key(|(len, count)| (**count, **len))
        .map(|(len, _)| *len)
        .unwrap_or(0)
}

fn title_from_stem(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN_HUNT: &str = "\
# title: Plain Hunt on Four
# tags: hunt, minimus, hunt
# stage: 4
# rung on handbells

1234
2143
2413
4231
";

    #[test]
    fn parses_metadata_and_rows() {
        let peal = Peal::parse(PLAIN_HUNT).unwrap();
        assert_eq!(peal.title, "Plain Hunt on Four");
        assert_eq!(peal.stage, 4);
        assert_eq!(peal.metadata.tags, vec!["hunt", "minimus"]);
        assert_eq!(peal.metadata.comment.as_deref(), Some("rung on handbells"));
        assert_eq!(peal.rows[1], vec![1, 0, 3, 2]);
    }

    #[test]
    fn zero_makes_rows_zero_based() {
        let peal = Peal::parse("0123\n1032\n").unwrap();
        assert_eq!(peal.rows[0], vec![0, 1, 2, 3]);
    }

    #[test]
    fn stage_defaults_to_most_common_length() {
        let peal = Peal::parse("12345\n21354\n123\n").unwrap();
        assert_eq!(peal.stage, 5);
    }

    #[test]
    fn invalid_rows_are_skipped() {
        let peal = Peal::parse("1234\nxx12\n2143\n").unwrap();
        assert_eq!(peal.rows.len(), 2);
    }

    #[test]
    fn empty_peal_is_an_error() {
        assert!(matches!(
            Peal::parse("# title: nothing\n\n"),
            Err(EngineError::InvalidPeal(_))
        ));
    }

    #[test]
    fn schedule_marks_row_leads() {
        let peal = Peal::parse(PLAIN_HUNT).unwrap();
        let schedule = peal.to_schedule(&PealTiming::default());
        assert_eq!(schedule.events.len(), 16);
        let leads: Vec<usize> = schedule
            .events
            .iter()
            .filter(|e| e.is_row_lead)
            .map(|e| e.bell)
            .collect();
        assert_eq!(leads, vec![0, 1, 1, 3]);
        assert!((schedule.events[5].time - 1.5).abs() < 1e-9);
        assert_eq!(schedule.metadata["title"], "Plain Hunt on Four");
    }

    #[test]
    fn summary_counts_row_lengths() {
        let peal = Peal::parse("12345\n21354\n123\n").unwrap();
        let summary = peal.summary();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.stage, 5);
        assert_eq!(summary.length_histogram, BTreeMap::from([(3, 1), (5, 2)]));
        assert_eq!(summary.source, None);

        let schedule = peal.to_schedule(&PealTiming::default());
        assert_eq!(schedule.metadata["length_histogram"], "3:1, 5:2");
        assert_eq!(schedule.metadata["stage"], "5");
    }

    #[test]
    fn plain_text_lists_numbered_rows() {
        let mut peal = Peal::parse(PLAIN_HUNT).unwrap();
        peal.metadata.source = Some("plain_hunt.txt".into());
        let text = peal.to_plain_text();
        let expected = "\
Peal: Plain Hunt on Four
Source file: plain_hunt.txt
Rows: 4
Stage: 4
Tags: hunt, minimus
Comment:
  rung on handbells

1 | 1234
2 | 2143
3 | 2413
4 | 4231

Row length histogram:
  4: 4
";
        assert_eq!(text, expected);
    }

    #[test]
    fn plain_text_keeps_zero_based_numbering() {
        let rows: String = (0..10).map(|_| "0123\n").collect();
        let text = Peal::parse(&rows).unwrap().to_plain_text();
        assert!(text.contains("\n 1 | 0123\n"));
        assert!(text.contains("\n10 | 0123\n"));
    }

    #[test]
    fn bell_frequencies_stack_by_octave() {
        assert_eq!(bell_frequency(0, 220.0), 220.0);
        assert_eq!(bell_frequency(3, 220.0), 330.0);
        assert_eq!(bell_frequency(9, 220.0), 440.0);
    }

    #[test]
    fn title_from_file_stem() {
        assert_eq!(title_from_stem("plain_bob-doubles"), "Plain Bob Doubles");
    }
}
