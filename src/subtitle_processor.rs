use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @module: Subtitle entry model and SRT handling

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})").unwrap()
});

/// Lifecycle status of a subtitle entry inside a translation job.
///
/// `Translated` and `Fallback` are terminal; `Failed` is terminal for a
/// single dispatch but may be rescheduled by the consistency pass until it
/// resolves to one of the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Not yet picked up by any batch
    Pending,
    /// Part of a dispatched request
    InFlight,
    /// Carries a validated translation
    Translated,
    /// Last attempt failed; reason recorded on the entry
    Failed,
    /// Exhausted its attempts; original text is carried through
    Fallback,
}

impl EntryStatus {
    /// Whether the entry needs no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Translated | Self::Fallback)
    }
}

/// Why an entry entered the `Failed` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The translation dropped a roster-mandated character rendering
    RosterInconsistency,
    /// The dispatch carrying this entry's batch failed
    DispatchFailed,
}

// @struct: Single subtitle entry
#[derive(Debug, Clone)]
pub struct SubtitleEntry {
    // @field: Sequence index, unique and monotonic
    pub index: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Original subtitle text
    pub text: String,

    // @field: Resolved translation, None until the pipeline fills it
    pub translated_text: Option<String>,

    // @field: Pipeline status
    pub status: EntryStatus,

    // @field: Why the last attempt failed, set alongside `Failed` and kept
    // through a later `Fallback`
    pub failure_reason: Option<FailureReason>,
}

impl SubtitleEntry {
    /// Create a new pending subtitle entry
    pub fn new(index: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            index,
            start_time_ms,
            end_time_ms,
            text,
            translated_text: None,
            status: EntryStatus::Pending,
            failure_reason: None,
        }
    }

    // @creates: Validated subtitle entry
    // @validates: Time range and non-empty text
    pub fn new_validated(
        index: usize,
        start_time_ms: u64,
        end_time_ms: u64,
        text: String,
    ) -> Result<Self> {
        if end_time_ms <= start_time_ms {
            return Err(anyhow!(
                "Invalid time range: end time {} <= start time {}",
                end_time_ms,
                start_time_ms
            ));
        }

        let trimmed_text = text.trim();
        if trimmed_text.is_empty() {
            return Err(anyhow!("Empty subtitle text for entry {}", index));
        }

        Ok(Self::new(index, start_time_ms, end_time_ms, trimmed_text.to_string()))
    }

    /// Parse an SRT timestamp to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        // Parse HH:MM:SS,mmm format
        let parts: Vec<&str> = timestamp.split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
        let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
        let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
        let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    /// The text that should be emitted for this entry: the translation when
    /// one resolved, the original otherwise.
    pub fn output_text(&self) -> &str {
        self.translated_text.as_deref().unwrap_or(&self.text)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.output_text())?;
        writeln!(f)
    }
}

/// Ordered collection of subtitle entries for one job.
///
/// The sequencer owns the entries; the dispatch/validator pipeline mutates
/// an entry's translation and status only through its index.
#[derive(Debug)]
pub struct SubtitleSequencer {
    /// Source filename, if the entries came from a file
    pub source_file: Option<PathBuf>,

    /// List of subtitle entries in original order
    entries: Vec<SubtitleEntry>,
}

impl SubtitleSequencer {
    /// Create a sequencer from pre-parsed entries.
    ///
    /// Indices are reassigned sequentially so downstream code can rely on
    /// `entries[i].index == i`.
    pub fn from_entries(mut entries: Vec<SubtitleEntry>) -> Self {
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.index = i;
        }
        SubtitleSequencer { source_file: None, entries }
    }

    /// Parse an SRT file into a sequencer
    pub fn from_srt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {:?}", path))?;

        let mut sequencer = Self::parse_srt(&content)?;
        sequencer.source_file = Some(path.to_path_buf());
        Ok(sequencer)
    }

    /// Parse SRT content into a sequencer
    pub fn parse_srt(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut lines = content.lines().peekable();

        while let Some(line) = lines.next() {
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }

            // Sequence counter line; the actual index is reassigned below
            if line.parse::<usize>().is_err() {
                return Err(anyhow!("Expected sequence number, found: {}", line));
            }

            let timing_line = lines
                .next()
                .ok_or_else(|| anyhow!("Unexpected end of file after sequence number"))?;

            let caps = TIMESTAMP_REGEX
                .captures(timing_line)
                .ok_or_else(|| anyhow!("Invalid timing line: {}", timing_line))?;

            let start_ms = Self::capture_to_ms(&caps, 1)?;
            let end_ms = Self::capture_to_ms(&caps, 5)?;

            let mut text_lines = Vec::new();
            while let Some(text_line) = lines.peek() {
                if text_line.trim().is_empty() {
                    lines.next();
                    break;
                }
                text_lines.push(lines.next().unwrap().to_string());
            }

            if text_lines.is_empty() {
                continue; // Skip entries with no text
            }

            entries.push(SubtitleEntry::new(
                entries.len(),
                start_ms,
                end_ms,
                text_lines.join("\n"),
            ));
        }

        if entries.is_empty() {
            return Err(anyhow!("No subtitle entries found"));
        }

        Ok(Self::from_entries(entries))
    }

    fn capture_to_ms(caps: &regex::Captures, offset: usize) -> Result<u64> {
        let hours: u64 = caps[offset].parse()?;
        let minutes: u64 = caps[offset + 1].parse()?;
        let seconds: u64 = caps[offset + 2].parse()?;
        let millis: u64 = caps[offset + 3].parse()?;
        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sequencer holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read access to all entries in order
    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    /// Entry by index
    pub fn entry(&self, index: usize) -> Option<&SubtitleEntry> {
        self.entries.get(index)
    }

    /// Mutable entry by index, for the pipeline stages that resolve it
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut SubtitleEntry> {
        self.entries.get_mut(index)
    }

    /// Indices of entries that have not reached a terminal status
    pub fn unresolved_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| !e.status.is_terminal())
            .map(|e| e.index)
            .collect()
    }
}
