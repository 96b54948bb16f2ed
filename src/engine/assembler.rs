/*!
 * Final output assembly.
 *
 * Once every entry has reached a terminal status, the assembler renders the
 * sequencer back into SRT form in original order with the original timing.
 * Fallback entries carry their source text, so the output always has one
 * block per input entry.
 */

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::errors::EngineError;
use crate::subtitle_processor::{EntryStatus, SubtitleSequencer};

/// Counts reported alongside the assembled output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblySummary {
    /// Entries carrying a validated translation
    pub translated: usize,
    /// Entries that fell back to their original text
    pub fallbacks: usize,
}

/// Renders a fully resolved sequencer into SRT output
pub struct OutputAssembler;

impl OutputAssembler {
    /// Render the sequencer as SRT content.
    ///
    /// Fails with `IncompleteJob` if any entry is still pending, in flight,
    /// or failed without falling back.
    pub fn assemble(sequencer: &SubtitleSequencer) -> Result<String, EngineError> {
        let unresolved = sequencer.unresolved_indices();
        if !unresolved.is_empty() {
            return Err(EngineError::IncompleteJob { unresolved: unresolved.len() });
        }

        let mut output = String::new();
        for entry in sequencer.entries() {
            output.push_str(&format!("{}\n", entry.index + 1));
            output.push_str(&format!(
                "{} --> {}\n",
                entry.format_start_time(),
                entry.format_end_time()
            ));
            output.push_str(entry.output_text());
            output.push_str("\n\n");
        }
        Ok(output)
    }

    /// Assemble and write to a file.
    pub fn write_to_file<P: AsRef<Path>>(
        sequencer: &SubtitleSequencer,
        path: P,
    ) -> Result<AssemblySummary> {
        let path = path.as_ref();
        let content = Self::assemble(sequencer)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;

        let summary = Self::summarize(sequencer);
        if summary.fallbacks > 0 {
            warn!(
                "Wrote {:?} with {} fallback entries out of {}",
                path,
                summary.fallbacks,
                sequencer.len()
            );
        } else {
            info!("Wrote {:?} ({} entries translated)", path, summary.translated);
        }
        Ok(summary)
    }

    /// Count terminal statuses in the sequencer.
    pub fn summarize(sequencer: &SubtitleSequencer) -> AssemblySummary {
        let mut summary = AssemblySummary::default();
        for entry in sequencer.entries() {
            match entry.status {
                EntryStatus::Translated => summary.translated += 1,
                EntryStatus::Fallback => summary.fallbacks += 1,
                _ => {}
            }
        }
        summary
    }
}
