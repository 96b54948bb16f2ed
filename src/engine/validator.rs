/*!
 * Roster consistency validation.
 *
 * After a batch resolves, every character name from the movie profile that
 * appears verbatim in an original line must appear as its configured
 * target-language rendering in the translation. Lookups are exact and
 * case-sensitive; the roster is authoritative, not fuzzy-matched.
 */

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::engine::request::BatchEntry;
use crate::movie_profile::MovieProfile;

/// One roster violation found in a resolved batch
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Sequencer index of the offending entry
    pub entry_index: usize,
    /// Character name as it appears in the original dialogue
    pub character: String,
    /// Rendering the translation was expected to carry
    pub expected_rendering: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "entry {}: '{}' must be rendered as '{}'",
            self.entry_index, self.character, self.expected_rendering
        )
    }
}

/// Checks resolved translations against the profile roster
pub struct ConsistencyValidator {
    profile: Arc<MovieProfile>,
}

impl ConsistencyValidator {
    pub fn new(profile: Arc<MovieProfile>) -> Self {
        Self { profile }
    }

    /// Validate one batch of resolved translations.
    ///
    /// `entries` and `translations` are parallel; the caller guarantees
    /// equal length.
    pub fn validate(&self, entries: &[BatchEntry], translations: &[String]) -> Vec<Violation> {
        debug_assert_eq!(entries.len(), translations.len());

        let mut violations = Vec::new();
        for (entry, translation) in entries.iter().zip(translations) {
            for (name, style) in &self.profile.roster {
                if entry.text.contains(name.as_str())
                    && !translation.contains(style.target_rendering.as_str())
                {
                    violations.push(Violation {
                        entry_index: entry.index,
                        character: name.clone(),
                        expected_rendering: style.target_rendering.clone(),
                    });
                }
            }
        }

        if !violations.is_empty() {
            debug!("Found {} roster violations in batch", violations.len());
        }
        violations
    }

    /// Build the emphasis note carried by a re-translation request.
    pub fn emphasis_note(violations: &[Violation]) -> String {
        let mut note = String::from("Render these character names exactly as specified:");
        for violation in violations {
            note.push_str(&format!(
                " {} => {};",
                violation.character, violation.expected_rendering
            ));
        }
        note
    }
}
