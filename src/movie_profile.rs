/*!
 * Versioned movie profile snapshots.
 *
 * A profile describes the film being translated: title, genre and tone
 * descriptors, and a character roster mapping each on-screen name to the
 * style attributes its dialogue should carry in the target language. The
 * profile is built once per job by an external analyzer and is read-only
 * inside the engine; a re-analysis produces a new snapshot with a higher
 * version, never an in-place edit, so in-flight requests that reference an
 * older version stay reproducible.
 */

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Target-language style attributes for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStyle {
    /// How the character's name must be rendered in the target language
    pub target_rendering: String,

    /// Free-form speech style description (e.g. "clipped, formal")
    #[serde(default)]
    pub speech_style: String,

    /// Personality traits that steer word choice
    #[serde(default)]
    pub traits: Vec<String>,
}

impl CharacterStyle {
    /// Minimal style carrying only the name rendering.
    pub fn rendering(target_rendering: impl Into<String>) -> Self {
        Self {
            target_rendering: target_rendering.into(),
            speech_style: String::new(),
            traits: Vec::new(),
        }
    }
}

/// Immutable snapshot of a film's identity and character roster.
///
/// Roster keys are the character names exactly as they appear in the
/// original dialogue; lookups against them are case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieProfile {
    /// Film title
    pub title: String,

    /// Genre descriptors ("noir", "screwball comedy")
    #[serde(default)]
    pub genres: Vec<String>,

    /// Overall tone descriptor
    #[serde(default)]
    pub tone: String,

    /// Character name to target-language style attributes.
    /// BTreeMap keeps prompt and fingerprint content in a stable order.
    #[serde(default)]
    pub roster: BTreeMap<String, CharacterStyle>,

    /// Monotonically increasing snapshot version
    pub version: u64,
}

impl MovieProfile {
    /// Build the first snapshot for a film.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            genres: Vec::new(),
            tone: String::new(),
            roster: BTreeMap::new(),
            version: 1,
        }
    }

    /// Builder-style genre list.
    pub fn with_genres(mut self, genres: Vec<String>) -> Self {
        self.genres = genres;
        self
    }

    /// Builder-style tone descriptor.
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// Builder-style roster entry.
    pub fn with_character(mut self, name: impl Into<String>, style: CharacterStyle) -> Self {
        self.roster.insert(name.into(), style);
        self
    }

    /// Produce a successor snapshot with a bumped version.
    ///
    /// The returned profile starts as a copy; the caller applies whatever the
    /// new analysis found before sharing it. The original is untouched.
    pub fn revised(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }

    /// Look up the style for a character name, exact match only.
    pub fn character(&self, name: &str) -> Option<&CharacterStyle> {
        self.roster.get(name)
    }

    /// Load a profile snapshot from a JSON file produced by the analyzer.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file: {:?}", path))?;
        let profile: MovieProfile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile file: {:?}", path))?;
        Ok(Arc::new(profile))
    }

    /// A short style guide paragraph used in system prompts.
    pub fn style_guide(&self) -> String {
        let mut guide = format!("Film: {}", self.title);
        if !self.genres.is_empty() {
            guide.push_str(&format!("\nGenres: {}", self.genres.join(", ")));
        }
        if !self.tone.is_empty() {
            guide.push_str(&format!("\nTone: {}", self.tone));
        }
        for (name, style) in &self.roster {
            guide.push_str(&format!("\nCharacter {} -> {}", name, style.target_rendering));
            if !style.speech_style.is_empty() {
                guide.push_str(&format!(" ({})", style.speech_style));
            }
            if !style.traits.is_empty() {
                guide.push_str(&format!(" [{}]", style.traits.join(", ")));
            }
        }
        guide
    }
}
