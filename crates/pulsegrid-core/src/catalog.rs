//! Sound catalog.
//!
//! The catalog is an immutable, ordered list of sound descriptors produced by
//! an offline cataloguing step and shipped as a JSON manifest:
//!
//! ```json
//! [
//!   { "id": "kick", "label": "Kick", "category": "drums", "source": "drums/kick.wav" }
//! ]
//! ```
//!
//! Each entry is augmented with purely cosmetic [`Presentation`] attributes
//! derived from its position in the catalog.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Identifier of a sound in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SoundId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A sound as described by the manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundDescriptor {
    pub id: SoundId,
    pub label: String,
    pub category: String,
    /// Where the audio data lives, resolved by a [`crate::SoundSource`].
    #[serde(rename = "source")]
    pub source_locator: String,
}

impl SoundDescriptor {
    pub fn new(
        id: impl Into<SoundId>,
        label: impl Into<String>,
        category: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category: category.into(),
            source_locator: source_locator.into(),
        }
    }
}

/// Outline drawn for a sound tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Diamond,
}

/// Idle animation of a sound tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Animation {
    Pulse,
    Bounce,
    Spin,
}

const SHAPES: [Shape; 4] = [Shape::Circle, Shape::Square, Shape::Triangle, Shape::Diamond];
const ANIMATIONS: [Animation; 3] = [Animation::Pulse, Animation::Bounce, Animation::Spin];

/// Cosmetic attributes derived from a catalog position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Presentation {
    pub shape: Shape,
    pub animation: Animation,
    /// Hue in degrees, `[0, 360)`.
    pub hue: f32,
    /// Tilt in degrees, `[-15, 15]`.
    pub rotation: f32,
    pub scale: f32,
}

impl Presentation {
    /// Attributes for the sound at `index` in catalog order.
    pub fn for_index(index: usize) -> Self {
        Self {
            shape: SHAPES[index % SHAPES.len()],
            animation: ANIMATIONS[(index / SHAPES.len()) % ANIMATIONS.len()],
            hue: ((index * 47) % 360) as f32,
            rotation: ((index * 23) % 31) as f32 - 15.0,
            scale: 0.9 + (index % 3) as f32 * 0.08,
        }
    }
}

/// A descriptor together with its derived presentation.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub descriptor: SoundDescriptor,
    pub presentation: Presentation,
}

/// Immutable, ordered sound catalog.
#[derive(Clone, Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index_by_id: HashMap<SoundId, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting empty lists and duplicate ids.
    pub fn new(descriptors: Vec<SoundDescriptor>) -> Result<Self, CatalogError> {
        if descriptors.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index_by_id = HashMap::with_capacity(descriptors.len());
        let mut entries = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            if index_by_id.insert(descriptor.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId(descriptor.id));
            }
            entries.push(CatalogEntry {
                descriptor,
                presentation: Presentation::for_index(index),
            });
        }

        Ok(Self {
            entries,
            index_by_id,
        })
    }

    /// Parse a JSON manifest.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let descriptors: Vec<SoundDescriptor> = serde_json::from_str(json)?;
        Self::new(descriptors)
    }

    /// Read and parse a JSON manifest from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        log::info!("Loaded {} sounds from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SoundDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn get(&self, id: &SoundId) -> Option<&SoundDescriptor> {
        self.index_by_id
            .get(id)
            .map(|&index| &self.entries[index].descriptor)
    }

    pub fn contains(&self, id: &SoundId) -> bool {
        self.index_by_id.contains_key(id)
    }

    /// Category names in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let category = entry.descriptor.category.as_str();
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    /// Entries of one category, in catalog order.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.descriptor.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"[
        { "id": "kick", "label": "Kick", "category": "drums", "source": "drums/kick.wav" },
        { "id": "snare", "label": "Snare", "category": "drums", "source": "drums/snare.wav" },
        { "id": "pad", "label": "Warm Pad", "category": "synth", "source": "synth/pad.wav" }
    ]"#;

    #[test]
    fn test_parse_manifest() {
        let catalog = Catalog::from_json(MANIFEST).unwrap();
        assert_eq!(catalog.len(), 3);
        let pad = catalog.get(&SoundId::from("pad")).unwrap();
        assert_eq!(pad.label, "Warm Pad");
        assert_eq!(pad.source_locator, "synth/pad.wav");
        assert_eq!(catalog.categories(), vec!["drums", "synth"]);
        assert_eq!(catalog.in_category("drums").count(), 2);
    }

    #[test]
    fn test_empty_manifest_rejected() {
        assert!(matches!(Catalog::from_json("[]"), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_malformed_manifest_rejected() {
        assert!(matches!(
            Catalog::from_json(r#"{ "id": "kick" }"#),
            Err(CatalogError::Malformed(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let descriptors = vec![
            SoundDescriptor::new("kick", "Kick", "drums", "a.wav"),
            SoundDescriptor::new("kick", "Kick 2", "drums", "b.wav"),
        ];
        match Catalog::new(descriptors) {
            Err(CatalogError::DuplicateId(id)) => assert_eq!(id.as_str(), "kick"),
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = Catalog::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_presentation_is_deterministic() {
        let a = Catalog::from_json(MANIFEST).unwrap();
        let b = Catalog::from_json(MANIFEST).unwrap();
        for (x, y) in a.entries().iter().zip(b.entries()) {
            assert_eq!(x.presentation, y.presentation);
        }

        let p = Presentation::for_index(5);
        assert_eq!(p.shape, Shape::Square);
        assert_eq!(p.animation, Animation::Bounce);
        assert!((p.hue - 235.0).abs() < f32::EPSILON);
        assert!((-15.0..=15.0).contains(&p.rotation));
    }
}
