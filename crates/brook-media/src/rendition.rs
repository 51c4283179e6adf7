use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One fixed-quality encoded version of a media asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    /// Unique identifier, stable for the lifetime of the session.
    pub id: String,
    /// Human-readable name ("1080p", "480p").
    pub label: String,
    /// Encoding bitrate in bits per second.
    pub bitrate_bps: u64,
    /// Locator for the media stream at this rendition.
    pub url: String,
    /// At most one rendition per ladder is marked default.
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LadderError {
    #[error("rendition list is empty")]
    Empty,
    #[error("rendition bitrates must be strictly ascending at index {index}")]
    NotAscending { index: usize },
    #[error("duplicate rendition id: {id}")]
    DuplicateId { id: String },
    #[error("more than one rendition marked default")]
    MultipleDefaults,
}

/// Ordered, validated list of renditions for one asset.
///
/// Bitrates are strictly ascending, so index-based neighbor lookups
/// (`up_from`/`down_from`) always move one quality step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionLadder {
    renditions: Vec<Rendition>,
}

impl RenditionLadder {
    pub fn new(renditions: Vec<Rendition>) -> Result<Self, LadderError> {
        if renditions.is_empty() {
            return Err(LadderError::Empty);
        }
        let mut defaults = 0_usize;
        for (index, rendition) in renditions.iter().enumerate() {
            if rendition.is_default {
                defaults += 1;
                if defaults > 1 {
                    return Err(LadderError::MultipleDefaults);
                }
            }
            if renditions[..index]
                .iter()
                .any(|earlier| earlier.id == rendition.id)
            {
                return Err(LadderError::DuplicateId {
                    id: rendition.id.clone(),
                });
            }
            if index > 0 && renditions[index - 1].bitrate_bps >= rendition.bitrate_bps {
                return Err(LadderError::NotAscending { index });
            }
        }
        Ok(Self { renditions })
    }

    pub fn get(&self, index: usize) -> Option<&Rendition> {
        self.renditions.get(index)
    }

    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.renditions.iter().position(|r| r.id == id)
    }

    /// Index of the default-flagged rendition, else 0 (the lowest bitrate).
    pub fn initial_index(&self) -> usize {
        self.renditions
            .iter()
            .position(|r| r.is_default)
            .unwrap_or(0)
    }

    /// Next rendition down in quality, if any.
    pub fn down_from(&self, index: usize) -> Option<usize> {
        index.checked_sub(1)
    }

    /// Next rendition up in quality, if any.
    pub fn up_from(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.renditions.len()).then_some(next)
    }
}
