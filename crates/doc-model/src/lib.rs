use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 1-based page number.
pub type PageNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One positioned piece of text on a page.
///
/// Geometry is in page-viewport space: origin at the top-left corner of the
/// page, y growing downward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub origin: Point,
    pub width: f32,
    pub height: f32,
    pub page_number: PageNumber,
}

impl TextFragment {
    pub fn new(
        page_number: PageNumber,
        text: impl Into<String>,
        origin: Point,
        width: f32,
        height: f32,
    ) -> Self {
        Self { text: text.into(), origin, width: width.max(0.0), height: height.max(0.0), page_number }
    }

    pub fn right(&self) -> f32 {
        self.origin.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.origin.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, width: right - left, height: bottom - top }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn encloses(&self, fragment: &TextFragment) -> bool {
        fragment.origin.x >= self.left
            && fragment.origin.y >= self.top
            && fragment.right() <= self.right()
            && fragment.bottom() <= self.bottom()
    }
}

/// Opaque key of a configured phrase, usually a citation number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub String);

impl ReferenceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ReferenceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u32> for ReferenceId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("reference {reference} has no variations")]
    NoVariations { reference: ReferenceId },
    #[error("reference {reference} has an empty variation at position {index}")]
    EmptyVariation { reference: ReferenceId, index: usize },
    #[error("reference {reference} has an empty canonical text")]
    EmptyCanonical { reference: ReferenceId },
    #[error("reference {reference} has page hint 0 (page hints are 1-based)")]
    InvalidPageHint { reference: ReferenceId },
    #[error("references missing from configuration: {}", join_ids(.0))]
    MissingReferences(Vec<ReferenceId>),
}

fn join_ids(ids: &[ReferenceId]) -> String {
    ids.iter().map(ReferenceId::as_str).collect::<Vec<_>>().join(", ")
}

/// Phrase to locate for one reference.
///
/// Variations are tried in listed order, most specific first, and are matched
/// case-insensitively without any other normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseSpec {
    pub canonical: String,
    pub variations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_hint: Option<PageNumber>,
}

impl PhraseSpec {
    pub fn new<I, S>(canonical: impl Into<String>, variations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            canonical: canonical.into(),
            variations: variations.into_iter().map(Into::into).collect(),
            page_hint: None,
        }
    }

    pub fn with_page_hint(mut self, page: PageNumber) -> Self {
        self.page_hint = Some(page);
        self
    }

    pub fn validate(&self, reference: &ReferenceId) -> Result<(), ConfigError> {
        if self.canonical.trim().is_empty() {
            return Err(ConfigError::EmptyCanonical { reference: reference.clone() });
        }

        if self.variations.is_empty() {
            return Err(ConfigError::NoVariations { reference: reference.clone() });
        }

        if let Some(index) = self.variations.iter().position(|v| v.trim().is_empty()) {
            return Err(ConfigError::EmptyVariation { reference: reference.clone(), index });
        }

        if self.page_hint == Some(0) {
            return Err(ConfigError::InvalidPageHint { reference: reference.clone() });
        }

        Ok(())
    }
}

/// Static reference → phrase mapping supplied by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseConfig {
    references: BTreeMap<ReferenceId, PhraseSpec>,
}

impl PhraseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<ReferenceId>, spec: PhraseSpec) {
        self.references.insert(reference.into(), spec);
    }

    pub fn with(mut self, reference: impl Into<ReferenceId>, spec: PhraseSpec) -> Self {
        self.insert(reference, spec);
        self
    }

    pub fn get(&self, reference: &ReferenceId) -> Option<&PhraseSpec> {
        self.references.get(reference)
    }

    pub fn contains(&self, reference: &ReferenceId) -> bool {
        self.references.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReferenceId, &PhraseSpec)> {
        self.references.iter()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.references.iter().try_for_each(|(reference, spec)| spec.validate(reference))
    }

    /// Fails unless every id in `required` has an entry.
    pub fn require<'a, I>(&self, required: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a ReferenceId>,
    {
        let mut missing: Vec<ReferenceId> =
            required.into_iter().filter(|id| !self.contains(id)).cloned().collect();

        if missing.is_empty() {
            return Ok(());
        }

        missing.sort();
        missing.dedup();
        Err(ConfigError::MissingReferences(missing))
    }
}

impl FromIterator<(ReferenceId, PhraseSpec)> for PhraseConfig {
    fn from_iter<T: IntoIterator<Item = (ReferenceId, PhraseSpec)>>(iter: T) -> Self {
        Self { references: iter.into_iter().collect() }
    }
}

/// Located phrase: the page it was found on and the rectangle enclosing the
/// matching fragment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub page: PageNumber,
    pub rect: BoundingRect,
    pub variation: String,
    pub first_fragment: usize,
    pub fragment_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub page_number: PageNumber,
    pub rect: BoundingRect,
}
