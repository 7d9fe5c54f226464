use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Separator between the segments of a [`FeatureId`] path.
pub const SEGMENT_SEPARATOR: char = '.';

/// Hierarchical identity of a feature, e.g. `media.player.voices`.
///
/// The path prefix is the parent: `media.player` is the parent of `media.player.voices`.
/// Cloning is cheap (shared string), which makes the id suitable as a cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(Arc<str>);

/// Rejected feature path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feature id '{path}': {reason}")]
pub struct InvalidFeatureId {
    pub path: String,
    pub reason: &'static str,
}

impl FeatureId {
    /// Parses a dotted path.
    ///
    /// # Errors
    /// Returns [`InvalidFeatureId`] for an empty path, an empty segment, or a segment
    /// containing whitespace or control characters.
    pub fn parse(path: &str) -> Result<Self, InvalidFeatureId> {
        if path.is_empty() {
            return Err(InvalidFeatureId { path: path.to_owned(), reason: "path is empty" });
        }
        for segment in path.split(SEGMENT_SEPARATOR) {
            validate_segment(segment).map_err(|reason| InvalidFeatureId {
                path: path.to_owned(),
                reason,
            })?;
        }
        Ok(Self(Arc::from(path)))
    }

    /// Creates the id of a direct child of this feature.
    ///
    /// # Errors
    /// Returns [`InvalidFeatureId`] if `segment` is not a single valid segment.
    pub fn child(&self, segment: &str) -> Result<Self, InvalidFeatureId> {
        validate_segment(segment).map_err(|reason| InvalidFeatureId {
            path: format!("{}{SEGMENT_SEPARATOR}{segment}", self.0),
            reason,
        })?;
        Ok(Self(Arc::from(format!("{}{SEGMENT_SEPARATOR}{segment}", self.0))))
    }

    /// Full dotted path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the path.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit_once(SEGMENT_SEPARATOR).map_or(&*self.0, |(_, name)| name)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEGMENT_SEPARATOR)
    }

    /// Number of segments; root features have depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once(SEGMENT_SEPARATOR).map(|(parent, _)| Self(Arc::from(parent)))
    }

    /// Ancestors from the immediate parent up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.parent(), Self::parent)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        !self.0.contains(SEGMENT_SEPARATOR)
    }

    /// Returns `true` if `self` is a strict ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other
            .0
            .strip_prefix(&*self.0)
            .is_some_and(|rest| rest.starts_with(SEGMENT_SEPARATOR))
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment.contains(SEGMENT_SEPARATOR) {
        return Err("segment contains a separator");
    }
    if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("segment contains whitespace or control characters");
    }
    Ok(())
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeatureId({})", self.0)
    }
}

impl FromStr for FeatureId {
    type Err = InvalidFeatureId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for FeatureId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for FeatureId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FeatureId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let path = String::deserialize(deserializer)?;
        Self::parse(&path).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_name_follow_the_path() {
        let id = FeatureId::parse("media.player.voices").unwrap();
        assert_eq!(id.name(), "voices");
        assert_eq!(id.depth(), 3);
        assert_eq!(id.parent().unwrap().as_str(), "media.player");

        let ancestors: Vec<String> = id.ancestors().map(|a| a.to_string()).collect();
        assert_eq!(ancestors, ["media.player", "media"]);
    }

    #[test]
    fn ancestor_check_respects_segment_boundaries() {
        let media = FeatureId::parse("media").unwrap();
        let player = FeatureId::parse("media.player").unwrap();
        let mediakit = FeatureId::parse("mediakit").unwrap();

        assert!(media.is_ancestor_of(&player));
        assert!(!media.is_ancestor_of(&mediakit));
        assert!(!media.is_ancestor_of(&media));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(FeatureId::parse("").is_err());
        assert!(FeatureId::parse("a..b").is_err());
        assert!(FeatureId::parse("a.b ").is_err());
        assert!(FeatureId::parse("root").unwrap().child("x.y").is_err());
    }

    #[test]
    fn rejection_names_the_path() {
        let err = FeatureId::parse("a..b").unwrap_err();
        assert!(err.to_string().starts_with("invalid feature id 'a..b': "));
        let err: Box<dyn std::error::Error> = Box::new(err);
        assert!(err.source().is_none());
    }
}
