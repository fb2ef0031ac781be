//! Normalized host paths.
//!
//! A [`HostPath`] is always absolute, slash-separated, and free of `.`/`..`
//! segments, repeated separators, and trailing slashes. Two paths naming the
//! same location compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{HostError, HostResult};

const SEP: char = '/';

/// Absolute, normalized path into a host's tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostPath(String);

/// A single path segment, as produced by `list`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathFragment(String);

impl HostPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self(SEP.to_string())
    }

    /// Normalize a raw path string.
    ///
    /// Relative paths are resolved against `/`. Fails if `..` climbs above
    /// the root.
    pub fn new(raw: &str) -> HostResult<Self> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(SEP) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(HostError::invalid_path(raw));
                    }
                }
                s => segments.push(s),
            }
        }
        Ok(Self::from_segments(&segments))
    }

    fn from_segments(segments: &[&str]) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        let mut out = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
        for s in segments {
            out.push(SEP);
            out.push_str(s);
        }
        Self(out)
    }

    /// Wrap a string already known to be normalized (e.g. a stored key).
    pub(crate) fn from_normalized(s: String) -> Self {
        debug_assert!(s.starts_with(SEP), "not normalized: {s}");
        Self(s)
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix every strict descendant's string form starts with.
    pub(crate) fn descendant_prefix(&self) -> String {
        if self.is_root() {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Returns true for `/`.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Append a single fragment.
    pub fn join(&self, fragment: &PathFragment) -> Self {
        if self.is_root() {
            Self(format!("/{}", fragment.0))
        } else {
            Self(format!("{}/{}", self.0, fragment.0))
        }
    }

    /// Resolve a relative path string against this path.
    pub fn join_str(&self, rel: &str) -> HostResult<Self> {
        Self::new(&format!("{}/{}", self.0, rel))
    }

    /// The parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEP) {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// The last segment, or `None` for the root.
    pub fn basename(&self) -> Option<PathFragment> {
        if self.is_root() {
            return None;
        }
        self.0
            .rsplit(SEP)
            .next()
            .map(|s| PathFragment(s.to_string()))
    }

    /// Iterate the path's segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEP).filter(|s| !s.is_empty())
    }

    /// Every strict ancestor, nearest first, ending with `/`.
    pub fn ancestors(&self) -> impl Iterator<Item = HostPath> {
        std::iter::successors(self.parent(), HostPath::parent)
    }

    /// Returns true if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &HostPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// The remainder of `self` below `ancestor`, without a leading slash.
    ///
    /// Returns `Some("")` when the paths are equal and `None` when
    /// `ancestor` is not an ancestor.
    pub fn strip_prefix(&self, ancestor: &HostPath) -> Option<&str> {
        if self == ancestor {
            Some("")
        } else if ancestor.is_ancestor_of(self) {
            let start = if ancestor.is_root() { 1 } else { ancestor.0.len() + 1 };
            Some(&self.0[start..])
        } else {
            None
        }
    }

    /// The immediate child of `dir` on the way to `self`.
    pub fn child_of(&self, dir: &HostPath) -> Option<PathFragment> {
        let rest = self.strip_prefix(dir)?;
        rest.split(SEP)
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| PathFragment(s.to_string()))
    }

    /// Substitute the `from` prefix of this path with `to`.
    pub fn rebase(&self, from: &HostPath, to: &HostPath) -> Option<Self> {
        let rest = self.strip_prefix(from)?;
        if rest.is_empty() {
            Some(to.clone())
        } else if to.is_root() {
            Some(Self(format!("/{rest}")))
        } else {
            Some(Self(format!("{}/{rest}", to.0)))
        }
    }
}

impl Default for HostPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for HostPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for HostPath {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for HostPath {
    type Error = HostError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl TryFrom<&str> for HostPath {
    type Error = HostError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<HostPath> for String {
    fn from(p: HostPath) -> Self {
        p.0
    }
}

impl PathFragment {
    /// Create a fragment; rejects empty names and names containing `/`,
    /// as well as `.` and `..`.
    pub fn new(name: &str) -> HostResult<Self> {
        if name.is_empty() || name.contains(SEP) || name == "." || name == ".." {
            return Err(HostError::invalid_path(name));
        }
        Ok(Self(name.to_string()))
    }

    /// The fragment as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PathFragment {
    type Error = HostError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<PathFragment> for String {
    fn from(f: PathFragment) -> Self {
        f.0
    }
}
