//! Declaration names.
//!
//! `Name` is a single identifier segment (`Foo`, `bar`). `FqName` is a
//! dot-separated qualified name (`platform.posix.stat`). Both are cheap to
//! clone: the text lives in an `Arc<str>` shared by every copy, which matters
//! because the merge forest copies names into up to three output variants.
//!
//! The root package has the empty qualified name, see [`FqName::ROOT_TEXT`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator between segments of a qualified name.
pub const SEPARATOR: char = '.';

/// A single (simple) declaration name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

/// A fully qualified, dot-separated declaration name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(Arc<str>);

impl FqName {
    /// Text of the root package name.
    pub const ROOT_TEXT: &'static str = "";

    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    pub fn root() -> Self {
        Self::new(Self::ROOT_TEXT)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the dot-separated segments. The root name has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|segment| !segment.is_empty())
    }

    /// Last segment of the name (`c` for `a.b.c`).
    pub fn short_name(&self) -> Name {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Name::new(&self.0[idx + 1..]),
            None => Name::new(&*self.0),
        }
    }

    /// Name with its last segment removed. `None` for the root.
    pub fn parent(&self) -> Option<FqName> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind(SEPARATOR) {
            Some(idx) => FqName::new(&self.0[..idx]),
            None => FqName::root(),
        })
    }

    /// Append a segment.
    pub fn child(&self, name: &Name) -> FqName {
        if self.is_root() {
            FqName::new(name.as_str())
        } else {
            FqName::new(format!("{}{SEPARATOR}{}", self.0, name))
        }
    }

    /// Segment-wise prefix test: `kotlin.collections` starts with `kotlin`
    /// but `kotlinx.cinterop` does not.
    pub fn starts_with(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match self.0.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }
}

impl fmt::Debug for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("FqName(<root>)")
        } else {
            write!(f, "FqName({})", self.0)
        }
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for FqName {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for FqName {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

#[cfg(test)]
#[path = "../tests/names_tests.rs"]
mod tests;
