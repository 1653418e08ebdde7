//! Location names and paths.
//!
//! Names are immutable shared strings; cloning one is a reference count bump.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A single path component, attribute name or tag.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(Arc<str>);

impl Name {
    /// Create a name from any string-like value.
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(Arc::from(s.as_ref()))
    }

    /// Borrow as `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for Name {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location path from the root, one name per level.
pub type Path = Vec<Name>;

/// Format a path as `/a/b/c`; the root is `/`.
pub fn path_to_string(path: &[Name]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for name in path {
        out.push('/');
        out.push_str(name);
    }
    out
}

/// Parse `/a/b/c` (leading slash optional, empty components skipped).
pub fn string_to_path(s: &str) -> Path {
    s.split('/').filter(|c| !c.is_empty()).map(Name::from).collect()
}

/// Build a path from string slices.
pub fn path_of<S: AsRef<str>>(parts: &[S]) -> Path {
    parts.iter().map(|p| Name::new(p.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strings() {
        assert_eq!(path_to_string(&[]), "/");
        let p = string_to_path("/a/b//c/");
        assert_eq!(p, path_of(&["a", "b", "c"]));
        assert_eq!(path_to_string(&p), "/a/b/c");
        assert!(string_to_path("/").is_empty());
    }

    #[test]
    fn test_name_ordering() {
        let mut names = vec![Name::from("b"), Name::from("a")];
        names.sort();
        assert_eq!(names[0], "a");
        assert_eq!(format!("{}", names[1]), "b");
    }
}
