//! File header metadata.
//!
//! Key/value pairs of strings, stored as `key=value;key2=value2` with `\`
//! escaping for `;`, `=` and `\`.

use smallvec::SmallVec;
use std::fmt;

/// Ordered key/value string pairs.
#[derive(Clone, Default, PartialEq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 8]>,
}

impl MetaData {
    pub const TITLE_KEY: &'static str = "title";
    pub const DESCRIPTION_KEY: &'static str = "description";
    pub const DATA_VERSION_KEY: &'static str = "dataVersion";
    pub const LIBRARY_KEY: &'static str = "library";
    pub const BUILD_DATE_KEY: &'static str = "buildDate";

    /// Version of the node layout written into every header.
    pub const DATA_VERSION: &'static str = "1";

    pub fn new() -> Self {
        Self::default()
    }

    /// Header written by this library, followed by `extra` entries.
    pub fn scene_header(extra: &MetaData) -> Self {
        let mut meta = Self::new();
        meta.set(Self::TITLE_KEY, "scene cache");
        meta.set(Self::DESCRIPTION_KEY, "Hierarchical time-sampled scene");
        meta.set(Self::DATA_VERSION_KEY, Self::DATA_VERSION);
        meta.set(
            Self::LIBRARY_KEY,
            concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
        );
        meta.set(
            Self::BUILD_DATE_KEY,
            concat!(env!("SCENECACHE_BUILD_DATE"), " ", env!("SCENECACHE_BUILD_TIME")),
        );
        for (k, v) in extra.iter() {
            meta.set(k, v);
        }
        meta
    }

    /// Set a value, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn title(&self) -> Option<&str> {
        self.get(Self::TITLE_KEY)
    }

    pub fn data_version(&self) -> Option<&str> {
        self.get(Self::DATA_VERSION_KEY)
    }

    /// Serialize to `key=value;...`.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parse the serialized form. Entries without `=` or with an empty key
    /// are skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        for part in split_unescaped(s, ';') {
            let Some(eq) = find_unescaped(part, '=') else {
                continue;
            };
            let key = unescape(&part[..eq]);
            let value = unescape(&part[eq + 1..]);
            if !key.is_empty() {
                meta.set(key, value);
            }
        }
        meta
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl FromIterator<(String, String)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => result.push(next),
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn find_unescaped(s: &str, ch: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ch {
            return Some(i);
        }
    }
    None
}

/// Split on unescaped `sep`, dropping empty trailing parts.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + 1;
        }
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}
