//! Content hashing of scene locations.

pub use murmur3::MurmurHash;

/// Which part of a location [`SceneInterface::hash`] covers.
///
/// [`SceneInterface::hash`]: super::SceneInterface::hash
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashType {
    Transform,
    Attributes,
    Bound,
    Object,
    ChildNames,
    /// Everything above for the location and its whole subtree.
    Hierarchy,
}

impl HashType {
    pub const ALL: [HashType; 6] = [
        HashType::Transform,
        HashType::Attributes,
        HashType::Bound,
        HashType::Object,
        HashType::ChildNames,
        HashType::Hierarchy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Attributes => "attributes",
            Self::Bound => "bound",
            Self::Object => "object",
            Self::ChildNames => "childNames",
            Self::Hierarchy => "hierarchy",
        }
    }
}
