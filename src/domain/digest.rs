use std::{fmt::Display, fs::File, path::Path};

use blake3::Hash;

/// Content digest of a stored object.
///
/// Two objects with the same digest hold the same bytes,
/// so it doubles as an etag when checking whether an upload changed anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectDigest(pub Hash);

impl ObjectDigest {
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(File::open(path)?)?;
        Ok(Self(hasher.finalize()))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl Display for ObjectDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
