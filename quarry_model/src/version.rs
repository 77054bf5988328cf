use std::fmt::{self, Display};

use bitflags::bitflags;
use byteorder::ByteOrder;

use super::{reader::Reader, Result};

/// A supported model stream version and the number of flags it stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVersion {
    tag: f32,
    flag_count: usize,
}

/// Every version the decoder understands. Supporting a new version means adding an entry here.
pub const SUPPORTED_VERSIONS: &[ModelVersion] = &[
    ModelVersion::new(7.0, 4),
    ModelVersion::new(8.0, 5),
    ModelVersion::new(10.0, 6),
    ModelVersion::new(11.0, 6),
];

impl ModelVersion {
    const fn new(tag: f32, flag_count: usize) -> Self {
        Self { tag, flag_count }
    }

    /// Looks up a version tag read from a stream.
    #[must_use]
    pub fn resolve(tag: f32) -> Option<Self> {
        SUPPORTED_VERSIONS
            .iter()
            .copied()
            .find(|version| version.tag.to_bits() == tag.to_bits())
    }

    #[must_use]
    pub fn tag(self) -> f32 {
        self.tag
    }

    #[must_use]
    pub fn flag_count(self) -> usize {
        self.flag_count
    }

    #[must_use]
    pub fn at_least(self, tag: f32) -> bool {
        self.tag >= tag
    }
}

impl Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.tag)
    }
}

/// Flag count of a version tag, `None` if the version is unsupported.
#[must_use]
pub fn flag_count(tag: f32) -> Option<usize> {
    ModelVersion::resolve(tag).map(ModelVersion::flag_count)
}

bitflags! {
    /// Stream flags, bit `n` is the flag stored at index `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const SKELETON = 1 << 0;
        const UV = 1 << 1;
        const NORMALS = 1 << 2;
        const TANGENTS = 1 << 3;
        const BITANGENTS = 1 << 4;
        const COLORS = 1 << 5;
    }
}

/// The flags of one stream together with how many were stored.
/// Flags beyond the stored count are never set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet {
    flags: Flags,
    len: usize,
}

impl FlagSet {
    /// Builds a flag set from stored values, index `n` of `values` being flag `n`.
    ///
    /// # Panics
    ///
    /// Panics if more than 8 values are given.
    #[must_use]
    pub fn from_values(values: &[bool]) -> Self {
        assert!(values.len() <= 8, "at most 8 flags are supported");

        let mut flags = Flags::empty();
        for (index, &set) in values.iter().enumerate() {
            if set {
                flags |= Flags::from_bits_retain(1 << index);
            }
        }

        Self {
            flags,
            len: values.len(),
        }
    }

    pub(crate) fn read<B: ByteOrder>(reader: &mut Reader<B>, version: ModelVersion) -> Result<Self> {
        let mut values = [false; 8];
        let values = &mut values[..version.flag_count()];

        for value in values.iter_mut() {
            *value = reader.read_bool()?;
        }

        Ok(Self::from_values(values))
    }

    #[must_use]
    pub fn contains(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The stored value at `index`, `None` past the stored count.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| self.flags.bits() & (1 << index) != 0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use byteorder::LittleEndian;

    use super::*;

    #[test]
    fn flag_counts_match_table() {
        assert_eq!(flag_count(7.0), Some(4));
        assert_eq!(flag_count(8.0), Some(5));
        assert_eq!(flag_count(10.0), Some(6));
        assert_eq!(flag_count(11.0), Some(6));
    }

    #[test]
    fn unknown_versions_are_unsupported() {
        for tag in [0.0, 6.0, 9.0, 10.5, 12.0, f32::NAN] {
            assert_eq!(ModelVersion::resolve(tag), None, "version {tag}");
        }
    }

    #[test]
    fn version_comparison() {
        let v10 = ModelVersion::resolve(10.0).unwrap();
        assert!(v10.at_least(10.0));
        assert!(!v10.at_least(11.0));
        assert_eq!(v10.to_string(), "10.0");
    }

    #[test]
    fn flags_are_indexed_by_position() {
        let flags = FlagSet::from_values(&[true, false, true, false]);

        assert!(flags.contains(Flags::SKELETON));
        assert!(!flags.contains(Flags::UV));
        assert!(flags.contains(Flags::NORMALS));
        assert!(!flags.contains(Flags::COLORS));
        assert_eq!(flags.len(), 4);
        assert_eq!(flags.get(2), Some(true));
        assert_eq!(flags.get(4), None);
    }

    #[test]
    fn reads_exactly_flag_count_values() {
        let version = ModelVersion::resolve(8.0).unwrap();
        let bytes = [1, 1, 0, 0, 1, 0xee];
        let mut reader = Reader::<LittleEndian>::new(&bytes);

        let flags = FlagSet::read(&mut reader, version).unwrap();

        assert_eq!(flags.len(), 5);
        assert!(flags.contains(Flags::SKELETON | Flags::UV | Flags::BITANGENTS));
        assert!(!flags.contains(Flags::NORMALS));
        assert!(!flags.contains(Flags::TANGENTS));
        assert_eq!(reader.position(), 5);
    }
}
