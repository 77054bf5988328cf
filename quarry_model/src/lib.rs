//! Decoder for the versioned model stream format.
//!
//! A model stream holds a header whose version selects how many flags follow,
//! a list of meshes with quantized vertex data whose layout depends on those flags,
//! and an optional skeleton. [`decode`] turns the bytes into an immutable [`Scene`].

#![warn(clippy::all, clippy::pedantic)]
// quantized fields are narrowed on purpose
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]

mod decoder;
mod mesh;
mod reader;
mod scene;
mod skeleton;
mod version;

pub use decoder::{decode, read_header, Decoder, Header, SIGNATURE};
pub use mesh::{ModelMesh, Polygon, Vertex};
pub use reader::{Component, Link, Reader, MAX_COUNT};
pub use scene::{ScaleFactors, Scene};
pub use skeleton::{Hierarchy, Skeleton, SkeletonBone, Space};
pub use version::{flag_count, FlagSet, Flags, ModelVersion, SUPPORTED_VERSIONS};

use std::{
    fmt::{self, Display},
    result,
};

use thiserror::Error;

/// What went wrong while decoding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ErrorKind {
    #[error("not a model stream: invalid signature {actual:#010x}, expected {expected:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },
    #[error("unsupported version {0}")]
    UnsupportedVersion(f32),
    #[error("count {0} exceeds the safety limit")]
    CountLimitExceeded(u32),
    #[error("unknown link count {0}")]
    UnknownLinkCount(u8),
    #[error("truncated stream: {needed} bytes needed, {remaining} remaining")]
    TruncatedStream { needed: usize, remaining: usize },
    #[error("parent {parent} is not a previously parsed bone")]
    InvalidBoneParent { parent: u8 },
}

/// The part of the stream being decoded when an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Header,
    Mesh(usize),
    Skeleton,
    Bone(usize),
}

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Header => f.write_str("header"),
            Location::Mesh(index) => write!(f, "mesh {index}"),
            Location::Skeleton => f.write_str("skeleton"),
            Location::Bone(index) => write!(f, "bone {index}"),
        }
    }
}

/// A fatal decoding error. No partial scene is produced when one occurs.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind} ({location}, offset {offset:#x})")]
pub struct Error {
    pub kind: ErrorKind,
    pub offset: usize,
    pub location: Location,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            location: Location::Header,
        }
    }

    pub(crate) fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}

pub type Result<T> = result::Result<T, Error>;
