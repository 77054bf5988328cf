use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use super::{
    mesh::ModelMesh,
    reader::Reader,
    scene::{ScaleFactors, Scene},
    skeleton::Skeleton,
    version::{FlagSet, Flags, ModelVersion},
    Error, ErrorKind, Location, Result,
};

/// The first four bytes of every model stream, `QMDL` read as a little-endian u32.
pub const SIGNATURE: u32 = u32::from_le_bytes(*b"QMDL");

/// Everything stored before the first mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    pub version: ModelVersion,
    pub flags: FlagSet,
    /// Scale factors stored in the header. `weight` is only known after the meshes are read.
    pub scale: ScaleFactors,
    pub mesh_count: usize,
}

/// Decodes a model stream whose scalars are stored in the byte order `B`.
#[derive(Debug, Clone)]
pub struct Decoder<'a, B = LittleEndian> {
    reader: Reader<'a, B>,
}

impl<'a, B: ByteOrder> Decoder<'a, B> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(bytes),
        }
    }

    fn check_signature(&mut self) -> Result<()> {
        let signature = self.reader.read_u32()?;

        if signature == SIGNATURE {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidSignature {
                    expected: SIGNATURE,
                    actual: signature,
                },
                0,
            ))
        }
    }

    fn check_version(&mut self) -> Result<ModelVersion> {
        let offset = self.reader.position();
        let tag = self.reader.read_f32()?;

        ModelVersion::resolve(tag).ok_or_else(|| Error::new(ErrorKind::UnsupportedVersion(tag), offset))
    }

    /// Reads the header only.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the signature doesn't match, the version is unsupported
    /// or the stream ends inside the header.
    pub fn read_header(&mut self) -> Result<Header> {
        self.check_signature()?;
        let version = self.check_version()?;
        let flags = FlagSet::read(&mut self.reader, version)?;

        let mut scale = ScaleFactors {
            position: self.reader.read_f32()?,
            ..ScaleFactors::default()
        };
        if flags.contains(Flags::UV) {
            scale.texture = self.reader.read_f32()?;
        }
        if flags.contains(Flags::NORMALS) && version.at_least(10.0) {
            scale.normals = self.reader.read_f32()?;
        }

        let mesh_count = self.reader.read_u32()? as usize;

        debug!(
            "header parsed: version {}, flags {:?}, {} meshes",
            version,
            flags.flags(),
            mesh_count
        );

        Ok(Header {
            version,
            flags,
            scale,
            mesh_count,
        })
    }

    /// Decodes the whole stream. No partial scene is produced on error.
    ///
    /// # Errors
    ///
    /// Returns `Err` on the first malformed field, with the offset and the mesh or bone
    /// being read.
    pub fn decode(mut self) -> Result<Scene> {
        let Header {
            version,
            flags,
            mut scale,
            mesh_count,
        } = self.read_header()?;

        // the count isn't bounded, storage only grows with meshes actually present
        let mut meshes = Vec::new();
        for index in 0..mesh_count {
            let mesh = ModelMesh::read(&mut self.reader, version, flags, &mut scale)
                .map_err(|err| err.at(Location::Mesh(index)))?;

            debug!(
                "mesh {} `{}` parsed: {} vertices, {} polygons, {} links",
                index,
                mesh.name,
                mesh.vertex_count(),
                mesh.polygon_count(),
                mesh.max_links
            );
            meshes.push(mesh);
        }

        let skeleton = if flags.contains(Flags::SKELETON) {
            let skeleton = Skeleton::read(&mut self.reader)?;
            debug!("skeleton parsed: {} bones", skeleton.len());
            skeleton
        } else {
            Skeleton::default()
        };

        if self.reader.remaining() > 0 {
            trace!("ignoring {} trailing bytes", self.reader.remaining());
        }

        Ok(Scene {
            version,
            flags,
            scale,
            meshes,
            skeleton,
        })
    }
}

/// Decodes a little-endian model stream.
///
/// # Errors
///
/// Returns `Err` if the stream is malformed, see [`Decoder::decode`].
pub fn decode(bytes: &[u8]) -> Result<Scene> {
    Decoder::<LittleEndian>::new(bytes).decode()
}

/// Reads the header of a little-endian model stream.
///
/// # Errors
///
/// Returns `Err` if the header is malformed, see [`Decoder::read_header`].
pub fn read_header(bytes: &[u8]) -> Result<Header> {
    Decoder::<LittleEndian>::new(bytes).read_header()
}
