use std::collections::BTreeMap;

use byteorder::ByteOrder;
use tracing::trace;

use super::{
    reader::{Component, Link, Reader},
    scene::ScaleFactors,
    version::{FlagSet, Flags, ModelVersion},
    Error, ErrorKind, Result,
};

const POSITION_FACTOR: f32 = 32768.0;
const UV_FACTOR: f32 = 32768.0;
const NORMAL_FACTOR: f32 = 128.0;
const MAX_LINKS: u8 = 4;

/// Size of the per-mesh block stored from version 10 on, contents unknown.
const LOCALS_SIZE: usize = 24;
/// Extra bytes of the locals block from version 11 on.
const LOCALS_EXTRA_SIZE: usize = 4;
/// Stride of the per-vertex tangent, bitangent and color arrays, which are skipped.
const SKIPPED_ATTRIBUTE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Global bone ids, 0 for slots without weight.
    pub bone_ids: [u8; 4],
    pub bone_weights: [f32; 4],
}

/// A triangle of 0-based vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Polygon {
    pub indices: [u32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMesh {
    pub name: String,
    pub material: String,
    /// Links per vertex the mesh was stored with, 0 without a skeleton.
    pub max_links: u8,
    /// Mesh-local bone index to skeleton bone id.
    pub local_to_global: BTreeMap<u8, u8>,
    /// The unconfirmed float stored with uv meshes.
    pub weight_scale: Option<f32>,
    pub vertices: Vec<Vertex>,
    pub polygons: Vec<Polygon>,
}

impl ModelMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    #[must_use]
    pub fn local_bone_count(&self) -> usize {
        self.local_to_global.len()
    }

    /// Skeleton bone id of a mesh-local bone.
    #[must_use]
    pub fn global_bone(&self, local: u8) -> Option<u8> {
        self.local_to_global.get(&local).copied()
    }

    /// Reads one mesh. The field order is fixed, each flag adds or removes fields.
    ///
    /// The uv-gated float is stored in `scale.weight`, so the last mesh read wins.
    pub(crate) fn read<B: ByteOrder>(
        reader: &mut Reader<B>,
        version: ModelVersion,
        flags: FlagSet,
        scale: &mut ScaleFactors,
    ) -> Result<Self> {
        let name = reader.read_string()?;
        let material = reader.read_string()?;

        let (max_links, local_to_global) = if flags.contains(Flags::SKELETON) {
            let links_offset = reader.position();
            let max_links = reader.read_u8()?;
            if max_links > MAX_LINKS {
                return Err(Error::new(ErrorKind::UnknownLinkCount(max_links), links_offset));
            }
            let local_bone_count = reader.read_u8()?;

            let mut local_to_global = BTreeMap::new();
            for local in 0..local_bone_count {
                local_to_global.insert(local, reader.read_u8()?);
            }

            (max_links, local_to_global)
        } else {
            (0, BTreeMap::new())
        };

        let vertex_count = reader.read_count()?;
        let polygon_count = reader.read_count()?;

        let weight_scale = if flags.contains(Flags::UV) {
            let weight_scale = reader.read_f32()?;
            scale.weight = weight_scale;
            Some(weight_scale)
        } else {
            None
        };

        if version.at_least(10.0) {
            trace!("skipping locals");
            reader.skip(LOCALS_SIZE)?;
            if version.at_least(11.0) {
                reader.skip(LOCALS_EXTRA_SIZE)?;
            }
        }

        let positions = reader.read_quantized_vertices::<4>(
            Component::I16,
            POSITION_FACTOR,
            vertex_count,
            scale.position,
        )?;

        let uvs = if flags.contains(Flags::UV) {
            Some(reader.read_quantized_vertices::<2>(
                Component::I16,
                UV_FACTOR,
                vertex_count,
                scale.texture,
            )?)
        } else {
            None
        };

        if flags.contains(Flags::BITANGENTS) {
            trace!("skipping bitangents");
            reader.skip(vertex_count * SKIPPED_ATTRIBUTE_SIZE)?;
        }

        // normals are stored normalized, the normals scale doesn't apply
        let normals = if flags.contains(Flags::NORMALS) {
            Some(reader.read_quantized_vertices::<4>(
                Component::I8,
                NORMAL_FACTOR,
                vertex_count,
                1.0,
            )?)
        } else {
            None
        };

        if flags.contains(Flags::TANGENTS) {
            trace!("skipping tangents");
            reader.skip(vertex_count * SKIPPED_ATTRIBUTE_SIZE)?;
        }

        let links = if flags.contains(Flags::SKELETON) {
            reader.read_links(vertex_count, max_links, &local_to_global)?
        } else {
            None
        };

        if flags.contains(Flags::COLORS) {
            trace!("skipping vertex colors");
            reader.skip(vertex_count * SKIPPED_ATTRIBUTE_SIZE)?;
        }

        let polygons = reader
            .read_polygon_indices(polygon_count)?
            .into_iter()
            .map(|indices| Polygon { indices })
            .collect();

        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, position)| {
                let mut vertex = Vertex {
                    position: [position[0], position[1], position[2]],
                    ..Vertex::default()
                };
                if let Some(uvs) = &uvs {
                    vertex.uv = uvs[i];
                }
                if let Some(normals) = &normals {
                    vertex.normal = [normals[i][0], normals[i][1], normals[i][2]];
                }
                if let Some(links) = &links {
                    let Link { bones, weights } = links[i];
                    vertex.bone_ids = bones;
                    vertex.bone_weights = weights;
                }
                vertex
            })
            .collect();

        Ok(Self {
            name,
            material,
            max_links,
            local_to_global,
            weight_scale,
            vertices,
            polygons,
        })
    }
}
