use std::borrow::Cow;

use glam::Vec3;

use super::{
    mesh::ModelMesh,
    skeleton::{Skeleton, Space},
    version::{FlagSet, ModelVersion},
};

/// Multipliers used to dequantize vertex fields. Absent factors stay at 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub position: f32,
    pub texture: f32,
    /// Read for stream alignment, normals are decoded without it.
    pub normals: f32,
    /// The unconfirmed float stored with uv meshes, from the last such mesh.
    pub weight: f32,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        Self {
            position: 1.0,
            texture: 1.0,
            normals: 1.0,
            weight: 1.0,
        }
    }
}

/// A fully decoded model stream.
///
/// Consumers that need bone positions in another space go through
/// [`Scene::skeleton_in`], which never touches the decoded skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub version: ModelVersion,
    pub flags: FlagSet,
    pub scale: ScaleFactors,
    pub meshes: Vec<ModelMesh>,
    /// Empty unless the skeleton flag is set.
    pub skeleton: Skeleton,
}

impl Scene {
    /// The skeleton with positions in `space`, copied only when a conversion is needed.
    #[must_use]
    pub fn skeleton_in(&self, space: Space) -> Cow<'_, Skeleton> {
        if self.skeleton.space() == space {
            Cow::Borrowed(&self.skeleton)
        } else {
            Cow::Owned(self.skeleton.in_space(space))
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(ModelMesh::vertex_count).sum()
    }

    #[must_use]
    pub fn polygon_count(&self) -> usize {
        self.meshes.iter().map(ModelMesh::polygon_count).sum()
    }

    /// Axis-aligned bounds of every vertex position, `None` for a scene without vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.meshes
            .iter()
            .flat_map(|mesh| &mesh.vertices)
            .map(|vertex| Vec3::from(vertex.position))
            .fold(None, |bounds, position| match bounds {
                Some((min, max)) => Some((position.min(min), position.max(max))),
                None => Some((position, position)),
            })
    }
}
