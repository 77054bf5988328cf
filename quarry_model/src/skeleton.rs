use byteorder::ByteOrder;
use glam::Vec3;
use itertools::Itertools;

use super::{reader::Reader, Error, ErrorKind, Location, Result};

/// Coordinate space of bone positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Space {
    /// Positions are in model space.
    #[default]
    Global,
    /// Positions are relative to the parent bone.
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone {
    /// Index of the bone in parse order.
    pub id: usize,
    pub name: String,
    /// `None` for root bones.
    pub parent: Option<usize>,
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
}

impl SkeletonBone {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn read<B: ByteOrder>(reader: &mut Reader<B>, id: usize) -> Result<Self> {
        let name = reader.read_string()?;

        let parent_offset = reader.position();
        let parent = reader.read_u8()?;
        let parent = match usize::from(parent) {
            // bones store their own id as the parent when they have none
            parent if parent == id => None,
            parent if parent < id => Some(parent),
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidBoneParent { parent },
                    parent_offset,
                ))
            }
        };

        let position = Vec3::from(reader.read_f32x3()?);
        let rotation = Vec3::from(reader.read_f32x3()?);

        Ok(Self {
            id,
            name,
            parent,
            position,
            rotation,
        })
    }
}

/// Bones stored by id. Parents always precede their children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    bones: Vec<SkeletonBone>,
    space: Space,
}

impl Skeleton {
    pub(crate) fn read<B: ByteOrder>(reader: &mut Reader<B>) -> Result<Self> {
        let count = reader
            .read_u8()
            .map_err(|err| err.at(Location::Skeleton))?;

        let bones = (0..usize::from(count))
            .map(|id| SkeletonBone::read(reader, id).map_err(|err| err.at(Location::Bone(id))))
            .try_collect()?;

        Ok(Self {
            bones,
            space: Space::Global,
        })
    }

    #[must_use]
    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&SkeletonBone> {
        self.bones.get(id)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SkeletonBone> {
        self.bones.iter().find(|bone| bone.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[must_use]
    pub fn space(&self) -> Space {
        self.space
    }

    pub fn roots(&self) -> impl Iterator<Item = &SkeletonBone> {
        self.bones.iter().filter(|bone| bone.is_root())
    }

    /// Links every bone to its parent. The skeleton itself is left untouched.
    #[must_use]
    pub fn hierarchy(&self) -> Hierarchy {
        let mut children = vec![Vec::new(); self.bones.len()];
        let mut roots = Vec::new();

        for bone in &self.bones {
            match bone.parent {
                Some(parent) => children[parent].push(bone.id),
                None => roots.push(bone.id),
            }
        }

        Hierarchy {
            parents: self.bones.iter().map(|bone| bone.parent).collect(),
            children,
            roots,
        }
    }

    /// Returns a copy with positions relative to the parent bone.
    #[must_use]
    pub fn to_local(&self) -> Skeleton {
        if self.space == Space::Local {
            return self.clone();
        }

        let bones = self
            .bones
            .iter()
            .map(|bone| SkeletonBone {
                position: match bone.parent {
                    Some(parent) => bone.position - self.bones[parent].position,
                    None => bone.position,
                },
                ..bone.clone()
            })
            .collect();

        Skeleton {
            bones,
            space: Space::Local,
        }
    }

    /// Returns a copy with positions in model space.
    #[must_use]
    pub fn to_global(&self) -> Skeleton {
        if self.space == Space::Global {
            return self.clone();
        }

        let mut bones: Vec<SkeletonBone> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            // parents precede children, so the parent is already global
            let position = match bone.parent {
                Some(parent) => bone.position + bones[parent].position,
                None => bone.position,
            };
            bones.push(SkeletonBone {
                position,
                ..bone.clone()
            });
        }

        Skeleton {
            bones,
            space: Space::Global,
        }
    }

    #[must_use]
    pub fn in_space(&self, space: Space) -> Skeleton {
        match space {
            Space::Global => self.to_global(),
            Space::Local => self.to_local(),
        }
    }
}

/// Parent and children links of a [`Skeleton`], by bone id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hierarchy {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl Hierarchy {
    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// # Panics
    ///
    /// Panics if `id` is not a bone of the skeleton.
    #[must_use]
    pub fn children(&self, id: usize) -> &[usize] {
        &self.children[id]
    }

    #[must_use]
    pub fn parent(&self, id: usize) -> Option<usize> {
        self.parents.get(id).copied().flatten()
    }

    /// Ancestors of a bone, nearest first.
    pub fn ancestors(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.parent(id);
            Some(id)
        })
    }

    #[must_use]
    pub fn depth(&self, id: usize) -> usize {
        self.ancestors(id).count()
    }

    /// Bone ids in depth-first order, every parent before its children.
    #[must_use]
    pub fn depth_first(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.parents.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children[id].iter().rev());
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use byteorder::LittleEndian;

    use quarry_test_utils::StreamWriter;

    use super::*;

    fn write_bone(writer: &mut StreamWriter, name: &str, parent: u8, position: [f32; 3]) {
        writer
            .string(name)
            .u8(parent)
            .f32s(&position)
            .f32s(&[0.0, 90.0, 0.0]);
    }

    /// root(0) -> spine(1) -> head(2), root(0) -> leg(3), and a second root prop(4)
    fn sample() -> Skeleton {
        let mut writer: StreamWriter = StreamWriter::new();
        writer.u8(5);
        write_bone(&mut writer, "root", 0, [0.0, 0.0, 1.0]);
        write_bone(&mut writer, "spine", 0, [0.0, 0.0, 3.0]);
        write_bone(&mut writer, "head", 1, [0.0, 1.0, 5.0]);
        write_bone(&mut writer, "leg", 0, [1.0, 0.0, 0.0]);
        write_bone(&mut writer, "prop", 4, [2.0, 2.0, 2.0]);

        let mut reader = Reader::<LittleEndian>::new(writer.bytes());
        let skeleton = Skeleton::read(&mut reader).unwrap();
        assert_eq!(reader.remaining(), 0);
        skeleton
    }

    #[test]
    fn parses_bones_in_order() {
        let skeleton = sample();

        assert_eq!(skeleton.len(), 5);
        assert_eq!(skeleton.space(), Space::Global);

        let head = skeleton.find("head").unwrap();
        assert_eq!(head.id, 2);
        assert_eq!(head.parent, Some(1));
        assert_relative_eq!(head.position, Vec3::new(0.0, 1.0, 5.0));
        assert_relative_eq!(head.rotation, Vec3::new(0.0, 90.0, 0.0));
    }

    #[test]
    fn self_parented_bones_are_roots() {
        let skeleton = sample();
        let hierarchy = skeleton.hierarchy();

        let roots: Vec<_> = skeleton.roots().map(|bone| bone.id).collect();
        assert_eq!(roots, [0, 4]);
        assert_eq!(hierarchy.roots(), [0, 4]);

        // every other bone is the child of exactly one bone
        for bone in skeleton.bones().iter().filter(|bone| !bone.is_root()) {
            let parents = (0..skeleton.len())
                .filter(|&id| hierarchy.children(id).contains(&bone.id))
                .count();
            assert_eq!(parents, 1, "bone {}", bone.name);
        }

        assert_eq!(hierarchy.children(0), [1, 3]);
        assert_eq!(hierarchy.children(1), [2]);
        assert!(hierarchy.children(4).is_empty());
    }

    #[test]
    fn hierarchy_is_repeatable() {
        let skeleton = sample();

        assert_eq!(skeleton.hierarchy(), skeleton.hierarchy());
    }

    #[test]
    fn traversal_visits_parents_first() {
        let hierarchy = sample().hierarchy();

        assert_eq!(hierarchy.depth_first(), [0, 1, 2, 3, 4]);
        assert_eq!(hierarchy.ancestors(2).collect::<Vec<_>>(), [1, 0]);
        assert_eq!(hierarchy.depth(2), 2);
        assert_eq!(hierarchy.depth(4), 0);
    }

    #[test]
    fn local_positions_are_parent_relative() {
        let skeleton = sample();
        let local = skeleton.to_local();

        assert_eq!(local.space(), Space::Local);
        assert_relative_eq!(local.bones()[0].position, Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(local.bones()[1].position, Vec3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(local.bones()[2].position, Vec3::new(0.0, 1.0, 2.0));
        assert_relative_eq!(local.bones()[3].position, Vec3::new(1.0, 0.0, -1.0));

        // the source skeleton is untouched
        assert_relative_eq!(skeleton.bones()[2].position, Vec3::new(0.0, 1.0, 5.0));
    }

    #[test]
    fn conversion_is_idempotent() {
        let skeleton = sample();
        let local = skeleton.to_local();

        assert_eq!(local.to_local(), local);
        assert_eq!(local.to_global(), skeleton);
        assert_eq!(skeleton.in_space(Space::Global), skeleton);
    }

    #[test]
    fn forward_parent_is_rejected() {
        let mut writer: StreamWriter = StreamWriter::new();
        writer.u8(2);
        write_bone(&mut writer, "a", 1, [0.0; 3]);
        write_bone(&mut writer, "b", 1, [0.0; 3]);

        let mut reader = Reader::<LittleEndian>::new(writer.bytes());
        let error = Skeleton::read(&mut reader).unwrap_err();

        assert_eq!(error.kind, ErrorKind::InvalidBoneParent { parent: 1 });
        assert_eq!(error.location, Location::Bone(0));
        assert_eq!(error.offset, 4);
    }

    #[test]
    fn truncated_bone_reports_ordinal() {
        let mut writer: StreamWriter = StreamWriter::new();
        writer.u8(2);
        write_bone(&mut writer, "a", 0, [0.0; 3]);
        writer.string("b").u8(0).f32(1.0);

        let mut reader = Reader::<LittleEndian>::new(writer.bytes());
        let error = Skeleton::read(&mut reader).unwrap_err();

        assert!(matches!(error.kind, ErrorKind::TruncatedStream { .. }));
        assert_eq!(error.location, Location::Bone(1));
    }
}
