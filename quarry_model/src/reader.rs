use std::{borrow::Cow, collections::BTreeMap, marker::PhantomData};

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use super::{Error, ErrorKind, Result};

/// Upper bound for counts read from the stream, checked before anything is allocated.
pub const MAX_COUNT: u32 = 0x40000;

/// Polygon index arrays up to this many indices are stored as u16.
const MAX_SHORT_INDICES: usize = 0xffff;

const WEIGHT_FACTOR: f32 = 255.0;

/// Width of a quantized vertex component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    I8,
    I16,
}

impl Component {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Component::I8 => 1,
            Component::I16 => 2,
        }
    }

    fn raw<B: ByteOrder>(self, bytes: &[u8]) -> f32 {
        match self {
            Component::I8 => f32::from(bytes[0] as i8),
            Component::I16 => f32::from(B::read_i16(bytes)),
        }
    }
}

/// Bone links of a single vertex, with global bone ids.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Link {
    pub bones: [u8; 4],
    pub weights: [f32; 4],
}

impl Link {
    fn new(
        raw_bones: &[u8],
        raw_weights: &[u8],
        local_to_global: &BTreeMap<u8, u8>,
        unmapped: &mut usize,
    ) -> Self {
        let mut link = Link::default();

        for (slot, (&bone, &weight)) in raw_bones.iter().zip(raw_weights).enumerate() {
            // a slot without weight never references a bone
            if weight == 0 {
                continue;
            }

            link.bones[slot] = local_to_global.get(&bone).copied().unwrap_or_else(|| {
                *unmapped += 1;
                0
            });
            link.weights[slot] = f32::from(weight) / WEIGHT_FACTOR;
        }

        link
    }
}

/// Forward-only cursor over a model stream.
///
/// Scalars are read in the byte order `B`. String length prefixes are always little-endian.
#[derive(Debug, Clone)]
pub struct Reader<'a, B = LittleEndian> {
    bytes: &'a [u8],
    position: usize,
    order: PhantomData<B>,
}

impl<'a, B: ByteOrder> Reader<'a, B> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            order: PhantomData,
        }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.position)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than `len` bytes remain. Nothing is consumed in that case.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.error(ErrorKind::TruncatedStream {
                needed: len,
                remaining: self.remaining(),
            }));
        }

        let bytes = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than `len` bytes remain.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// # Errors
    ///
    /// Returns `Err` if the stream is exhausted.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// # Errors
    ///
    /// Returns `Err` if the stream is exhausted.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.take(2).map(B::read_u16)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.take(4).map(B::read_u32)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than 4 bytes remain.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.take(4).map(B::read_f32)
    }

    /// # Errors
    ///
    /// Returns `Err` if fewer than 12 bytes remain.
    pub fn read_f32x3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Reads a string with a little-endian u16 length prefix.
    /// Invalid utf8 is replaced instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the prefix or the string bytes are truncated.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.position;
        let len = self.take(2).map(LittleEndian::read_u16)?;
        let bytes = self.take(len.into())?;

        match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(string) => Ok(string.to_owned()),
            Cow::Owned(string) => {
                warn!(offset = start, "string is not valid utf8, replacing invalid bytes");
                Ok(string)
            }
        }
    }

    /// Reads a u32 count, rejecting values above [`MAX_COUNT`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the count is truncated or too large.
    pub fn read_count(&mut self) -> Result<usize> {
        let start = self.position;
        let count = self.read_u32()?;

        if count > MAX_COUNT {
            return Err(Error::new(ErrorKind::CountLimitExceeded(count), start));
        }

        Ok(count as usize)
    }

    /// Reads `count` vertices of `N` quantized components each,
    /// dequantized as `raw * scale / factor`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the stream doesn't hold `count * N` components.
    pub fn read_quantized_vertices<const N: usize>(
        &mut self,
        component: Component,
        factor: f32,
        count: usize,
        scale: f32,
    ) -> Result<Vec<[f32; N]>> {
        let stride = N * component.size();
        let bytes = self.take(count.saturating_mul(stride))?;

        Ok(bytes
            .chunks_exact(stride)
            .map(|vertex| {
                let mut values = [0.0; N];
                for (value, raw) in values.iter_mut().zip(vertex.chunks_exact(component.size())) {
                    *value = component.raw::<B>(raw) * scale / factor;
                }
                values
            })
            .collect())
    }

    /// Reads `count` triangles. Indices are u16 when the mesh has at most 65535 of them,
    /// u32 otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the index array is truncated.
    pub fn read_polygon_indices(&mut self, count: usize) -> Result<Vec<[u32; 3]>> {
        let index_count = count.saturating_mul(3);

        let indices: Vec<u32> = if index_count <= MAX_SHORT_INDICES {
            self.take(index_count * 2)?
                .chunks_exact(2)
                .map(|bytes| u32::from(B::read_u16(bytes)))
                .collect()
        } else {
            self.take(index_count.saturating_mul(4))?
                .chunks_exact(4)
                .map(B::read_u32)
                .collect()
        };

        Ok(indices
            .chunks_exact(3)
            .map(|triangle| [triangle[0], triangle[1], triangle[2]])
            .collect())
    }

    /// Reads links stored as interleaved `[id0, id1, weight0, weight1]` groups,
    /// used when a mesh has at most 2 links per vertex.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the link data is truncated.
    pub fn read_packed_links(
        &mut self,
        count: usize,
        max_links: u8,
        local_to_global: &BTreeMap<u8, u8>,
    ) -> Result<Vec<Link>> {
        let start = self.position;
        let bytes = self.take(count.saturating_mul(4))?;

        let mut unmapped = 0;
        let links = bytes
            .chunks_exact(4)
            .map(|group| Link::new(&group[..2], &group[2..], local_to_global, &mut unmapped))
            .collect();

        report_unmapped(unmapped, start, max_links);
        Ok(links)
    }

    /// Reads links stored as a block of 4 ids per vertex followed by a block of 4 weights
    /// per vertex, used when a mesh has 3 or 4 links per vertex.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either block is truncated.
    pub fn read_plain_links(
        &mut self,
        count: usize,
        max_links: u8,
        local_to_global: &BTreeMap<u8, u8>,
    ) -> Result<Vec<Link>> {
        let start = self.position;
        let bones = self.take(count.saturating_mul(4))?;
        let weights = self.take(count.saturating_mul(4))?;

        let mut unmapped = 0;
        let links = bones
            .chunks_exact(4)
            .zip(weights.chunks_exact(4))
            .map(|(bones, weights)| Link::new(bones, weights, local_to_global, &mut unmapped))
            .collect();

        report_unmapped(unmapped, start, max_links);
        Ok(links)
    }

    /// Reads links in the layout selected by `max_links`.
    /// Returns `None` for meshes without links.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `max_links` is above 4 or the link data is truncated.
    pub fn read_links(
        &mut self,
        count: usize,
        max_links: u8,
        local_to_global: &BTreeMap<u8, u8>,
    ) -> Result<Option<Vec<Link>>> {
        match max_links {
            0 => Ok(None),
            1 | 2 => self
                .read_packed_links(count, max_links, local_to_global)
                .map(Some),
            3 | 4 => self
                .read_plain_links(count, max_links, local_to_global)
                .map(Some),
            _ => Err(self.error(ErrorKind::UnknownLinkCount(max_links))),
        }
    }
}

fn report_unmapped(unmapped: usize, offset: usize, max_links: u8) {
    if unmapped > 0 {
        warn!(
            offset,
            max_links, "{unmapped} weighted links reference unmapped local bones, using bone 0"
        );
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use byteorder::BigEndian;

    use quarry_test_utils::StreamWriter;

    use super::*;

    fn reader(bytes: &[u8]) -> Reader<'_> {
        Reader::new(bytes)
    }

    #[test]
    fn scalars_fail_when_truncated() {
        let bytes = [1, 2, 3];
        let mut reader = reader(&bytes);

        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        let error = reader.read_u32().unwrap_err();

        assert_eq!(
            error.kind,
            ErrorKind::TruncatedStream {
                needed: 4,
                remaining: 1
            }
        );
        assert_eq!(error.offset, 2);
        // a failed read consumes nothing
        assert_eq!(reader.read_u8().unwrap(), 3);
    }

    #[test]
    fn scalars_follow_byte_order() {
        let mut writer = StreamWriter::<BigEndian>::new();
        writer.u32(0xdead_beef).f32(1.5).u16(7);

        let mut reader = Reader::<BigEndian>::new(writer.bytes());
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert_relative_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_u16().unwrap(), 7);
    }

    #[test]
    fn string_prefix_is_little_endian_in_big_endian_stream() {
        let mut writer = StreamWriter::<BigEndian>::new();
        writer.string("root").u32(1);

        let mut reader = Reader::<BigEndian>::new(writer.bytes());
        assert_eq!(reader.read_string().unwrap(), "root");
        assert_eq!(reader.read_u32().unwrap(), 1);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut writer = StreamWriter::<LittleEndian>::new();
        writer.string_bytes(b"bo\xffne").u8(9);

        let mut reader = reader(writer.bytes());
        assert_eq!(reader.read_string().unwrap(), "bo\u{fffd}ne");
        assert_eq!(reader.read_u8().unwrap(), 9);
    }

    #[test]
    fn count_above_limit_is_rejected() {
        let mut writer = StreamWriter::<LittleEndian>::new();
        writer.u32(MAX_COUNT).u32(MAX_COUNT + 1);

        let mut reader = reader(writer.bytes());
        assert_eq!(reader.read_count().unwrap(), MAX_COUNT as usize);

        let error = reader.read_count().unwrap_err();
        assert_eq!(error.kind, ErrorKind::CountLimitExceeded(MAX_COUNT + 1));
        assert_eq!(error.offset, 4);
    }

    #[test]
    fn quantized_positions_use_scale_and_factor() {
        let mut writer = StreamWriter::<LittleEndian>::new();
        writer.position([16384, -32768, 8192]);

        let mut reader = reader(writer.bytes());
        let positions = reader
            .read_quantized_vertices::<4>(Component::I16, 32768.0, 1, 2.0)
            .unwrap();

        assert_eq!(positions.len(), 1);
        assert_relative_eq!(positions[0][0], 1.0);
        assert_relative_eq!(positions[0][1], -2.0);
        assert_relative_eq!(positions[0][2], 0.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn quantized_normals_are_signed_bytes() {
        let mut writer = StreamWriter::<LittleEndian>::new();
        writer.normal([-128, 64, 0]);

        let mut reader = reader(writer.bytes());
        let normals = reader
            .read_quantized_vertices::<4>(Component::I8, 128.0, 1, 1.0)
            .unwrap();

        assert_relative_eq!(normals[0][0], -1.0);
        assert_relative_eq!(normals[0][1], 0.5);
        assert_relative_eq!(normals[0][2], 0.0);
    }

    #[test]
    fn short_indices_up_to_65535() {
        // 21845 triangles = 65535 indices
        let count = 21845;
        let mut writer = StreamWriter::<LittleEndian>::new();
        for i in 0..count * 3 {
            writer.u16((i % 7) as u16);
        }
        writer.u8(0xaa);

        let mut reader = reader(writer.bytes());
        let polygons = reader.read_polygon_indices(count).unwrap();

        assert_eq!(polygons.len(), count);
        assert_eq!(polygons[1], [3, 4, 5]);
        assert_eq!(reader.read_u8().unwrap(), 0xaa);
    }

    #[test]
    fn long_indices_above_65535() {
        // 21846 triangles = 65538 indices
        let count = 21846;
        let mut writer = StreamWriter::<LittleEndian>::new();
        for i in 0..count * 3 {
            writer.u32(70_000 + i as u32);
        }

        let mut reader = reader(writer.bytes());
        let polygons = reader.read_polygon_indices(count).unwrap();

        assert_eq!(polygons.len(), count);
        assert_eq!(polygons[0], [70_000, 70_001, 70_002]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn packed_links_zero_unweighted_slots() {
        let bytes = [2, 0, 255, 0];
        let map = BTreeMap::from([(2, 9)]);

        let links = reader(&bytes).read_packed_links(1, 2, &map).unwrap();

        assert_eq!(links[0].bones, [9, 0, 0, 0]);
        assert_eq!(links[0].weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn packed_links_force_id_of_zero_weight_to_zero() {
        let bytes = [2, 5, 128, 0];
        let map = BTreeMap::from([(2, 9), (5, 11)]);

        let links = reader(&bytes).read_packed_links(1, 2, &map).unwrap();

        assert_eq!(links[0].bones, [9, 0, 0, 0]);
        assert_relative_eq!(links[0].weights[0], 128.0 / 255.0);
    }

    #[test]
    fn plain_links_read_separate_blocks() {
        let mut writer = StreamWriter::<LittleEndian>::new();
        // ids for two vertices, then weights for two vertices
        writer.raw(&[0, 1, 2, 3]).raw(&[3, 0, 0, 0]);
        writer.raw(&[64, 64, 64, 63]).raw(&[255, 0, 0, 0]);
        let map = BTreeMap::from([(0, 10), (1, 11), (2, 12), (3, 13)]);

        let links = reader(writer.bytes()).read_plain_links(2, 4, &map).unwrap();

        assert_eq!(links[0].bones, [10, 11, 12, 13]);
        assert_relative_eq!(links[0].weights.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_eq!(links[1].bones, [13, 0, 0, 0]);
        assert_eq!(links[1].weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn unmapped_bones_fall_back_to_zero() {
        let bytes = [7, 0, 255, 0];
        let map = BTreeMap::new();

        let links = reader(&bytes).read_packed_links(1, 1, &map).unwrap();

        assert_eq!(links[0].bones, [0, 0, 0, 0]);
        assert_eq!(links[0].weights[0], 1.0);
    }

    #[test]
    fn link_count_selects_layout() {
        let bytes = [0; 8];
        let map = BTreeMap::new();

        assert_eq!(reader(&bytes).read_links(1, 0, &map).unwrap(), None);

        let mut packed = reader(&bytes);
        packed.read_links(1, 2, &map).unwrap();
        assert_eq!(packed.position(), 4);

        let mut plain = reader(&bytes);
        plain.read_links(1, 3, &map).unwrap();
        assert_eq!(plain.position(), 8);

        let error = reader(&bytes).read_links(1, 5, &map).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnknownLinkCount(5));
    }
}
