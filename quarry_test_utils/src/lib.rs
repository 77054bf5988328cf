use std::{
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tempfile::TempDir;

/// Writes model stream fixtures field by field.
///
/// Scalars use the byte order `B`, string length prefixes are always little-endian,
/// matching what the decoder expects.
#[derive(Debug, Clone)]
pub struct StreamWriter<B = LittleEndian> {
    bytes: Vec<u8>,
    order: PhantomData<B>,
}

impl<B: ByteOrder> StreamWriter<B> {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            order: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn i8(&mut self, value: i8) -> &mut Self {
        self.bytes.write_i8(value).unwrap();
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes.write_u16::<B>(value).unwrap();
        self
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.bytes.write_i16::<B>(value).unwrap();
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.write_u32::<B>(value).unwrap();
        self
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.write_f32::<B>(value).unwrap();
        self
    }

    pub fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for &value in values {
            self.f32(value);
        }
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.string_bytes(value.as_bytes())
    }

    /// Writes a length-prefixed string from raw bytes, which don't need to be valid utf8.
    pub fn string_bytes(&mut self, value: &[u8]) -> &mut Self {
        let len = u16::try_from(value.len()).expect("fixture string too long");
        self.bytes.write_u16::<LittleEndian>(len).unwrap();
        self.raw(value)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.write_all(bytes).unwrap();
        self
    }

    pub fn zeros(&mut self, count: usize) -> &mut Self {
        self.bytes.resize(self.bytes.len() + count, 0);
        self
    }

    /// Writes a quantized position (x, y, z and the discarded delimiter).
    pub fn position(&mut self, raw: [i16; 3]) -> &mut Self {
        self.i16(raw[0]).i16(raw[1]).i16(raw[2]).i16(0)
    }

    pub fn uv(&mut self, raw: [i16; 2]) -> &mut Self {
        self.i16(raw[0]).i16(raw[1])
    }

    /// Writes a quantized normal (x, y, z and the discarded delimiter).
    pub fn normal(&mut self, raw: [i8; 3]) -> &mut Self {
        self.i8(raw[0]).i8(raw[1]).i8(raw[2]).i8(0)
    }

    /// Writes the file header up to and including the mesh count.
    #[allow(clippy::too_many_arguments)]
    pub fn header(
        &mut self,
        signature: u32,
        version: f32,
        flags: &[bool],
        position_scale: f32,
        texture_scale: Option<f32>,
        normals_scale: Option<f32>,
        mesh_count: u32,
    ) -> &mut Self {
        self.u32(signature).f32(version);
        for &flag in flags {
            self.bool(flag);
        }
        self.f32(position_scale);
        if let Some(scale) = texture_scale {
            self.f32(scale);
        }
        if let Some(scale) = normals_scale {
            self.f32(scale);
        }
        self.u32(mesh_count)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl<B: ByteOrder> Default for StreamWriter<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// A version 7 stream with uv and normals: one mesh holding one triangle.
pub fn triangle_stream(signature: u32) -> Vec<u8> {
    let mut writer = StreamWriter::<LittleEndian>::new();

    writer
        .header(signature, 7.0, &[false, true, true, false], 1.0, Some(1.0), None, 1)
        .string("triangle")
        .string("stone")
        .u32(3)
        .u32(1)
        .f32(1.0);

    writer
        .position([0, 0, 0])
        .position([16384, 0, 0])
        .position([0, 16384, 0]);
    writer.uv([0, 0]).uv([32767, 0]).uv([0, 32767]);
    writer
        .normal([0, 0, 127])
        .normal([0, 0, 127])
        .normal([0, 0, 127]);
    writer.u16(0).u16(1).u16(2);

    writer.into_bytes()
}

/// Writes fixture files into a fresh temporary directory.
pub fn fixture_dir<'a>(files: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    for (name, bytes) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, bytes).unwrap();
    }

    dir
}

pub fn fixture_paths(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|name| dir.join(name)).collect()
}
