use std::{fs, io::Write, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use quarry_batch::{EncodeError, Encoder};
use quarry_model::{Flags, Scene};

/// Convert a model stream to Wavefront OBJ
#[derive(Parser)]
pub struct Obj {
    path: PathBuf,
    #[clap(short, long)]
    output: PathBuf,
}

pub fn obj(opts: &Obj) -> anyhow::Result<()> {
    let scene = quarry_batch::decode_file(&opts.path)?;

    let bytes = ObjEncoder.encode(&scene)?;
    fs::write(&opts.output, &bytes)
        .with_context(|| format!("writing `{}`", opts.output.display()))?;

    debug!("wrote {} bytes to `{}`", bytes.len(), opts.output.display());
    Ok(())
}

/// Writes every mesh as an OBJ object. The skeleton and bone links are dropped.
pub struct ObjEncoder;

impl Encoder for ObjEncoder {
    fn name(&self) -> &'static str {
        "obj"
    }

    fn encode(&self, scene: &Scene) -> Result<Vec<u8>, EncodeError> {
        let has_uv = scene.flags.contains(Flags::UV);
        let has_normals = scene.flags.contains(Flags::NORMALS);

        let mut out = Vec::new();
        // obj indices are 1-based and shared by every object in the file
        let mut base = 1;

        for mesh in &scene.meshes {
            writeln!(out, "o {}", mesh.name)?;
            writeln!(out, "usemtl {}", mesh.material)?;

            for vertex in &mesh.vertices {
                let [x, y, z] = vertex.position;
                writeln!(out, "v {} {} {}", x, y, z)?;
            }
            if has_uv {
                for vertex in &mesh.vertices {
                    let [u, v] = vertex.uv;
                    writeln!(out, "vt {} {}", u, v)?;
                }
            }
            if has_normals {
                for vertex in &mesh.vertices {
                    let [x, y, z] = vertex.normal;
                    writeln!(out, "vn {} {} {}", x, y, z)?;
                }
            }

            for polygon in &mesh.polygons {
                out.write_all(b"f")?;
                for index in polygon.indices {
                    let index = u64::from(index) + base;
                    match (has_uv, has_normals) {
                        (true, true) => write!(out, " {0}/{0}/{0}", index)?,
                        (true, false) => write!(out, " {0}/{0}", index)?,
                        (false, true) => write!(out, " {0}//{0}", index)?,
                        (false, false) => write!(out, " {}", index)?,
                    }
                }
                out.write_all(b"\n")?;
            }

            base += mesh.vertices.len() as u64;
        }

        Ok(out)
    }
}
