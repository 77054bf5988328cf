use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;

use quarry_model::{read_header, Header, Scene, Space};

/// Print the contents of a model stream
#[derive(Parser)]
pub struct Dump {
    path: PathBuf,
    /// Print the skeleton
    #[clap(short, long)]
    bones: bool,
    /// Print bone positions relative to their parent
    #[clap(short, long)]
    local: bool,
    /// Stop after the header
    #[clap(long)]
    header_only: bool,
}

pub fn dump(opts: &Dump) -> anyhow::Result<()> {
    let bytes =
        fs::read(&opts.path).with_context(|| format!("reading `{}`", opts.path.display()))?;

    if opts.header_only {
        let header = read_header(&bytes)
            .with_context(|| format!("reading header of `{}`", opts.path.display()))?;
        print_header(&header);
        return Ok(());
    }

    let scene = quarry_model::decode(&bytes)
        .with_context(|| format!("decoding `{}`", opts.path.display()))?;

    print_scene(&scene);

    if opts.bones {
        let space = if opts.local {
            Space::Local
        } else {
            Space::Global
        };
        print_bones(&scene, space);
    }

    Ok(())
}

fn print_header(header: &Header) {
    println!("version: {}", header.version);
    println!("flags: {:?}", header.flags.flags());
    println!("scale: {:?}", header.scale);
    println!("meshes: {}", header.mesh_count);
}

fn print_scene(scene: &Scene) {
    println!("version: {}", scene.version);
    println!("flags: {:?}", scene.flags.flags());
    println!("scale: {:?}", scene.scale);

    for (index, mesh) in scene.meshes.iter().enumerate() {
        println!(
            "mesh {} `{}` ({}): {} vertices, {} polygons, {} links, {} local bones",
            index,
            mesh.name,
            mesh.material,
            mesh.vertex_count(),
            mesh.polygon_count(),
            mesh.max_links,
            mesh.local_bone_count()
        );
    }

    if let Some((min, max)) = scene.bounds() {
        println!("bounds: {} .. {}", min, max);
    }
    println!("bones: {}", scene.skeleton.len());
}

fn print_bones(scene: &Scene, space: Space) {
    let skeleton = scene.skeleton_in(space);
    let hierarchy = skeleton.hierarchy();

    for id in hierarchy.depth_first() {
        let bone = &skeleton.bones()[id];
        println!(
            "{:indent$}{} `{}` position {} rotation {}",
            "",
            bone.id,
            bone.name,
            bone.position,
            bone.rotation,
            indent = hierarchy.depth(id) * 2
        );
    }
}
