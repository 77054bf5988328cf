use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::warn;
use walkdir::WalkDir;

use quarry_batch::{CancelToken, Error, Handler, Settings};
use quarry_model::Scene;

/// Decode every file in a directory and report the results
#[derive(Parser)]
pub struct Batch {
    dir: PathBuf,
    /// Worker threads, defaults to one per core
    #[clap(short, long, default_value = "0")]
    threads: usize,
}

#[derive(Clone)]
struct ReportHandler;

impl Handler for ReportHandler {
    fn handle_scene(&mut self, path: &Path, scene: Scene) {
        println!(
            "{}: version {}, {} meshes, {} vertices, {} polygons, {} bones",
            path.display(),
            scene.version,
            scene.meshes.len(),
            scene.vertex_count(),
            scene.polygon_count(),
            scene.skeleton.len()
        );
    }

    fn handle_error(&mut self, error: Error) {
        println!("{}", error);
    }
}

fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping directory entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();

    files.sort();
    files
}

pub fn batch(opts: &Batch) -> anyhow::Result<()> {
    let files = collect_files(&opts.dir);

    let mut settings = Settings::default();
    settings.threads(opts.threads);
    let batch = quarry_batch::Batch::new(settings)?;

    let summary = batch.decode_files(&files, ReportHandler, &CancelToken::new());

    println!("{} decoded, {} failed", summary.decoded, summary.failed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use quarry_test_utils::{fixture_dir, fixture_paths};

    use super::*;

    #[test]
    fn collects_nested_files_in_path_order() {
        let dir = fixture_dir([
            ("b.model", b"".as_ref()),
            ("a/c.model", b"".as_ref()),
            ("a.model", b"".as_ref()),
        ]);

        let files = collect_files(dir.path());

        // paths compare by component, the `a` directory sorts before `a.model`
        assert_eq!(
            files,
            fixture_paths(dir.path(), &["a/c.model", "a.model", "b.model"])
        );
    }
}
