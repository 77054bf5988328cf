//! Decodes many model stream files on a thread pool.
//!
//! Every file is decoded independently, results go to a [`Handler`] as they come in.
//! A failing file never stops the batch.

mod encode;

pub use encode::{EncodeError, Encoded, Encoder};

use std::{
    fs, io,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use quarry_model::{Scene, Space};
use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPoolBuildError,
};
use thiserror::Error;
use tracing::{debug, debug_span, error};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io { path: String, error: String },
    #[error("model `{path}`: {error}")]
    Decode {
        path: String,
        error: quarry_model::Error,
    },
}

impl Error {
    fn from_io(err: &io::Error, path: &Path) -> Self {
        Self::Io {
            path: path.display().to_string(),
            error: err.to_string(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Error::Io { path, .. } | Error::Decode { path, .. } => path,
        }
    }
}

/// Reads and decodes a single file.
///
/// # Errors
///
/// Returns `Err` if the file can't be read or isn't a valid model stream.
pub fn decode_file(path: &Path) -> Result<Scene, Error> {
    let bytes = fs::read(path).map_err(|err| Error::from_io(&err, path))?;

    quarry_model::decode(&bytes).map_err(|error| Error::Decode {
        path: path.display().to_string(),
        error,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    threads: usize,
    skeleton_space: Space,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: 0,
            skeleton_space: Space::Global,
        }
    }
}

impl Settings {
    /// Worker threads of the pool, 0 uses one per core.
    pub fn threads(&mut self, threads: usize) {
        self.threads = threads;
    }

    /// Space of the skeletons of scenes given to the handler.
    pub fn skeleton_space(&mut self, skeleton_space: Space) {
        self.skeleton_space = skeleton_space;
    }
}

/// Receives the results of a batch. Cloned for every worker thread.
pub trait Handler: Clone + Send {
    fn handle_scene(&mut self, path: &Path, scene: Scene);

    fn handle_error(&mut self, error: Error) {
        error!("{}", error);
    }
}

/// Stops a running batch before its next file.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub decoded: usize,
    pub failed: usize,
    /// Files never started because the batch was cancelled.
    pub cancelled: usize,
}

#[derive(Default)]
struct Counters {
    decoded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
}

impl Counters {
    fn summary(&self) -> Summary {
        Summary {
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

pub struct Batch {
    settings: Settings,
    tp: rayon::ThreadPool,
}

impl Batch {
    /// # Errors
    ///
    /// Returns `Err` if the thread pool can't be created.
    pub fn new(settings: Settings) -> Result<Self, ThreadPoolBuildError> {
        let tp = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("model decoder {}", index))
            .num_threads(settings.threads)
            .build()?;

        Ok(Self { settings, tp })
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.tp.current_num_threads()
    }

    /// Decodes every file in parallel. Blocks until all files are handled or skipped.
    pub fn decode_files<P, H>(&self, paths: &[P], handler: H, cancel: &CancelToken) -> Summary
    where
        P: AsRef<Path> + Sync,
        H: Handler,
    {
        let counters = Counters::default();

        self.tp.install(|| {
            paths.par_iter().for_each_with(handler, |handler, path| {
                self.decode_one(path.as_ref(), handler, cancel, &counters);
            });
        });

        let summary = counters.summary();
        debug!(
            "batch finished: {} decoded, {} failed, {} cancelled",
            summary.decoded, summary.failed, summary.cancelled
        );
        summary
    }

    fn decode_one<H: Handler>(
        &self,
        path: &Path,
        handler: &mut H,
        cancel: &CancelToken,
        counters: &Counters,
    ) {
        if cancel.is_cancelled() {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let _span = debug_span!("decode", path = %path.display()).entered();

        match decode_file(path) {
            Ok(mut scene) => {
                if scene.skeleton.space() != self.settings.skeleton_space {
                    scene.skeleton = scene.skeleton.in_space(self.settings.skeleton_space);
                }

                debug!(
                    "decoded {} meshes, {} bones",
                    scene.meshes.len(),
                    scene.skeleton.len()
                );
                counters.decoded.fetch_add(1, Ordering::Relaxed);
                handler.handle_scene(path, scene);
            }
            Err(error) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                handler.handle_error(error);
            }
        }
    }

    /// Runs every encoder against the same scene concurrently.
    /// Results are in the order of `encoders`.
    pub fn encode_all(&self, scene: &Scene, encoders: &[&dyn Encoder]) -> Vec<Encoded> {
        self.tp.install(|| {
            encoders
                .par_iter()
                .map(|encoder| {
                    let _span = debug_span!("encode", encoder = encoder.name()).entered();

                    Encoded {
                        encoder: encoder.name(),
                        result: encoder.encode(scene),
                    }
                })
                .collect()
        })
    }
}
