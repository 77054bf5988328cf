use std::io;

use quarry_model::Scene;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{feature} unsupported by {encoder}")]
    Unsupported {
        encoder: &'static str,
        feature: &'static str,
    },
}

/// Turns a decoded scene into an output format.
///
/// Encoders only get shared access to the scene. Derived data such as parent-relative
/// bone positions comes from [`Scene::skeleton_in`], so several encoders can run
/// against the same scene at once.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `Err` if the scene can't be expressed in this format.
    fn encode(&self, scene: &Scene) -> Result<Vec<u8>, EncodeError>;
}

/// Output of one encoder run by [`Batch::encode_all`](crate::Batch::encode_all).
#[derive(Debug)]
pub struct Encoded {
    pub encoder: &'static str,
    pub result: Result<Vec<u8>, EncodeError>,
}
