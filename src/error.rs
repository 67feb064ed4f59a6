//! Crate-level error types.
//!
//! Setup failures are reported through [`NginError`] and abort construction of
//! whatever owns the failing resource. Applications usually bubble them up as
//! `anyhow::Error` from [`crate::flow::run`].

use std::fmt;

use crate::data_structures::cube_map::CubeFace;

/// Errors produced while building or rendering a scene.
#[derive(Debug)]
pub enum NginError {
    /// A texture, image or mesh file is missing or malformed.
    ResourceLoad { name: String, reason: String },
    /// A shader program could not be set up (unknown uniform, failed compile).
    ShaderLink { name: String, reason: String },
    /// A cube map was used before all six faces were supplied.
    MissingFace { cube_map: String, face: CubeFace },
    /// Adapter, device or surface setup failed.
    Gpu(String),
}

impl NginError {
    pub fn resource(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ResourceLoad {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn shader(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ShaderLink {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for NginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceLoad { name, reason } => {
                write!(f, "failed to load resource '{name}': {reason}")
            }
            Self::ShaderLink { name, reason } => {
                write!(f, "failed to link shader program '{name}': {reason}")
            }
            Self::MissingFace { cube_map, face } => {
                write!(f, "cube map '{cube_map}' has no image for face {face}")
            }
            Self::Gpu(msg) => write!(f, "GPU error: {msg}"),
        }
    }
}

impl std::error::Error for NginError {}

pub type Result<T> = std::result::Result<T, NginError>;
