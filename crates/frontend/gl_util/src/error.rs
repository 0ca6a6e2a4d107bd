//! Error type shared by every creation function and wrapper.

use crate::create::ShaderStage;
use thiserror::Error;

/// Result type for graphics resource operations
pub type GlResult<T> = Result<T, GlError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlError {
    /// The driver error flag was set (either already pending, or raised by the call)
    #[error("driver reported error 0x{0:04X}")]
    Driver(u32),
    /// The driver refused to hand out a new object name
    #[error("failed to create {kind}: {message}")]
    Create { kind: &'static str, message: String },
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    Link { log: String },
    #[error("framebuffer incomplete: status 0x{status:04X}")]
    IncompleteFramebuffer { status: u32 },
    #[error("unsupported pixel type 0x{0:04X}")]
    UnsupportedPixelType(u32),
    #[error("pixel buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("row pitch of {pitch} bytes cannot hold {width} pixels")]
    InvalidPitch { pitch: usize, width: usize },
    /// Host allocation failure
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),
    #[error("{0} has already been destroyed")]
    Destroyed(&'static str),
}
