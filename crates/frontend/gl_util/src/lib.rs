//! OpenGL resource helpers for the emulator front-end
//!
//! This crate turns already-decoded video frames into textures and draws them.
//! It covers driver object creation with error checking, plus small wrappers
//! that own one driver object each.
//!
//! # Architecture
//!
//! ```text
//! Frame (pixels) -> Texture::set_data -> Program + TexturedQuad::draw -> screen
//!                                      \-> Framebuffer (offscreen passes)
//! ```
//!
//! - [`create`]: free functions that create textures, shaders, programs and
//!   framebuffers, cleaning up after themselves on failure
//! - [`Program`], [`Texture`], [`VertexBuffer`], [`TexturedQuad`],
//!   [`TexturedTriangleBatch`], [`Framebuffer`]: owning wrappers
//! - [`driver`]: the [`GlDriver`] seam, implemented by [`GlowDriver`] for a
//!   real context and [`HeadlessGl`] for tests and headless runs
//!
//! # Resource lifetime
//!
//! Wrappers share the driver through `Rc`, which keeps them on the thread that
//! owns the context. `destroy()` releases the object and may be called any
//! number of times; dropping a wrapper calls it too.
//!
//! # Errors
//!
//! Every fallible operation returns [`GlResult`]. Shader compile and program
//! link failures are also reported through the `log` facade at ERROR level
//! with the driver's diagnostic text.
//!
//! # Logging
//!
//! No logger is passed into the creation functions or wrappers. They write to
//! the process-wide `log` facade, and the host application installs the
//! backend once at start-up (for example `env_logger::init()`). Without an
//! installed logger the diagnostics are discarded, but the same text is still
//! returned in [`GlError::Compile`] and [`GlError::Link`].
//!
//! # Pixel transfers
//!
//! [`Texture::set_data`] and [`Texture::get_data`] set `UNPACK_ALIGNMENT`
//! and `PACK_ALIGNMENT` to 1 before every transfer, so client rows are always
//! tightly packed at the given pitch.

pub mod config;
pub mod create;
pub mod driver;
pub mod error;
pub mod framebuffer;
pub mod program;
pub mod texture;
pub mod vertex_buffer;

#[cfg(test)]
mod test_log;

pub use config::{FramebufferOptions, TextureFilter, VideoConfig};
pub use create::{
    create_framebuffer, create_program, create_shader, create_texture, FramebufferObjects,
    ShaderStage,
};
pub use driver::{GlDriver, GlowDriver, HeadlessGl};
pub use error::{GlError, GlResult};
pub use framebuffer::Framebuffer;
pub use program::{Attribute, Program, Uniform};
pub use texture::{bpp, texel_size, Texture};
pub use vertex_buffer::{
    quad_vertices, Rect, TexturedQuad, TexturedTriangleBatch, Vertex, VertexBuffer,
};
