//! Graphics driver binding layer
//!
//! Every helper in this crate talks to the GPU through [`GlDriver`], a narrow
//! trait covering exactly the OpenGL entry points the wrappers need. Two
//! implementations exist:
//!
//! - [`GlowDriver`]: forwards to a live `glow::Context`
//! - [`HeadlessGl`]: an in-memory driver used by tests and headless front-ends
//!
//! Handle types are associated types, so a wrapper can never mix handles from
//! different drivers. An absent handle is always `None`; no driver hands out
//! a zero name.

use std::fmt::Debug;

mod glow_driver;
pub mod headless;

pub use glow_driver::GlowDriver;
pub use headless::HeadlessGl;

/// The subset of OpenGL used by the resource helpers.
///
/// Method names and argument order follow `glow::HasContext` so the
/// production implementation is a direct forward.
pub trait GlDriver {
    type Texture: Copy + Debug + PartialEq;
    type Shader: Copy + Debug + PartialEq;
    type Program: Copy + Debug + PartialEq;
    type Buffer: Copy + Debug + PartialEq;
    type Framebuffer: Copy + Debug + PartialEq;
    type Renderbuffer: Copy + Debug + PartialEq;
    type UniformLocation: Clone + Debug;

    /// Return and clear the pending error flag (`NO_ERROR` when clean)
    fn get_error(&self) -> u32;

    // Textures
    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn delete_texture(&self, texture: Self::Texture);
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    fn active_texture(&self, unit: u32);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x_offset: i32,
        y_offset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    );
    fn get_tex_image(&self, target: u32, level: i32, format: u32, ty: u32, pixels: &mut [u8]);
    /// Set `PACK_ALIGNMENT` or `UNPACK_ALIGNMENT` for client-side pixel rows
    fn pixel_store_i32(&self, parameter: u32, value: i32);

    // Shaders and programs
    fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn validate_program(&self, program: Self::Program);
    fn get_program_link_status(&self, program: Self::Program) -> bool;
    fn get_program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);
    fn get_attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;
    fn get_uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn uniform_1_i32(&self, location: Option<&Self::UniformLocation>, value: i32);

    // Vertex buffers
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&self, index: u32);
    fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    // Framebuffers
    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<Self::Framebuffer>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<Self::Texture>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn create_renderbuffer(&self) -> Result<Self::Renderbuffer, String>;
    fn delete_renderbuffer(&self, renderbuffer: Self::Renderbuffer);
    fn bind_renderbuffer(&self, target: u32, renderbuffer: Option<Self::Renderbuffer>);
    fn renderbuffer_storage(&self, target: u32, internal_format: u32, width: i32, height: i32);
    fn framebuffer_renderbuffer(
        &self,
        target: u32,
        attachment: u32,
        renderbuffer_target: u32,
        renderbuffer: Option<Self::Renderbuffer>,
    );
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&self, mask: u32);
}

/// Check the driver error flag, turning a pending error into `Err`
pub(crate) fn check<G: GlDriver>(gl: &G) -> crate::GlResult<()> {
    match gl.get_error() {
        glow::NO_ERROR => Ok(()),
        code => Err(crate::GlError::Driver(code)),
    }
}
