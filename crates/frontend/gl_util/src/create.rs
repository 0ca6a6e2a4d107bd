//! Driver object creation with error checking
//!
//! Each function follows the same contract:
//!
//! - if the driver error flag is already set on entry, return
//!   `Err(GlError::Driver)` without issuing any other call
//! - on failure, delete whatever was created before returning `Err`
//! - shader compile and program link failures log the driver's diagnostic
//!   text at ERROR level

use crate::config::TextureFilter;
use crate::driver::{check, GlDriver};
use crate::error::{GlError, GlResult};
use log::{debug, error};
use std::fmt;

/// Driver info logs are read into a 4 KiB buffer including the terminator
const MAX_INFO_LOG_BYTES: usize = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Objects created by [`create_framebuffer`]
pub struct FramebufferObjects<G: GlDriver> {
    pub framebuffer: G::Framebuffer,
    /// Depth (or depth/stencil) storage, when requested
    pub renderbuffer: Option<G::Renderbuffer>,
}

fn truncate_info_log(mut log: String) -> String {
    if log.len() > MAX_INFO_LOG_BYTES {
        let mut end = MAX_INFO_LOG_BYTES;
        while !log.is_char_boundary(end) {
            end -= 1;
        }
        log.truncate(end);
    }
    log.trim_end().to_string()
}

/// Create a 2D texture with storage allocated but no pixels uploaded.
///
/// The texture is left bound to `TEXTURE_2D`.
pub fn create_texture<G: GlDriver>(
    gl: &G,
    width: i32,
    height: i32,
    internal_format: i32,
    format: u32,
    ty: u32,
    filter: TextureFilter,
) -> GlResult<G::Texture> {
    check(gl)?;

    let texture = gl
        .create_texture()
        .map_err(|message| GlError::Create {
            kind: "texture",
            message,
        })?;
    gl.bind_texture(glow::TEXTURE_2D, Some(texture));

    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_MIN_FILTER,
        filter.gl_enum() as i32,
    );
    gl.tex_parameter_i32(
        glow::TEXTURE_2D,
        glow::TEXTURE_MAG_FILTER,
        filter.gl_enum() as i32,
    );

    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        internal_format,
        width,
        height,
        0,
        format,
        ty,
        None,
    );

    if let Err(err) = check(gl) {
        gl.delete_texture(texture);
        return Err(err);
    }

    Ok(texture)
}

/// Compile a single shader stage
pub fn create_shader<G: GlDriver>(
    gl: &G,
    stage: ShaderStage,
    source: &str,
) -> GlResult<G::Shader> {
    check(gl)?;

    let shader = gl
        .create_shader(stage.gl_enum())
        .map_err(|message| GlError::Create {
            kind: "shader",
            message,
        })?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if !gl.get_shader_compile_status(shader) {
        let log = truncate_info_log(gl.get_shader_info_log(shader));
        error!("Error in shader: {}", log);
        gl.delete_shader(shader);
        return Err(GlError::Compile { stage, log });
    }

    if let Err(err) = check(gl) {
        gl.delete_shader(shader);
        return Err(err);
    }

    Ok(shader)
}

/// Compile and link a program from vertex and fragment sources.
///
/// The intermediate shader objects never outlive this call.
pub fn create_program<G: GlDriver>(
    gl: &G,
    vertex_source: &str,
    fragment_source: &str,
) -> GlResult<G::Program> {
    check(gl)?;

    let vertex_shader = create_shader(gl, ShaderStage::Vertex, vertex_source)?;
    let fragment_shader = match create_shader(gl, ShaderStage::Fragment, fragment_source) {
        Ok(shader) => shader,
        Err(err) => {
            gl.delete_shader(vertex_shader);
            return Err(err);
        }
    };

    let program = match gl.create_program() {
        Ok(program) => program,
        Err(message) => {
            gl.delete_shader(vertex_shader);
            gl.delete_shader(fragment_shader);
            return Err(GlError::Create {
                kind: "program",
                message,
            });
        }
    };

    gl.attach_shader(program, vertex_shader);
    gl.attach_shader(program, fragment_shader);
    gl.link_program(program);

    gl.delete_shader(vertex_shader);
    gl.delete_shader(fragment_shader);

    gl.validate_program(program);

    if !gl.get_program_link_status(program) {
        let log = truncate_info_log(gl.get_program_info_log(program));
        error!("Error in shader program: {}", log);
        gl.delete_program(program);
        return Err(GlError::Link { log });
    }

    if let Err(err) = check(gl) {
        gl.delete_program(program);
        return Err(err);
    }

    Ok(program)
}

/// Create a framebuffer rendering into `color_texture`.
///
/// `depth` adds a 24-bit depth renderbuffer; `depth && stencil` makes it a
/// packed depth/stencil renderbuffer instead. `stencil` alone adds nothing.
/// On success the framebuffer has been cleared to opaque black and the
/// default framebuffer is bound again.
pub fn create_framebuffer<G: GlDriver>(
    gl: &G,
    width: i32,
    height: i32,
    color_texture: G::Texture,
    depth: bool,
    stencil: bool,
) -> GlResult<FramebufferObjects<G>> {
    check(gl)?;

    let framebuffer = gl
        .create_framebuffer()
        .map_err(|message| GlError::Create {
            kind: "framebuffer",
            message,
        })?;
    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));

    gl.framebuffer_texture_2d(
        glow::FRAMEBUFFER,
        glow::COLOR_ATTACHMENT0,
        glow::TEXTURE_2D,
        Some(color_texture),
        0,
    );

    let depth_storage = match (depth, stencil) {
        (true, true) => Some((glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL_ATTACHMENT)),
        (true, false) => Some((glow::DEPTH_COMPONENT24, glow::DEPTH_ATTACHMENT)),
        _ => None,
    };

    let renderbuffer = match depth_storage {
        Some((internal_format, attachment)) => {
            let renderbuffer = match gl.create_renderbuffer() {
                Ok(renderbuffer) => renderbuffer,
                Err(message) => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                    gl.delete_framebuffer(framebuffer);
                    return Err(GlError::Create {
                        kind: "renderbuffer",
                        message,
                    });
                }
            };
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            gl.renderbuffer_storage(glow::RENDERBUFFER, internal_format, width, height);
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                attachment,
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            Some(renderbuffer)
        }
        None => None,
    };

    let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
    if status != glow::FRAMEBUFFER_COMPLETE {
        debug!("Framebuffer incomplete: {:x}", status);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        if let Some(renderbuffer) = renderbuffer {
            gl.delete_renderbuffer(renderbuffer);
        }
        gl.delete_framebuffer(framebuffer);
        return Err(GlError::IncompleteFramebuffer { status });
    }

    gl.clear_color(0.0, 0.0, 0.0, 1.0);
    gl.clear(glow::COLOR_BUFFER_BIT);

    gl.bind_framebuffer(glow::FRAMEBUFFER, None);

    Ok(FramebufferObjects {
        framebuffer,
        renderbuffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::headless::{Call, HeadlessGl, ObjectKind};
    use crate::test_log;

    const VERTEX_SRC: &str = "#version 330 core\n\
        in vec2 aPos;\n\
        in vec2 aUv;\n\
        out vec2 vUv;\n\
        void main() { vUv = aUv; gl_Position = vec4(aPos, 0.0, 1.0); }\n";

    const FRAGMENT_SRC: &str = "#version 330 core\n\
        in vec2 vUv;\n\
        uniform sampler2D uTexture;\n\
        out vec4 FragColor;\n\
        void main() { FragColor = texture(uTexture, vUv); }\n";

    const BROKEN_SRC: &str = "#version 330 core\nvoid mian() {}\n";

    fn color_texture(gl: &HeadlessGl, width: i32, height: i32) -> u32 {
        create_texture(
            gl,
            width,
            height,
            glow::RGBA8 as i32,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            TextureFilter::Nearest,
        )
        .unwrap()
    }

    #[test]
    fn test_create_texture_leaves_no_error() {
        let gl = HeadlessGl::new();
        let texture = create_texture(
            &gl,
            256,
            240,
            glow::R8 as i32,
            glow::RED,
            glow::UNSIGNED_BYTE,
            TextureFilter::Linear,
        )
        .unwrap();

        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(gl.texture_size(texture), Some((256, 240)));
        assert_eq!(
            gl.texture_filter(texture),
            Some((glow::LINEAR as i32, glow::LINEAR as i32))
        );
        assert_eq!(gl.bound_texture(), Some(texture));
    }

    #[test]
    fn test_create_texture_frees_texture_on_driver_error() {
        let gl = HeadlessGl::new();
        let result = create_texture(
            &gl,
            100_000,
            16,
            glow::R8 as i32,
            glow::RED,
            glow::UNSIGNED_BYTE,
            TextureFilter::Nearest,
        );

        assert_eq!(result, Err(GlError::Driver(glow::INVALID_VALUE)));
        assert_eq!(gl.live_count(ObjectKind::Texture), 0);
    }

    #[test]
    fn test_pending_error_short_circuits_every_creation_function() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 4, 4);
        gl.clear_calls();

        let only_error_query = |gl: &HeadlessGl| {
            assert_eq!(gl.calls(), vec![Call::GetError]);
            gl.clear_calls();
        };

        gl.raise_error(glow::INVALID_ENUM);
        let result = create_texture(
            &gl,
            4,
            4,
            glow::R8 as i32,
            glow::RED,
            glow::UNSIGNED_BYTE,
            TextureFilter::Nearest,
        );
        assert_eq!(result, Err(GlError::Driver(glow::INVALID_ENUM)));
        only_error_query(&gl);

        gl.raise_error(glow::INVALID_ENUM);
        assert!(create_shader(&gl, ShaderStage::Vertex, VERTEX_SRC).is_err());
        only_error_query(&gl);

        gl.raise_error(glow::INVALID_ENUM);
        assert!(create_program(&gl, VERTEX_SRC, FRAGMENT_SRC).is_err());
        only_error_query(&gl);

        gl.raise_error(glow::INVALID_ENUM);
        assert!(create_framebuffer(&gl, 4, 4, texture, true, true).is_err());
        only_error_query(&gl);

        assert_eq!(gl.bound_framebuffer(), None);
    }

    #[test]
    fn test_invalid_shader_logs_once_and_deletes_shader() {
        test_log::capture();
        let gl = HeadlessGl::new();

        let result = create_shader(&gl, ShaderStage::Fragment, BROKEN_SRC);

        match result {
            Err(GlError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("main"));
            }
            other => panic!("expected compile error, got {:?}", other),
        }

        let errors = test_log::errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error in shader: "));
        assert!(errors[0].contains("no function with name 'main'"));

        assert_eq!(gl.live_count(ObjectKind::Shader), 0);
        assert_eq!(gl.count_calls(|c| matches!(c, Call::DeleteShader(_))), 1);
    }

    #[test]
    fn test_create_program_deletes_both_shaders_on_success() {
        let gl = HeadlessGl::new();
        let program = create_program(&gl, VERTEX_SRC, FRAGMENT_SRC).unwrap();

        assert_eq!(gl.count_calls(|c| matches!(c, Call::DeleteShader(_))), 2);
        assert_eq!(gl.live_count(ObjectKind::Shader), 0);
        assert_eq!(gl.live_count(ObjectKind::Program), 1);
        assert_eq!(gl.get_attrib_location(program, "aUv"), Some(1));
    }

    #[test]
    fn test_create_program_deletes_both_shaders_on_link_failure() {
        test_log::capture();
        let gl = HeadlessGl::new();

        // The fragment stage reads a varying the vertex stage never writes
        let fragment = "#version 330 core\n\
            in vec4 vColor;\n\
            out vec4 FragColor;\n\
            void main() { FragColor = vColor; }\n";

        let result = create_program(&gl, VERTEX_SRC, fragment);

        match result {
            Err(GlError::Link { log }) => assert!(log.contains("vColor")),
            other => panic!("expected link error, got {:?}", other),
        }
        assert_eq!(gl.count_calls(|c| matches!(c, Call::DeleteShader(_))), 2);
        assert_eq!(gl.count_calls(|c| matches!(c, Call::DeleteProgram(_))), 1);
        assert_eq!(gl.live_count(ObjectKind::Shader), 0);
        assert_eq!(gl.live_count(ObjectKind::Program), 0);

        let errors = test_log::errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error in shader program: "));
    }

    #[test]
    fn test_create_program_frees_vertex_shader_when_fragment_fails() {
        test_log::capture();
        let gl = HeadlessGl::new();

        let result = create_program(&gl, VERTEX_SRC, BROKEN_SRC);

        assert!(matches!(
            result,
            Err(GlError::Compile {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
        assert_eq!(gl.count_calls(|c| matches!(c, Call::DeleteShader(_))), 2);
        assert_eq!(gl.live_count(ObjectKind::Shader), 0);
        assert_eq!(gl.count_calls(|c| matches!(c, Call::CreateProgram(_))), 0);
        assert_eq!(test_log::errors().len(), 1);
    }

    #[test]
    fn test_truncate_info_log_caps_length() {
        let long = "x".repeat(10_000);
        assert_eq!(truncate_info_log(long).len(), MAX_INFO_LOG_BYTES);

        // Never split a multi-byte character
        let wide = "é".repeat(3000);
        let truncated = truncate_info_log(wide);
        assert!(truncated.len() <= MAX_INFO_LOG_BYTES);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_create_framebuffer_color_only() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 320, 240);

        let objects = create_framebuffer(&gl, 320, 240, texture, false, false).unwrap();

        assert!(objects.renderbuffer.is_none());
        assert_eq!(gl.bound_framebuffer(), None);
        assert_eq!(gl.count_calls(|c| matches!(c, Call::Clear(glow::COLOR_BUFFER_BIT))), 1);
        assert_eq!(
            gl.count_calls(|c| matches!(c, Call::ClearColor([r, g, b, a]) if *r == 0.0 && *g == 0.0 && *b == 0.0 && *a == 1.0)),
            1
        );
        assert_eq!(gl.live_count(ObjectKind::Framebuffer), 1);
    }

    #[test]
    fn test_create_framebuffer_depth_stencil_uses_packed_format() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 64, 64);

        let objects = create_framebuffer(&gl, 64, 64, texture, true, true).unwrap();
        let renderbuffer = objects.renderbuffer.unwrap();

        assert_eq!(
            gl.renderbuffer_format(renderbuffer),
            Some(glow::DEPTH24_STENCIL8)
        );
        assert_eq!(
            gl.count_calls(|c| matches!(
                c,
                Call::FramebufferRenderbuffer {
                    attachment: glow::DEPTH_STENCIL_ATTACHMENT,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_create_framebuffer_depth_only() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 64, 64);

        let objects = create_framebuffer(&gl, 64, 64, texture, true, false).unwrap();
        let renderbuffer = objects.renderbuffer.unwrap();

        assert_eq!(
            gl.renderbuffer_format(renderbuffer),
            Some(glow::DEPTH_COMPONENT24)
        );
    }

    #[test]
    fn test_create_framebuffer_stencil_alone_adds_no_renderbuffer() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 64, 64);

        let objects = create_framebuffer(&gl, 64, 64, texture, false, true).unwrap();

        assert!(objects.renderbuffer.is_none());
        assert_eq!(gl.live_count(ObjectKind::Renderbuffer), 0);
    }

    #[test]
    fn test_incomplete_framebuffer_frees_everything() {
        let gl = HeadlessGl::new();
        let texture = color_texture(&gl, 0, 0);

        let result = create_framebuffer(&gl, 0, 0, texture, true, false);

        assert_eq!(
            result.err(),
            Some(GlError::IncompleteFramebuffer {
                status: glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
            })
        );
        assert_eq!(gl.live_count(ObjectKind::Framebuffer), 0);
        assert_eq!(gl.live_count(ObjectKind::Renderbuffer), 0);
        assert_eq!(gl.bound_framebuffer(), None);
        assert_eq!(gl.count_calls(|c| matches!(c, Call::Clear(_))), 0);
    }
}
