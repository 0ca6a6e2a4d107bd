use emu_gl_util::driver::headless::{Call, ObjectKind};
use emu_gl_util::{
    Framebuffer, FramebufferOptions, GlError, HeadlessGl, Program, TextureFilter, Texture,
    TexturedQuad, VideoConfig,
};
use std::rc::Rc;

const VERTEX_SRC: &str = r#"#version 330 core
layout (location = 0) in vec2 aPos;
layout (location = 1) in vec2 aTexCoord;
out vec2 TexCoord;
void main() {
    gl_Position = vec4(aPos, 0.0, 1.0);
    TexCoord = aTexCoord;
}
"#;

const FRAGMENT_SRC: &str = r#"#version 330 core
in vec2 TexCoord;
out vec4 FragColor;
uniform sampler2D screenTexture;
void main() {
    FragColor = texture(screenTexture, TexCoord);
}
"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_full_frame_and_teardown() {
    init_logging();
    let gl = Rc::new(HeadlessGl::new());
    let config = VideoConfig::from_json(r#"{"filter":"linear","framebuffer":{"depth":true}}"#)
        .unwrap();

    let frame_width = 256;
    let frame_height = 240;
    let pitch = frame_width as usize * 4 + 32;
    let mut pixels = vec![0u8; pitch * frame_height as usize];
    for (y, row) in pixels.chunks_mut(pitch).enumerate() {
        for texel in row[..frame_width as usize * 4].chunks_mut(4) {
            texel.copy_from_slice(&[y as u8, 0x40, 0x80, 0xFF]);
        }
    }

    let screen = Texture::new(
        &gl,
        frame_width,
        frame_height,
        glow::RGBA8 as i32,
        config.filter,
    )
    .unwrap();
    screen
        .set_data(
            frame_width,
            frame_height,
            pitch,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            &pixels,
        )
        .unwrap();

    let program = Program::new(&gl, VERTEX_SRC, FRAGMENT_SRC).unwrap();
    let quad = TexturedQuad::new(&gl).unwrap();
    let target = Texture::new(&gl, 512, 480, glow::RGBA8 as i32, TextureFilter::Nearest).unwrap();
    let framebuffer = Framebuffer::new(&gl, &target, config.framebuffer).unwrap();

    framebuffer.bind();
    program.use_program();
    screen.set_uniform(&program.uniform("screenTexture"), 0);
    quad.bind();
    quad.enable_pos(program.attribute("aPos"));
    quad.enable_uv(program.attribute("aTexCoord"));
    quad.draw();
    framebuffer.unbind();

    let readback = screen.get_data(glow::RGBA, glow::UNSIGNED_BYTE).unwrap();
    assert_eq!(readback.len(), frame_width as usize * frame_height as usize * 4);
    assert_eq!(&readback[..4], &[0, 0x40, 0x80, 0xFF]);
    let last_row = (frame_height as usize - 1) * frame_width as usize * 4;
    assert_eq!(readback[last_row], (frame_height - 1) as u8);

    assert_eq!(
        gl.uniform_value(program.handle().unwrap(), "screenTexture"),
        Some(0)
    );
    assert_eq!(gl.enabled_attributes(), vec![0, 1]);
    assert!(gl.calls().contains(&Call::DrawArrays {
        mode: glow::TRIANGLE_STRIP,
        first: 0,
        count: 4,
    }));
    assert_eq!(gl.bound_framebuffer(), None);

    drop(framebuffer);
    drop(quad);
    drop(program);
    drop(target);
    drop(screen);

    for kind in [
        ObjectKind::Texture,
        ObjectKind::Shader,
        ObjectKind::Program,
        ObjectKind::Buffer,
        ObjectKind::Framebuffer,
        ObjectKind::Renderbuffer,
    ] {
        assert_eq!(gl.live_count(kind), 0, "{:?} leaked", kind);
    }
}

#[test]
fn test_broken_shader_leaves_nothing_behind() {
    init_logging();
    let gl = Rc::new(HeadlessGl::new());

    let result = Program::new(&gl, VERTEX_SRC, "#version 330 core\nout vec4 FragColor;\n");

    match result {
        Err(GlError::Compile { log, .. }) => assert!(!log.is_empty()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("program without main linked"),
    }
    assert_eq!(gl.live_count(ObjectKind::Shader), 0);
    assert_eq!(gl.live_count(ObjectKind::Program), 0);
}

#[test]
fn test_empty_target_cannot_back_a_framebuffer() {
    init_logging();
    let gl = Rc::new(HeadlessGl::new());
    let target = Texture::new(&gl, 0, 0, glow::RGBA8 as i32, TextureFilter::Nearest).unwrap();

    let result = Framebuffer::new(&gl, &target, FramebufferOptions::default());

    assert!(matches!(result, Err(GlError::IncompleteFramebuffer { .. })));
    assert_eq!(gl.live_count(ObjectKind::Framebuffer), 0);
}
