use emu_gl_util::driver::headless::ObjectKind;
use emu_gl_util::{Framebuffer, HeadlessGl, Program, Texture, TexturedQuad, VideoConfig};
use std::env;
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

const WIDTH: i32 = 256;
const HEIGHT: i32 = 240;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(json) => match VideoConfig::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid video config: {}", e);
                std::process::exit(1);
            }
        },
        None => VideoConfig::default(),
    };

    if let Err(e) = run(config) {
        eprintln!("Headless frame failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: VideoConfig) -> emu_gl_util::GlResult<()> {
    let gl = Rc::new(HeadlessGl::new());

    // Checkerboard test pattern
    let pixels: Vec<u8> = (0..WIDTH * HEIGHT)
        .flat_map(|i| {
            let (x, y) = (i % WIDTH, i / WIDTH);
            let shade = if ((x / 8) + (y / 8)) % 2 == 0 { 0xFF } else { 0x20 };
            [shade, shade, shade, 0xFF]
        })
        .collect();

    let screen = Texture::new(&gl, WIDTH, HEIGHT, glow::RGBA8 as i32, config.filter)?;
    screen.set_data(
        WIDTH,
        HEIGHT,
        WIDTH as usize * 4,
        glow::RGBA,
        glow::UNSIGNED_BYTE,
        &pixels,
    )?;

    let target = Texture::new(&gl, WIDTH * 2, HEIGHT * 2, glow::RGBA8 as i32, config.filter)?;
    let framebuffer = Framebuffer::new(&gl, &target, config.framebuffer)?;
    let program = Program::new(&gl, VERTEX_SRC, FRAGMENT_SRC)?;
    let quad = TexturedQuad::new(&gl)?;

    framebuffer.bind();
    program.use_program();
    screen.set_uniform(&program.uniform("screenTexture"), 0);
    quad.bind();
    quad.enable_pos(program.attribute("aPos"));
    quad.enable_uv(program.attribute("aTexCoord"));
    quad.draw();
    framebuffer.unbind();

    let readback = screen.get_data(glow::RGBA, glow::UNSIGNED_BYTE)?;
    println!(
        "Headless frame: {}x{} ({} bytes), target {}x{}, depth: {}",
        screen.width(),
        screen.height(),
        readback.len(),
        framebuffer.width(),
        framebuffer.height(),
        framebuffer.has_depth()
    );
    println!(
        "Video config: {}",
        config.to_json().unwrap_or_else(|e| e.to_string())
    );

    drop((quad, program, framebuffer, target, screen));
    println!(
        "Live objects after teardown: {}",
        [
            ObjectKind::Texture,
            ObjectKind::Program,
            ObjectKind::Buffer,
            ObjectKind::Framebuffer,
            ObjectKind::Renderbuffer,
        ]
        .into_iter()
        .map(|kind| gl.live_count(kind))
        .sum::<usize>()
    );

    Ok(())
}
