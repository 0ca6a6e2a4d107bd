//! In-memory OpenGL driver
//!
//! `HeadlessGl` keeps every object the wrappers create in plain Rust
//! collections and applies the subset of desktop GL validation rules the
//! helpers depend on:
//!
//! - the error flag holds the first error raised and is cleared by `get_error`
//! - bad sizes raise `INVALID_VALUE`, calls against unbound or unknown
//!   objects raise `INVALID_OPERATION`, bad enums raise `INVALID_ENUM`
//! - a shader compiles when its source defines `void main`
//! - a program links when one compiled vertex and one compiled fragment
//!   shader are attached and every fragment input is a vertex output
//! - attribute and uniform locations are the declaration order in the
//!   attached sources
//! - a framebuffer is complete when its colour attachment has storage
//!
//! State-changing calls and `get_error` are appended to a call log so tests
//! can assert on exactly what was issued. Pure queries are not logged. The
//! log keeps the most recent [`MAX_RECORDED_CALLS`] entries, so a headless
//! front-end can run indefinitely without it growing.
//!
//! Pixel transfers honour `PACK_ALIGNMENT`/`UNPACK_ALIGNMENT` (default 4):
//! rows in client memory start on an aligned offset, and a client buffer too
//! short for the padded layout raises `INVALID_OPERATION` instead of being
//! read or written past its end.

use super::GlDriver;
use crate::texture::texel_size;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Largest texture edge accepted by `tex_image_2d` and `renderbuffer_storage`
pub const MAX_TEXTURE_SIZE: i32 = 8192;

/// Capacity of the call log; older calls are discarded first
pub const MAX_RECORDED_CALLS: usize = 4096;

const MAX_VERTEX_ATTRIBS: u32 = 16;
const MAX_TEXTURE_UNITS: u32 = 32;

/// A recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetError,
    CreateTexture(u32),
    DeleteTexture(u32),
    BindTexture(Option<u32>),
    ActiveTexture(u32),
    TexParameter { parameter: u32, value: i32 },
    TexImage2D { internal_format: i32, width: i32, height: i32 },
    TexSubImage2D { x: i32, y: i32, width: i32, height: i32 },
    GetTexImage,
    PixelStore { parameter: u32, value: i32 },
    CreateShader(u32),
    ShaderSource(u32),
    CompileShader(u32),
    DeleteShader(u32),
    CreateProgram(u32),
    AttachShader { program: u32, shader: u32 },
    LinkProgram(u32),
    ValidateProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform1i { location: u32, value: i32 },
    CreateBuffer(u32),
    DeleteBuffer(u32),
    BindBuffer(Option<u32>),
    BufferData { len: usize, usage: u32 },
    VertexAttribPointer { index: u32, size: i32, stride: i32, offset: i32 },
    EnableVertexAttribArray(u32),
    DrawArrays { mode: u32, first: i32, count: i32 },
    CreateFramebuffer(u32),
    DeleteFramebuffer(u32),
    BindFramebuffer(Option<u32>),
    FramebufferTexture2D { attachment: u32, texture: Option<u32> },
    CheckFramebufferStatus,
    CreateRenderbuffer(u32),
    DeleteRenderbuffer(u32),
    BindRenderbuffer(Option<u32>),
    RenderbufferStorage { internal_format: u32, width: i32, height: i32 },
    FramebufferRenderbuffer { attachment: u32, renderbuffer: Option<u32> },
    ClearColor([f32; 4]),
    Clear(u32),
}

/// Object namespaces tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Texture,
    Shader,
    Program,
    Buffer,
    Framebuffer,
    Renderbuffer,
}

struct TextureObject {
    width: i32,
    height: i32,
    texel: usize,
    min_filter: i32,
    mag_filter: i32,
    data: Vec<u8>,
}

struct ShaderObject {
    stage: u32,
    source: String,
    compiled: bool,
    log: String,
}

/// Snapshot of a shader taken at attach time; deleting the shader afterwards
/// must not affect the program.
struct AttachedShader {
    stage: u32,
    source: String,
    compiled: bool,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<AttachedShader>,
    linked: bool,
    log: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    uniform_values: HashMap<u32, i32>,
}

#[derive(Default)]
struct FramebufferObject {
    color: Option<u32>,
    depth: Option<u32>,
}

struct RenderbufferObject {
    internal_format: u32,
    width: i32,
    height: i32,
}

#[derive(Default)]
struct State {
    error: u32,
    last_name: u32,
    calls: VecDeque<Call>,
    pack_alignment: i32,
    unpack_alignment: i32,
    textures: HashMap<u32, TextureObject>,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, Vec<u8>>,
    framebuffers: HashMap<u32, FramebufferObject>,
    renderbuffers: HashMap<u32, RenderbufferObject>,
    bound_texture: Option<u32>,
    bound_buffer: Option<u32>,
    bound_framebuffer: Option<u32>,
    bound_renderbuffer: Option<u32>,
    current_program: Option<u32>,
    active_texture: u32,
    enabled_attributes: BTreeSet<u32>,
}

impl State {
    /// Record `code` unless an earlier error is still pending
    fn raise(&mut self, code: u32) {
        if self.error == glow::NO_ERROR {
            self.error = code;
        }
    }

    fn record(&mut self, call: Call) {
        if self.calls.len() == MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    fn next_name(&mut self) -> u32 {
        self.last_name += 1;
        self.last_name
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureObject> {
        let name = self.bound_texture?;
        self.textures.get_mut(&name)
    }
}

/// Software stand-in for an OpenGL context
pub struct HeadlessGl {
    state: RefCell<State>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                active_texture: glow::TEXTURE0,
                pack_alignment: 4,
                unpack_alignment: 4,
                ..State::default()
            }),
        }
    }

    /// Set the error flag as if a previous call had failed
    pub fn raise_error(&self, code: u32) {
        self.state.borrow_mut().raise(code);
    }

    /// Peek at the error flag without clearing it or logging a call
    pub fn pending_error(&self) -> u32 {
        self.state.borrow().error
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Count recorded calls matching `predicate`
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Number of objects of `kind` that have been created and not deleted
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        let state = self.state.borrow();
        match kind {
            ObjectKind::Texture => state.textures.len(),
            ObjectKind::Shader => state.shaders.len(),
            ObjectKind::Program => state.programs.len(),
            ObjectKind::Buffer => state.buffers.len(),
            ObjectKind::Framebuffer => state.framebuffers.len(),
            ObjectKind::Renderbuffer => state.renderbuffers.len(),
        }
    }

    pub fn bound_texture(&self) -> Option<u32> {
        self.state.borrow().bound_texture
    }

    pub fn bound_buffer(&self) -> Option<u32> {
        self.state.borrow().bound_buffer
    }

    pub fn bound_framebuffer(&self) -> Option<u32> {
        self.state.borrow().bound_framebuffer
    }

    pub fn current_program(&self) -> Option<u32> {
        self.state.borrow().current_program
    }

    pub fn active_texture_unit(&self) -> u32 {
        self.state.borrow().active_texture
    }

    pub fn enabled_attributes(&self) -> Vec<u32> {
        self.state.borrow().enabled_attributes.iter().copied().collect()
    }

    pub fn texture_size(&self, texture: u32) -> Option<(i32, i32)> {
        let state = self.state.borrow();
        state.textures.get(&texture).map(|t| (t.width, t.height))
    }

    /// (min, mag) filter parameters of a texture
    pub fn texture_filter(&self, texture: u32) -> Option<(i32, i32)> {
        let state = self.state.borrow();
        state
            .textures
            .get(&texture)
            .map(|t| (t.min_filter, t.mag_filter))
    }

    pub fn texture_contents(&self, texture: u32) -> Option<Vec<u8>> {
        let state = self.state.borrow();
        state.textures.get(&texture).map(|t| t.data.clone())
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn renderbuffer_format(&self, renderbuffer: u32) -> Option<u32> {
        let state = self.state.borrow();
        state
            .renderbuffers
            .get(&renderbuffer)
            .map(|r| r.internal_format)
    }

    /// Value last written to a uniform of `program`
    pub fn uniform_value(&self, program: u32, name: &str) -> Option<i32> {
        let state = self.state.borrow();
        let program = state.programs.get(&program)?;
        let location = program.uniforms.iter().position(|u| u == name)? as u32;
        program.uniform_values.get(&location).copied()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().record(call);
    }
}

/// Distance between row starts in client memory for `alignment`
fn aligned_stride(row_bytes: usize, alignment: i32) -> usize {
    let alignment = alignment.max(1) as usize;
    row_bytes.div_ceil(alignment) * alignment
}

/// Client bytes touched by `height` rows; the last row carries no padding
fn client_len(row_bytes: usize, stride: usize, height: i32) -> usize {
    match height {
        h if h <= 0 => 0,
        h => stride * (h as usize - 1) + row_bytes,
    }
}

/// Names declared by lines starting with one of `qualifiers`, in order.
///
/// Handles `layout(...)` prefixes and precision qualifiers; the declared name
/// is the last token before the semicolon.
fn declared_names(source: &str, qualifiers: &[&str]) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let mut line = line.trim();
            if line.starts_with("layout") {
                line = line.split_once(')')?.1.trim();
            }
            let qualifier = line.split_whitespace().next()?;
            if !qualifiers.contains(&qualifier) {
                return None;
            }
            let declaration = line.strip_suffix(';')?;
            let name = declaration.split_whitespace().last()?;
            let name = name.split('[').next().unwrap_or(name);
            Some(name.to_string())
        })
        .collect()
}

impl GlDriver for HeadlessGl {
    type Texture = u32;
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Framebuffer = u32;
    type Renderbuffer = u32;
    type UniformLocation = u32;

    fn get_error(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.record(Call::GetError);
        std::mem::replace(&mut state.error, glow::NO_ERROR)
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let name = state.next_name();
        state.textures.insert(
            name,
            TextureObject {
                width: 0,
                height: 0,
                texel: 0,
                min_filter: glow::NEAREST_MIPMAP_LINEAR as i32,
                mag_filter: glow::LINEAR as i32,
                data: Vec::new(),
            },
        );
        state.record(Call::CreateTexture(name));
        Ok(name)
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteTexture(texture));
        state.textures.remove(&texture);
        if state.bound_texture == Some(texture) {
            state.bound_texture = None;
        }
    }

    fn bind_texture(&self, target: u32, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.record(Call::BindTexture(texture));
        if target != glow::TEXTURE_2D {
            state.raise(glow::INVALID_ENUM);
        } else if texture.is_some_and(|t| !state.textures.contains_key(&t)) {
            state.raise(glow::INVALID_OPERATION);
        } else {
            state.bound_texture = texture;
        }
    }

    fn active_texture(&self, unit: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::ActiveTexture(unit));
        if !(glow::TEXTURE0..glow::TEXTURE0 + MAX_TEXTURE_UNITS).contains(&unit) {
            state.raise(glow::INVALID_ENUM);
        } else {
            state.active_texture = unit;
        }
    }

    fn tex_parameter_i32(&self, _target: u32, parameter: u32, value: i32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::TexParameter { parameter, value });
        let Some(texture) = state.bound_texture_mut() else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        match parameter {
            glow::TEXTURE_MIN_FILTER => texture.min_filter = value,
            glow::TEXTURE_MAG_FILTER => texture.mag_filter = value,
            _ => {}
        }
    }

    fn tex_image_2d(
        &self,
        _target: u32,
        level: i32,
        internal_format: i32,
        width: i32,
        height: i32,
        border: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let mut state = self.state.borrow_mut();
        state.record(Call::TexImage2D {
            internal_format,
            width,
            height,
        });

        if level != 0
            || border != 0
            || !(0..=MAX_TEXTURE_SIZE).contains(&width)
            || !(0..=MAX_TEXTURE_SIZE).contains(&height)
        {
            state.raise(glow::INVALID_VALUE);
            return;
        }
        let texel = texel_size(format, ty);
        if texel == 0 {
            state.raise(glow::INVALID_ENUM);
            return;
        }
        let row_bytes = width as usize * texel;
        let stride = aligned_stride(row_bytes, state.unpack_alignment);
        if pixels.is_some_and(|p| p.len() < client_len(row_bytes, stride, height)) {
            state.raise(glow::INVALID_OPERATION);
            return;
        }
        let Some(texture) = state.bound_texture_mut() else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };

        texture.width = width;
        texture.height = height;
        texture.texel = texel;
        texture.data = vec![0; row_bytes * height as usize];
        if let Some(pixels) = pixels {
            for row in 0..height as usize {
                let src = row * stride;
                texture.data[row * row_bytes..(row + 1) * row_bytes]
                    .copy_from_slice(&pixels[src..src + row_bytes]);
            }
        }
    }

    fn tex_sub_image_2d(
        &self,
        _target: u32,
        _level: i32,
        x_offset: i32,
        y_offset: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) {
        let mut state = self.state.borrow_mut();
        state.record(Call::TexSubImage2D {
            x: x_offset,
            y: y_offset,
            width,
            height,
        });

        let texel = texel_size(format, ty);
        if texel == 0 {
            state.raise(glow::INVALID_ENUM);
            return;
        }
        let unpack_alignment = state.unpack_alignment;
        let Some(texture) = state.bound_texture_mut() else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if x_offset < 0
            || y_offset < 0
            || width < 0
            || height < 0
            || x_offset + width > texture.width
            || y_offset + height > texture.height
        {
            state.raise(glow::INVALID_VALUE);
            return;
        }
        let row_bytes = width as usize * texel;
        let src_stride = aligned_stride(row_bytes, unpack_alignment);
        if pixels.len() < client_len(row_bytes, src_stride, height) {
            state.raise(glow::INVALID_OPERATION);
            return;
        }

        // Storage adopts the layout of the most recent upload
        if texture.texel != texel {
            texture.texel = texel;
            texture.data = vec![0; texture.width as usize * texture.height as usize * texel];
        }

        let stride = texture.width as usize * texel;
        for row in 0..height as usize {
            let dst = (y_offset as usize + row) * stride + x_offset as usize * texel;
            let src = row * src_stride;
            texture.data[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }
    }

    fn get_tex_image(&self, _target: u32, _level: i32, format: u32, ty: u32, pixels: &mut [u8]) {
        let mut state = self.state.borrow_mut();
        state.record(Call::GetTexImage);
        let texel = texel_size(format, ty);
        let pack_alignment = state.pack_alignment;
        let Some(texture) = state.bound_texture_mut() else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        let row_bytes = texture.width as usize * texel;
        let stride = aligned_stride(row_bytes, pack_alignment);
        if texel != texture.texel || pixels.len() < client_len(row_bytes, stride, texture.height) {
            state.raise(glow::INVALID_OPERATION);
            return;
        }
        for (row, src) in texture.data.chunks_exact(row_bytes.max(1)).enumerate() {
            let dst = row * stride;
            pixels[dst..dst + row_bytes].copy_from_slice(src);
        }
    }

    fn pixel_store_i32(&self, parameter: u32, value: i32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::PixelStore { parameter, value });
        if ![1, 2, 4, 8].contains(&value) {
            state.raise(glow::INVALID_VALUE);
            return;
        }
        match parameter {
            glow::PACK_ALIGNMENT => state.pack_alignment = value,
            glow::UNPACK_ALIGNMENT => state.unpack_alignment = value,
            _ => state.raise(glow::INVALID_ENUM),
        }
    }

    fn create_shader(&self, shader_type: u32) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        if shader_type != glow::VERTEX_SHADER && shader_type != glow::FRAGMENT_SHADER {
            state.raise(glow::INVALID_ENUM);
            return Err("Unable to create Shader object".to_string());
        }
        let name = state.next_name();
        state.shaders.insert(
            name,
            ShaderObject {
                stage: shader_type,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        state.record(Call::CreateShader(name));
        Ok(name)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let mut state = self.state.borrow_mut();
        state.record(Call::ShaderSource(shader));
        match state.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None => state.raise(glow::INVALID_VALUE),
        }
    }

    fn compile_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::CompileShader(shader));
        let Some(object) = state.shaders.get_mut(&shader) else {
            state.raise(glow::INVALID_VALUE);
            return;
        };
        object.compiled = object.source.contains("void main");
        object.log = if object.compiled {
            String::new()
        } else {
            "0:1(1): error: no function with name 'main'".to_string()
        };
    }

    fn get_shader_compile_status(&self, shader: u32) -> bool {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader) {
            Some(object) => object.compiled,
            None => {
                state.raise(glow::INVALID_VALUE);
                false
            }
        }
    }

    fn get_shader_info_log(&self, shader: u32) -> String {
        let mut state = self.state.borrow_mut();
        match state.shaders.get(&shader) {
            Some(object) => object.log.clone(),
            None => {
                state.raise(glow::INVALID_VALUE);
                String::new()
            }
        }
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteShader(shader));
        state.shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let name = state.next_name();
        state.programs.insert(name, ProgramObject::default());
        state.record(Call::CreateProgram(name));
        Ok(name)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::AttachShader { program, shader });
        let Some(snapshot) = state.shaders.get(&shader).map(|s| AttachedShader {
            stage: s.stage,
            source: s.source.clone(),
            compiled: s.compiled,
        }) else {
            state.raise(glow::INVALID_VALUE);
            return;
        };
        match state.programs.get_mut(&program) {
            Some(object) => object.attached.push(snapshot),
            None => state.raise(glow::INVALID_VALUE),
        }
    }

    fn link_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::LinkProgram(program));
        let Some(object) = state.programs.get_mut(&program) else {
            state.raise(glow::INVALID_VALUE);
            return;
        };

        let stage = |stage: u32| {
            object
                .attached
                .iter()
                .filter(|s| s.stage == stage && s.compiled)
                .collect::<Vec<_>>()
        };
        let vertex = stage(glow::VERTEX_SHADER);
        let fragment = stage(glow::FRAGMENT_SHADER);

        if vertex.len() != 1 || fragment.len() != 1 {
            object.linked = false;
            object.log =
                "error: linking requires one compiled vertex and one compiled fragment shader"
                    .to_string();
            return;
        }

        let outputs = declared_names(&vertex[0].source, &["out", "varying"]);
        let unmatched = declared_names(&fragment[0].source, &["in", "varying"])
            .into_iter()
            .find(|input| !outputs.contains(input));
        if let Some(input) = unmatched {
            object.linked = false;
            object.log = format!(
                "error: fragment shader input `{}` has no matching output in the previous stage",
                input
            );
            return;
        }

        let attributes = declared_names(&vertex[0].source, &["in", "attribute"]);
        let mut uniforms = declared_names(&vertex[0].source, &["uniform"]);
        for name in declared_names(&fragment[0].source, &["uniform"]) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        object.attributes = attributes;
        object.uniforms = uniforms;
        object.uniform_values.clear();
        object.linked = true;
        object.log.clear();
    }

    fn validate_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::ValidateProgram(program));
        if !state.programs.contains_key(&program) {
            state.raise(glow::INVALID_VALUE);
        }
    }

    fn get_program_link_status(&self, program: u32) -> bool {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program) {
            Some(object) => object.linked,
            None => {
                state.raise(glow::INVALID_VALUE);
                false
            }
        }
    }

    fn get_program_info_log(&self, program: u32) -> String {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program) {
            Some(object) => object.log.clone(),
            None => {
                state.raise(glow::INVALID_VALUE);
                String::new()
            }
        }
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteProgram(program));
        state.programs.remove(&program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.record(Call::UseProgram(program));
        let usable = match program {
            Some(p) => state.programs.get(&p).is_some_and(|o| o.linked),
            None => true,
        };
        if usable {
            state.current_program = program;
        } else {
            state.raise(glow::INVALID_OPERATION);
        }
    }

    fn get_attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program) {
            Some(object) if object.linked => object
                .attributes
                .iter()
                .position(|a| a == name)
                .map(|i| i as u32),
            _ => {
                state.raise(glow::INVALID_OPERATION);
                None
            }
        }
    }

    fn get_uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        match state.programs.get(&program) {
            Some(object) if object.linked => object
                .uniforms
                .iter()
                .position(|u| u == name)
                .map(|i| i as u32),
            _ => {
                state.raise(glow::INVALID_OPERATION);
                None
            }
        }
    }

    fn uniform_1_i32(&self, location: Option<&u32>, value: i32) {
        // A missing location is silently ignored, as GL does for -1
        let Some(&location) = location else {
            return;
        };
        let mut state = self.state.borrow_mut();
        state.record(Call::Uniform1i { location, value });
        let Some(program) = state.current_program else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        let Some(object) = state.programs.get_mut(&program) else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if (location as usize) < object.uniforms.len() {
            object.uniform_values.insert(location, value);
        } else {
            state.raise(glow::INVALID_OPERATION);
        }
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let name = state.next_name();
        state.buffers.insert(name, Vec::new());
        state.record(Call::CreateBuffer(name));
        Ok(name)
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteBuffer(buffer));
        state.buffers.remove(&buffer);
        if state.bound_buffer == Some(buffer) {
            state.bound_buffer = None;
        }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.record(Call::BindBuffer(buffer));
        if target != glow::ARRAY_BUFFER {
            state.raise(glow::INVALID_ENUM);
        } else if buffer.is_some_and(|b| !state.buffers.contains_key(&b)) {
            state.raise(glow::INVALID_OPERATION);
        } else {
            state.bound_buffer = buffer;
        }
    }

    fn buffer_data_u8_slice(&self, _target: u32, data: &[u8], usage: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::BufferData {
            len: data.len(),
            usage,
        });
        let Some(buffer) = state.bound_buffer else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if let Some(contents) = state.buffers.get_mut(&buffer) {
            *contents = data.to_vec();
        }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        _data_type: u32,
        _normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        let mut state = self.state.borrow_mut();
        state.record(Call::VertexAttribPointer {
            index,
            size,
            stride,
            offset,
        });
        if index >= MAX_VERTEX_ATTRIBS || !(1..=4).contains(&size) || stride < 0 {
            state.raise(glow::INVALID_VALUE);
        } else if state.bound_buffer.is_none() {
            state.raise(glow::INVALID_OPERATION);
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::EnableVertexAttribArray(index));
        if index >= MAX_VERTEX_ATTRIBS {
            state.raise(glow::INVALID_VALUE);
        } else {
            state.enabled_attributes.insert(index);
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DrawArrays { mode, first, count });
        if first < 0 || count < 0 {
            state.raise(glow::INVALID_VALUE);
        } else if state.current_program.is_none() {
            state.raise(glow::INVALID_OPERATION);
        }
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let name = state.next_name();
        state
            .framebuffers
            .insert(name, FramebufferObject::default());
        state.record(Call::CreateFramebuffer(name));
        Ok(name)
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteFramebuffer(framebuffer));
        state.framebuffers.remove(&framebuffer);
        if state.bound_framebuffer == Some(framebuffer) {
            state.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.record(Call::BindFramebuffer(framebuffer));
        if target != glow::FRAMEBUFFER {
            state.raise(glow::INVALID_ENUM);
        } else if framebuffer.is_some_and(|f| !state.framebuffers.contains_key(&f)) {
            state.raise(glow::INVALID_OPERATION);
        } else {
            state.bound_framebuffer = framebuffer;
        }
    }

    fn framebuffer_texture_2d(
        &self,
        _target: u32,
        attachment: u32,
        _texture_target: u32,
        texture: Option<u32>,
        _level: i32,
    ) {
        let mut state = self.state.borrow_mut();
        state.record(Call::FramebufferTexture2D { attachment, texture });
        if attachment != glow::COLOR_ATTACHMENT0 {
            state.raise(glow::INVALID_ENUM);
            return;
        }
        if texture.is_some_and(|t| !state.textures.contains_key(&t)) {
            state.raise(glow::INVALID_OPERATION);
            return;
        }
        let Some(bound) = state.bound_framebuffer else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if let Some(object) = state.framebuffers.get_mut(&bound) {
            object.color = texture;
        }
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        state.record(Call::CheckFramebufferStatus);
        let Some(object) = state
            .bound_framebuffer
            .and_then(|f| state.framebuffers.get(&f))
        else {
            return glow::FRAMEBUFFER_COMPLETE;
        };

        let Some(color) = object.color else {
            return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        };
        let color_ok = state
            .textures
            .get(&color)
            .is_some_and(|t| t.width > 0 && t.height > 0);
        let depth_ok = object.depth.map_or(true, |d| {
            state
                .renderbuffers
                .get(&d)
                .is_some_and(|r| r.width > 0 && r.height > 0)
        });

        if color_ok && depth_ok {
            glow::FRAMEBUFFER_COMPLETE
        } else {
            glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
        }
    }

    fn create_renderbuffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let name = state.next_name();
        state.renderbuffers.insert(
            name,
            RenderbufferObject {
                internal_format: 0,
                width: 0,
                height: 0,
            },
        );
        state.record(Call::CreateRenderbuffer(name));
        Ok(name)
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::DeleteRenderbuffer(renderbuffer));
        state.renderbuffers.remove(&renderbuffer);
        if state.bound_renderbuffer == Some(renderbuffer) {
            state.bound_renderbuffer = None;
        }
    }

    fn bind_renderbuffer(&self, target: u32, renderbuffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.record(Call::BindRenderbuffer(renderbuffer));
        if target != glow::RENDERBUFFER {
            state.raise(glow::INVALID_ENUM);
        } else if renderbuffer.is_some_and(|r| !state.renderbuffers.contains_key(&r)) {
            state.raise(glow::INVALID_OPERATION);
        } else {
            state.bound_renderbuffer = renderbuffer;
        }
    }

    fn renderbuffer_storage(&self, _target: u32, internal_format: u32, width: i32, height: i32) {
        let mut state = self.state.borrow_mut();
        state.record(Call::RenderbufferStorage {
            internal_format,
            width,
            height,
        });
        if !(0..=MAX_TEXTURE_SIZE).contains(&width) || !(0..=MAX_TEXTURE_SIZE).contains(&height) {
            state.raise(glow::INVALID_VALUE);
            return;
        }
        let Some(bound) = state.bound_renderbuffer else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if let Some(object) = state.renderbuffers.get_mut(&bound) {
            object.internal_format = internal_format;
            object.width = width;
            object.height = height;
        }
    }

    fn framebuffer_renderbuffer(
        &self,
        _target: u32,
        attachment: u32,
        _renderbuffer_target: u32,
        renderbuffer: Option<u32>,
    ) {
        let mut state = self.state.borrow_mut();
        state.record(Call::FramebufferRenderbuffer {
            attachment,
            renderbuffer,
        });
        if attachment != glow::DEPTH_ATTACHMENT && attachment != glow::DEPTH_STENCIL_ATTACHMENT {
            state.raise(glow::INVALID_ENUM);
            return;
        }
        if renderbuffer.is_some_and(|r| !state.renderbuffers.contains_key(&r)) {
            state.raise(glow::INVALID_OPERATION);
            return;
        }
        let Some(bound) = state.bound_framebuffer else {
            state.raise(glow::INVALID_OPERATION);
            return;
        };
        if let Some(object) = state.framebuffers.get_mut(&bound) {
            object.depth = renderbuffer;
        }
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(Call::ClearColor([red, green, blue, alpha]));
    }

    fn clear(&self, mask: u32) {
        self.record(Call::Clear(mask));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_flag_keeps_first_error_until_queried() {
        let gl = HeadlessGl::new();
        gl.raise_error(glow::INVALID_VALUE);
        gl.raise_error(glow::INVALID_ENUM);
        assert_eq!(gl.get_error(), glow::INVALID_VALUE);
        assert_eq!(gl.get_error(), glow::NO_ERROR);
    }

    #[test]
    fn test_names_are_never_zero() {
        let gl = HeadlessGl::new();
        assert_ne!(gl.create_texture().unwrap(), 0);
        assert_ne!(gl.create_buffer().unwrap(), 0);
    }

    #[test]
    fn test_binding_unknown_texture_raises_invalid_operation() {
        let gl = HeadlessGl::new();
        gl.bind_texture(glow::TEXTURE_2D, Some(42));
        assert_eq!(gl.get_error(), glow::INVALID_OPERATION);
        assert_eq!(gl.bound_texture(), None);
    }

    #[test]
    fn test_sub_image_writes_rows_into_storage() {
        let gl = HeadlessGl::new();
        let tex = gl.create_texture().unwrap();
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::R8 as i32,
            4,
            2,
            0,
            glow::RED,
            glow::UNSIGNED_BYTE,
            None,
        );
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            0,
            1,
            1,
            2,
            1,
            glow::RED,
            glow::UNSIGNED_BYTE,
            &[7, 9],
        );
        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(gl.texture_contents(tex).unwrap(), vec![0, 0, 0, 0, 0, 7, 9, 0]);
    }

    #[test]
    fn test_sub_image_out_of_bounds_is_rejected() {
        let gl = HeadlessGl::new();
        let tex = gl.create_texture().unwrap();
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::R8 as i32,
            2,
            2,
            0,
            glow::RED,
            glow::UNSIGNED_BYTE,
            None,
        );
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            0,
            0,
            1,
            2,
            2,
            glow::RED,
            glow::UNSIGNED_BYTE,
            &[0; 4],
        );
        assert_eq!(gl.get_error(), glow::INVALID_VALUE);
    }

    fn odd_width_texture(gl: &HeadlessGl) -> u32 {
        let tex = gl.create_texture().unwrap();
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::R8 as i32,
            3,
            2,
            0,
            glow::RED,
            glow::UNSIGNED_BYTE,
            Some(&[1u8, 2, 3, 0, 4, 5, 6][..]),
        );
        tex
    }

    #[test]
    fn test_default_unpack_alignment_pads_client_rows() {
        let gl = HeadlessGl::new();
        let tex = odd_width_texture(&gl);
        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(gl.texture_contents(tex).unwrap(), vec![1, 2, 3, 4, 5, 6]);

        // Tight rows are one byte short of the 4-aligned layout
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            0,
            0,
            0,
            3,
            2,
            glow::RED,
            glow::UNSIGNED_BYTE,
            &[0; 6],
        );
        assert_eq!(gl.get_error(), glow::INVALID_OPERATION);

        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            0,
            0,
            0,
            3,
            2,
            glow::RED,
            glow::UNSIGNED_BYTE,
            &[6, 5, 4, 3, 2, 1],
        );
        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(gl.texture_contents(tex).unwrap(), vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_default_pack_alignment_rejects_tight_readback_buffer() {
        let gl = HeadlessGl::new();
        odd_width_texture(&gl);

        let mut tight = [0u8; 6];
        gl.get_tex_image(glow::TEXTURE_2D, 0, glow::RED, glow::UNSIGNED_BYTE, &mut tight);
        assert_eq!(gl.get_error(), glow::INVALID_OPERATION);
        assert_eq!(tight, [0; 6]);

        let mut padded = [0xEEu8; 7];
        gl.get_tex_image(glow::TEXTURE_2D, 0, glow::RED, glow::UNSIGNED_BYTE, &mut padded);
        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(padded, [1, 2, 3, 0xEE, 4, 5, 6]);

        gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
        gl.get_tex_image(glow::TEXTURE_2D, 0, glow::RED, glow::UNSIGNED_BYTE, &mut tight);
        assert_eq!(gl.get_error(), glow::NO_ERROR);
        assert_eq!(tight, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pixel_store_rejects_bad_alignment() {
        let gl = HeadlessGl::new();
        gl.pixel_store_i32(glow::PACK_ALIGNMENT, 3);
        assert_eq!(gl.get_error(), glow::INVALID_VALUE);
    }

    #[test]
    fn test_call_log_keeps_most_recent_calls() {
        let gl = HeadlessGl::new();
        for unit in 0..(MAX_RECORDED_CALLS as u32 + 10) {
            gl.active_texture(glow::TEXTURE0 + unit % MAX_TEXTURE_UNITS);
        }
        gl.clear(glow::COLOR_BUFFER_BIT);

        let calls = gl.calls();
        assert_eq!(calls.len(), MAX_RECORDED_CALLS);
        assert_eq!(calls.last(), Some(&Call::Clear(glow::COLOR_BUFFER_BIT)));
    }

    #[test]
    fn test_declared_names_handles_layout_and_arrays() {
        let source = "#version 330 core\n\
                      layout (location = 0) in vec2 aPos;\n\
                      in vec2 aUv;\n\
                      uniform mediump float uWeights[4];\n\
                      out vec2 vUv;\n";
        assert_eq!(declared_names(source, &["in"]), vec!["aPos", "aUv"]);
        assert_eq!(declared_names(source, &["uniform"]), vec!["uWeights"]);
    }

    #[test]
    fn test_link_fails_without_fragment_shader() {
        let gl = HeadlessGl::new();
        let vs = gl.create_shader(glow::VERTEX_SHADER).unwrap();
        gl.shader_source(vs, "void main() {}");
        gl.compile_shader(vs);
        let program = gl.create_program().unwrap();
        gl.attach_shader(program, vs);
        gl.link_program(program);
        assert!(!gl.get_program_link_status(program));
        assert!(!gl.get_program_info_log(program).is_empty());
    }

    #[test]
    fn test_framebuffer_without_color_is_incomplete() {
        let gl = HeadlessGl::new();
        let fbo = gl.create_framebuffer().unwrap();
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
        assert_eq!(
            gl.check_framebuffer_status(glow::FRAMEBUFFER),
            glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
        );
    }

    #[test]
    fn test_draw_without_program_raises_invalid_operation() {
        let gl = HeadlessGl::new();
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
        assert_eq!(gl.get_error(), glow::INVALID_OPERATION);
    }
}
