//! Vertex buffers for drawing textured geometry
//!
//! [`VertexBuffer`] is the raw buffer object. [`TexturedQuad`] and
//! [`TexturedTriangleBatch`] fill one with [`Vertex`] records and know how to
//! describe and draw them.

use crate::driver::{check, GlDriver};
use crate::error::{GlError, GlResult};
use crate::program::Attribute;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};
use std::rc::Rc;

/// Position + texture coordinate, laid out as four tightly packed floats
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { x, y, u, v }
    }
}

const STRIDE: i32 = size_of::<Vertex>() as i32;
const POSITION_OFFSET: i32 = offset_of!(Vertex, x) as i32;
const UV_OFFSET: i32 = offset_of!(Vertex, u) as i32;

/// Axis-aligned rectangle given by two opposite corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Normalized device coordinates covering the whole viewport
    pub const FULL_SCREEN: Rect = Rect::new(-1.0, -1.0, 1.0, 1.0);

    /// The whole texture
    pub const FULL_TEXTURE: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);
}

/// A buffer object holding vertex data
pub struct VertexBuffer<G: GlDriver> {
    gl: Rc<G>,
    buffer: Option<G::Buffer>,
}

impl<G: GlDriver> VertexBuffer<G> {
    pub fn new(gl: &Rc<G>) -> GlResult<Self> {
        let buffer = gl.create_buffer().map_err(|message| GlError::Create {
            kind: "buffer",
            message,
        })?;
        if let Err(err) = check(gl.as_ref()) {
            gl.delete_buffer(buffer);
            return Err(err);
        }
        Ok(Self {
            gl: Rc::clone(gl),
            buffer: Some(buffer),
        })
    }

    /// Replace the buffer contents (`STATIC_DRAW`)
    pub fn set_data(&self, data: &[u8]) -> GlResult<()> {
        let buffer = self.buffer.ok_or(GlError::Destroyed("vertex buffer"))?;
        self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        self.gl
            .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW);
        check(self.gl.as_ref())
    }

    pub fn bind(&self) {
        self.gl.bind_buffer(glow::ARRAY_BUFFER, self.buffer);
    }

    /// Point `attribute` at `size` components of `data_type` in the bound buffer.
    ///
    /// Attributes the program does not declare are skipped.
    pub fn enable(&self, attribute: Attribute, size: i32, data_type: u32, stride: i32, offset: i32) {
        let Some(index) = attribute.location() else {
            return;
        };
        self.gl
            .vertex_attrib_pointer_f32(index, size, data_type, false, stride, offset);
        self.gl.enable_vertex_attrib_array(index);
    }

    /// Non-indexed draw of `count` vertices starting at 0
    pub fn draw(&self, mode: u32, count: i32) {
        self.gl.draw_arrays(mode, 0, count);
    }

    pub fn handle(&self) -> Option<G::Buffer> {
        self.buffer
    }

    pub fn destroy(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.gl.delete_buffer(buffer);
        }
    }

    fn enable_pos(&self, attribute: Attribute) {
        self.enable(attribute, 2, glow::FLOAT, STRIDE, POSITION_OFFSET);
    }

    fn enable_uv(&self, attribute: Attribute) {
        self.enable(attribute, 2, glow::FLOAT, STRIDE, UV_OFFSET);
    }
}

impl<G: GlDriver> Drop for VertexBuffer<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// The four corners of a textured quad in triangle-strip order.
///
/// V runs against Y: frame buffers store the top row first, while texture
/// coordinates put v = 0 at the bottom.
pub fn quad_vertices(position: Rect, uv: Rect) -> [Vertex; 4] {
    [
        Vertex::new(position.x0, position.y0, uv.x0, uv.y1),
        Vertex::new(position.x0, position.y1, uv.x0, uv.y0),
        Vertex::new(position.x1, position.y0, uv.x1, uv.y1),
        Vertex::new(position.x1, position.y1, uv.x1, uv.y0),
    ]
}

/// A 4-vertex triangle strip, full screen by default
pub struct TexturedQuad<G: GlDriver> {
    buffer: VertexBuffer<G>,
}

impl<G: GlDriver> TexturedQuad<G> {
    /// Full-screen quad showing the whole texture
    pub fn new(gl: &Rc<G>) -> GlResult<Self> {
        Self::with_rects(gl, Rect::FULL_SCREEN, Rect::FULL_TEXTURE)
    }

    pub fn with_rects(gl: &Rc<G>, position: Rect, uv: Rect) -> GlResult<Self> {
        let buffer = VertexBuffer::new(gl)?;
        buffer.set_data(bytemuck::cast_slice(&quad_vertices(position, uv)))?;
        Ok(Self { buffer })
    }

    pub fn bind(&self) {
        self.buffer.bind();
    }

    pub fn enable_pos(&self, attribute: Attribute) {
        self.buffer.enable_pos(attribute);
    }

    pub fn enable_uv(&self, attribute: Attribute) {
        self.buffer.enable_uv(attribute);
    }

    pub fn draw(&self) {
        self.buffer.draw(glow::TRIANGLE_STRIP, 4);
    }

    pub fn handle(&self) -> Option<G::Buffer> {
        self.buffer.handle()
    }

    pub fn destroy(&mut self) {
        self.buffer.destroy();
    }
}

/// An arbitrary list of textured triangles
pub struct TexturedTriangleBatch<G: GlDriver> {
    buffer: VertexBuffer<G>,
    count: usize,
}

impl<G: GlDriver> TexturedTriangleBatch<G> {
    pub fn new(gl: &Rc<G>, vertices: &[Vertex]) -> GlResult<Self> {
        let buffer = VertexBuffer::new(gl)?;
        buffer.set_data(bytemuck::cast_slice(vertices))?;
        Ok(Self {
            buffer,
            count: vertices.len(),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn bind(&self) {
        self.buffer.bind();
    }

    pub fn enable_pos(&self, attribute: Attribute) {
        self.buffer.enable_pos(attribute);
    }

    pub fn enable_uv(&self, attribute: Attribute) {
        self.buffer.enable_uv(attribute);
    }

    pub fn draw(&self) {
        self.buffer.draw(glow::TRIANGLES, self.count as i32);
    }

    pub fn handle(&self) -> Option<G::Buffer> {
        self.buffer.handle()
    }

    pub fn destroy(&mut self) {
        self.buffer.destroy();
    }
}
