//! Offscreen render target wrapper

use crate::config::FramebufferOptions;
use crate::create::create_framebuffer;
use crate::driver::GlDriver;
use crate::error::{GlError, GlResult};
use crate::texture::Texture;
use std::rc::Rc;

/// A framebuffer rendering into a [`Texture`], with optional depth storage.
///
/// The colour texture stays owned by the caller and must outlive any drawing
/// into the framebuffer.
pub struct Framebuffer<G: GlDriver> {
    gl: Rc<G>,
    framebuffer: Option<G::Framebuffer>,
    renderbuffer: Option<G::Renderbuffer>,
    width: i32,
    height: i32,
}

impl<G: GlDriver> Framebuffer<G> {
    pub fn new(gl: &Rc<G>, color: &Texture<G>, options: FramebufferOptions) -> GlResult<Self> {
        let texture = color.handle().ok_or(GlError::Destroyed("texture"))?;
        let objects = create_framebuffer(
            gl.as_ref(),
            color.width(),
            color.height(),
            texture,
            options.depth,
            options.stencil,
        )?;

        Ok(Self {
            gl: Rc::clone(gl),
            framebuffer: Some(objects.framebuffer),
            renderbuffer: objects.renderbuffer,
            width: color.width(),
            height: color.height(),
        })
    }

    /// Direct subsequent draws into this framebuffer
    pub fn bind(&self) {
        self.gl.bind_framebuffer(glow::FRAMEBUFFER, self.framebuffer);
    }

    /// Restore the window's default framebuffer
    pub fn unbind(&self) {
        self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn has_depth(&self) -> bool {
        self.renderbuffer.is_some()
    }

    pub fn handle(&self) -> Option<G::Framebuffer> {
        self.framebuffer
    }

    pub fn destroy(&mut self) {
        if let Some(renderbuffer) = self.renderbuffer.take() {
            self.gl.delete_renderbuffer(renderbuffer);
        }
        if let Some(framebuffer) = self.framebuffer.take() {
            self.gl.delete_framebuffer(framebuffer);
        }
    }
}

impl<G: GlDriver> Drop for Framebuffer<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}
