//! Texture wrapper for uploading decoded video frames

use crate::config::TextureFilter;
use crate::create::create_texture;
use crate::driver::GlDriver;
use crate::error::{GlError, GlResult};
use crate::program::Uniform;
use log::warn;
use std::rc::Rc;

/// Size in bytes of one component of pixel type `ty`.
///
/// Packed types report the size of the whole packed pixel. Unknown types
/// return 0.
pub fn bpp(ty: u32) -> usize {
    match ty {
        glow::UNSIGNED_BYTE
        | glow::BYTE
        | glow::UNSIGNED_BYTE_3_3_2
        | glow::UNSIGNED_BYTE_2_3_3_REV => 1,

        glow::UNSIGNED_SHORT
        | glow::SHORT
        | glow::HALF_FLOAT
        | glow::UNSIGNED_SHORT_5_6_5
        | glow::UNSIGNED_SHORT_5_6_5_REV
        | glow::UNSIGNED_SHORT_4_4_4_4
        | glow::UNSIGNED_SHORT_4_4_4_4_REV
        | glow::UNSIGNED_SHORT_5_5_5_1
        | glow::UNSIGNED_SHORT_1_5_5_5_REV => 2,

        glow::UNSIGNED_INT
        | glow::INT
        | glow::FLOAT
        | glow::UNSIGNED_INT_8_8_8_8
        | glow::UNSIGNED_INT_8_8_8_8_REV
        | glow::UNSIGNED_INT_10_10_10_2
        | glow::UNSIGNED_INT_2_10_10_10_REV
        | glow::UNSIGNED_INT_24_8
        | glow::UNSIGNED_INT_10F_11F_11F_REV
        | glow::UNSIGNED_INT_5_9_9_9_REV
        | glow::FLOAT_32_UNSIGNED_INT_24_8_REV => 4,

        _ => 0,
    }
}

fn is_packed(ty: u32) -> bool {
    !matches!(
        ty,
        glow::UNSIGNED_BYTE
            | glow::BYTE
            | glow::UNSIGNED_SHORT
            | glow::SHORT
            | glow::HALF_FLOAT
            | glow::UNSIGNED_INT
            | glow::INT
            | glow::FLOAT
    )
}

/// Number of components carried by pixel `format`, 0 if unknown
fn components(format: u32) -> usize {
    match format {
        glow::RED
        | glow::GREEN
        | glow::BLUE
        | glow::ALPHA
        | glow::LUMINANCE
        | glow::RED_INTEGER
        | glow::DEPTH_COMPONENT
        | glow::STENCIL_INDEX => 1,
        glow::RG | glow::LUMINANCE_ALPHA | glow::RG_INTEGER | glow::DEPTH_STENCIL => 2,
        glow::RGB | glow::BGR | glow::RGB_INTEGER => 3,
        glow::RGBA | glow::BGRA | glow::RGBA_INTEGER => 4,
        _ => 0,
    }
}

/// Bytes per pixel for data described by `format`/`ty`, 0 if unsupported.
///
/// For the single-channel layout used by [`Texture`] this equals `bpp(ty)`.
pub fn texel_size(format: u32, ty: u32) -> usize {
    let size = bpp(ty);
    if size == 0 || is_packed(ty) {
        size
    } else {
        size * components(format)
    }
}

/// A 2D texture that frames are streamed into.
///
/// The texture is deleted by [`Texture::destroy`] or when the wrapper is
/// dropped, whichever comes first.
pub struct Texture<G: GlDriver> {
    gl: Rc<G>,
    texture: Option<G::Texture>,
    width: i32,
    height: i32,
    internal_format: i32,
}

impl<G: GlDriver> Texture<G> {
    /// Allocate a single-channel texture of the given size
    pub fn new(
        gl: &Rc<G>,
        width: i32,
        height: i32,
        internal_format: i32,
        filter: TextureFilter,
    ) -> GlResult<Self> {
        let texture = create_texture(
            gl.as_ref(),
            width,
            height,
            internal_format,
            glow::RED,
            glow::UNSIGNED_BYTE,
            filter,
        )?;

        Ok(Self {
            gl: Rc::clone(gl),
            texture: Some(texture),
            width,
            height,
            internal_format,
        })
    }

    fn live(&self) -> GlResult<G::Texture> {
        self.texture.ok_or(GlError::Destroyed("texture"))
    }

    /// Upload a frame whose rows are `pitch` bytes apart.
    ///
    /// When the pitch describes exactly the stored width and the frame fits,
    /// the frame goes up in a single call. Otherwise it is uploaded one row at
    /// a time, dropping padding and any rows beyond the stored height.
    pub fn set_data(
        &self,
        width: i32,
        height: i32,
        pitch: usize,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) -> GlResult<()> {
        let texture = self.live()?;
        let texel = texel_size(format, ty);
        if texel == 0 {
            warn!("Cannot upload texture data with pixel type 0x{:04X}", ty);
            return Err(GlError::UnsupportedPixelType(ty));
        }
        if width < 0 || height < 0 {
            return Err(GlError::InvalidDimensions { width, height });
        }
        let invalid_pitch = || GlError::InvalidPitch {
            pitch,
            width: width as usize,
        };
        if pitch == 0 {
            return Err(invalid_pitch());
        }

        self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        // Rows in `pixels` are tightly packed at `pitch`, never 4-byte aligned
        self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

        let row_width = i32::try_from(pitch / texel).ok();

        if pitch % texel == 0 && row_width == Some(self.width) && height <= self.height {
            let needed = pitch
                .checked_mul(height as usize)
                .ok_or_else(invalid_pitch)?;
            if pixels.len() < needed {
                return Err(GlError::BufferTooSmall {
                    needed,
                    actual: pixels.len(),
                });
            }
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.width,
                height,
                format,
                ty,
                &pixels[..needed],
            );
            return Ok(());
        }

        if width as usize * texel > pitch {
            return Err(invalid_pitch());
        }

        let rows = height.min(self.height) as usize;
        let width = width.min(self.width);
        let row_bytes = width as usize * texel;
        if rows > 0 {
            let needed = pitch
                .checked_mul(rows - 1)
                .and_then(|n| n.checked_add(row_bytes))
                .ok_or_else(invalid_pitch)?;
            if pixels.len() < needed {
                return Err(GlError::BufferTooSmall {
                    needed,
                    actual: pixels.len(),
                });
            }
        }

        for (y, row) in pixels.chunks(pitch).take(rows).enumerate() {
            self.gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                y as i32,
                width,
                1,
                format,
                ty,
                &row[..row_bytes],
            );
        }

        Ok(())
    }

    /// Read the whole texture back into a new buffer
    pub fn get_data(&self, format: u32, ty: u32) -> GlResult<Vec<u8>> {
        let texture = self.live()?;
        let texel = texel_size(format, ty);
        if texel == 0 {
            return Err(GlError::UnsupportedPixelType(ty));
        }

        let size = self.width as usize * self.height as usize * texel;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(size)
            .map_err(|_| GlError::OutOfMemory(size))?;
        pixels.resize(size, 0);

        self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
        self.gl
            .get_tex_image(glow::TEXTURE_2D, 0, format, ty, &mut pixels);
        Ok(pixels)
    }

    pub fn bind(&self) {
        self.gl.bind_texture(glow::TEXTURE_2D, self.texture);
    }

    /// Bind to texture unit `unit` and point `uniform` at it
    pub fn set_uniform(&self, uniform: &Uniform<G>, unit: u32) {
        self.gl.active_texture(glow::TEXTURE0 + unit);
        self.bind();
        self.gl.uniform_1_i32(uniform.location(), unit as i32);
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn internal_format(&self) -> i32 {
        self.internal_format
    }

    /// Driver handle, `None` once destroyed
    pub fn handle(&self) -> Option<G::Texture> {
        self.texture
    }

    /// Delete the texture. Safe to call more than once.
    pub fn destroy(&mut self) {
        if let Some(texture) = self.texture.take() {
            self.gl.delete_texture(texture);
        }
    }
}

impl<G: GlDriver> Drop for Texture<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}
