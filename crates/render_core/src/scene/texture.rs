//! Texture images referenced by materials

use crate::render::device::{TextureDescriptor, TextureFormat};

/// Texel data sampled by materials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Optional name
    pub name: String,
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Packed texels
    pub data: Vec<u8>,
    /// Build a mip chain on upload
    pub generate_mipmaps: bool,
    version: u32,
}

impl Texture {
    /// RGBA8 texture from packed texels
    pub fn rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            name: String::new(),
            width,
            height,
            format: TextureFormat::Rgba8,
            data,
            generate_mipmaps: true,
            version: 0,
        }
    }

    /// Monotonic change counter
    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Allocation parameters for the device
    pub fn descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            width: self.width,
            height: self.height,
            format: self.format,
            generate_mipmaps: self.generate_mipmaps,
        }
    }
}
