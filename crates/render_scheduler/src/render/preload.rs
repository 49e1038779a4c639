//! Background texture preloading
//!
//! Textures are decoded on whatever thread requests them and parked here
//! until the render thread uploads them, one per step or all at once. The
//! list has its own lock so decoding never blocks submission.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::foundation::logging::debug;
use crate::render::backend::GraphicsBackend;
use crate::render::material::TextureId;
use crate::render::RenderResult;

/// Decoded RGBA8 pixels waiting for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    /// Texture the pixels belong to
    pub texture: TextureId,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 pixels
    pub rgba: Vec<u8>,
}

/// Textures waiting for upload, in request order
#[derive(Debug, Default)]
pub struct TexturePreloadList {
    pending: Mutex<VecDeque<DecodedTexture>>,
}

impl TexturePreloadList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an encoded image (PNG) and queue it for upload
    pub fn preload(&self, texture: TextureId, encoded: &[u8]) -> RenderResult<()> {
        let image = image::load_from_memory(encoded)?.to_rgba8();
        let (width, height) = image.dimensions();
        self.preload_rgba(DecodedTexture {
            texture,
            width,
            height,
            rgba: image.into_raw(),
        });
        Ok(())
    }

    /// Queue already decoded pixels for upload
    pub fn preload_rgba(&self, decoded: DecodedTexture) {
        debug!("Queued texture {:?} ({}x{}) for upload", decoded.texture, decoded.width, decoded.height);
        self.pending.lock().push_back(decoded);
    }

    /// Number of textures waiting for upload
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Upload the oldest pending texture
    ///
    /// Returns `false` when nothing was pending. A texture whose upload fails
    /// is put back at the front of the list.
    pub fn load_next(&self, backend: &mut dyn GraphicsBackend) -> RenderResult<bool> {
        let Some(next) = self.pending.lock().pop_front() else {
            return Ok(false);
        };
        if let Err(e) = backend.upload_texture(next.texture, next.width, next.height, &next.rgba) {
            self.pending.lock().push_front(next);
            return Err(e);
        }
        Ok(true)
    }

    /// Upload every pending texture, returning how many were uploaded
    pub fn load_all(&self, backend: &mut dyn GraphicsBackend) -> RenderResult<usize> {
        let mut loaded = 0;
        while self.load_next(backend)? {
            loaded += 1;
        }
        Ok(loaded)
    }
}
