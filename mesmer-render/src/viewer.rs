use mesmer_core::uniforms::bind_viewer;
use mesmer_core::{ScreenSize, ViewportState};

use crate::gpu::Gpu;
use crate::prerender::BakedTexture;
use crate::quad::QuadMesh;
use crate::shader::ShaderProgram;

/// Pan/zoom display of a pre-rendered texture.
///
/// The texture spans `[-1, 1]` on both axes of its own plane; the view
/// state uses the same conventions as the live viewport so the same input
/// handling drives both. Panning and zooming never re-run the fractal.
pub struct TextureViewer<G: Gpu> {
    texture: BakedTexture<G>,
    pub view: ViewportState,
}

impl<G: Gpu> TextureViewer<G> {
    pub fn new(texture: BakedTexture<G>) -> Self {
        Self {
            texture,
            view: ViewportState::default(),
        }
    }

    pub fn texture(&self) -> &BakedTexture<G> {
        &self.texture
    }

    /// Show the whole texture again.
    pub fn reset_view(&mut self) {
        self.view = ViewportState::default();
    }

    pub fn draw(&self, gpu: &G, program: &ShaderProgram<G>, quad: &QuadMesh<G>, size: ScreenSize) {
        program.apply(&bind_viewer(&self.view, size));
        gpu.bind_texture(0, Some(self.texture.texture()));
        quad.draw();
        gpu.bind_texture(0, None);
    }
}
