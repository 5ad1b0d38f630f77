use std::rc::Rc;

use crate::gpu::Gpu;
use crate::Result;

/// Vertex and index buffers of the full-screen quad.
///
/// Buffers are shared between contexts, so the pre-render worker gets a
/// copy of these handles and builds its own vertex array over them.
pub struct QuadBuffers<G: Gpu> {
    pub vertices: G::Buffer,
    pub indices: G::Buffer,
}

impl<G: Gpu> Clone for QuadBuffers<G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: Gpu> Copy for QuadBuffers<G> {}

impl<G: Gpu> std::fmt::Debug for QuadBuffers<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadBuffers")
            .field("vertices", &self.vertices)
            .field("indices", &self.indices)
            .finish()
    }
}

/// The quad plus the main context's vertex array. Owns all three objects.
pub struct QuadMesh<G: Gpu> {
    gpu: Rc<G>,
    buffers: QuadBuffers<G>,
    vao: G::VertexArray,
}

impl<G: Gpu> QuadMesh<G> {
    pub fn new(gpu: &Rc<G>) -> Result<Self> {
        let (vertices, indices) = gpu.create_quad_buffers()?;
        let vao = match gpu.create_vertex_array(vertices, indices) {
            Ok(vao) => vao,
            Err(e) => {
                gpu.delete_buffer(vertices);
                gpu.delete_buffer(indices);
                return Err(e);
            }
        };
        Ok(Self {
            gpu: Rc::clone(gpu),
            buffers: QuadBuffers { vertices, indices },
            vao,
        })
    }

    pub fn buffers(&self) -> QuadBuffers<G> {
        self.buffers
    }

    pub fn draw(&self) {
        self.gpu.draw_quad(self.vao);
    }
}

impl<G: Gpu> Drop for QuadMesh<G> {
    fn drop(&mut self) {
        self.gpu.delete_vertex_array(self.vao);
        self.gpu.delete_buffer(self.buffers.vertices);
        self.gpu.delete_buffer(self.buffers.indices);
    }
}
