//! Graphics backend seam
//!
//! [`crate::Renderer`] drives a backend through this trait and never sees
//! device objects directly. The backend value doubles as the capability token
//! for the graphics context: whoever owns it may create GPU resources.

use crate::error::Result;
use crate::shader::ProgramSource;
use crate::uniforms::FrameUniforms;

/// GPU operations needed by the pipeline manager.
///
/// Resources are plain owned values; dropping one releases it.
pub trait GpuBackend {
    /// Linked vertex+fragment program (raymarch or display)
    type RenderProgram;
    /// Linked compute program
    type ComputeProgram;
    /// Storage-writable, sampleable color image
    type OutputTexture;
    /// Fullscreen-quad vertex buffer
    type Quad;
    /// Where frames are drawn (a surface texture view, an offscreen view)
    type Target: ?Sized;

    fn create_render_program(&mut self, source: &ProgramSource) -> Result<Self::RenderProgram>;

    fn create_compute_program(&mut self, source: &ProgramSource) -> Result<Self::ComputeProgram>;

    fn create_output_texture(&mut self, width: u32, height: u32) -> Result<Self::OutputTexture>;

    fn create_fullscreen_quad(&mut self) -> Result<Self::Quad>;

    fn write_uniforms(&mut self, uniforms: &FrameUniforms);

    /// One render pass of `program` over `quad` into `target`
    fn draw_direct(
        &mut self,
        program: &Self::RenderProgram,
        quad: &Self::Quad,
        target: &Self::Target,
    );

    /// Compute pass into `texture`, then a display pass sampling it.
    ///
    /// Both passes are recorded in order so the storage writes are visible
    /// to the display pass.
    fn dispatch_and_blit(
        &mut self,
        compute: &Self::ComputeProgram,
        display: &Self::RenderProgram,
        texture: &Self::OutputTexture,
        quad: &Self::Quad,
        workgroups: [u32; 2],
        target: &Self::Target,
    );
}
