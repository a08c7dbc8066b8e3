//! Pipeline manager
//!
//! [`Renderer`] owns the active program set, the fullscreen quad and, for the
//! compute topology, the output image. It exposes the create / draw / resize
//! / reload / destroy lifecycle.
//!
//! Exactly one complete program set is active at any time. A reload builds
//! the replacement off to the side and swaps it in only when every program
//! in the set was created; on failure the active set is untouched.

use crate::backend::GpuBackend;
use crate::camera::Camera;
use crate::error::{RenderError, Result};
use crate::shader::{ProgramSources, ShaderLibrary};
use crate::topology::{Topology, dispatch_size};
use crate::uniforms::FrameUniforms;

/// Linked programs for one topology
enum ProgramSet<B: GpuBackend> {
    Direct {
        raymarch: B::RenderProgram,
    },
    ComputeBlit {
        compute: B::ComputeProgram,
        display: B::RenderProgram,
    },
}

/// Output image together with the size it was allocated at
struct OutputImage<T> {
    texture: T,
    width: u32,
    height: u32,
}

fn build_program_set<B: GpuBackend>(
    backend: &mut B,
    library: &ShaderLibrary,
    topology: Topology,
) -> Result<ProgramSet<B>> {
    match library.build(topology)? {
        ProgramSources::Direct { raymarch } => Ok(ProgramSet::Direct {
            raymarch: backend.create_render_program(&raymarch)?,
        }),
        ProgramSources::ComputeBlit { compute, display } => {
            let compute = backend.create_compute_program(&compute)?;
            let display = backend.create_render_program(&display)?;
            Ok(ProgramSet::ComputeBlit { compute, display })
        }
    }
}

/// Raymarching pipeline manager
pub struct Renderer<B: GpuBackend> {
    backend: B,
    library: ShaderLibrary,
    topology: Topology,
    programs: ProgramSet<B>,
    generation: u64,
    quad: B::Quad,
    output: Option<OutputImage<B::OutputTexture>>,
    width: u32,
    height: u32,
}

impl<B: GpuBackend> Renderer<B> {
    /// Build every resource for `topology` at the given viewport size.
    ///
    /// Any failure is wrapped in [`RenderError::Creation`]; resources built
    /// before the failure are released.
    pub fn create(
        backend: B,
        library: ShaderLibrary,
        topology: Topology,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Self::build(backend, library, topology, width, height)
            .map_err(|e| RenderError::Creation(Box::new(e)))
    }

    fn build(
        mut backend: B,
        library: ShaderLibrary,
        topology: Topology,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let programs = build_program_set(&mut backend, &library, topology)?;
        let quad = backend.create_fullscreen_quad()?;

        let mut renderer = Self {
            backend,
            library,
            topology,
            programs,
            generation: 1,
            quad,
            output: None,
            width,
            height,
        };
        renderer.allocate_output()?;

        tracing::info!(
            topology = %topology,
            width,
            height,
            "renderer created"
        );
        Ok(renderer)
    }

    /// (Re)allocate the compute output image for the current viewport
    fn allocate_output(&mut self) -> Result<()> {
        if self.topology != Topology::ComputeBlit || self.width == 0 || self.height == 0 {
            return Ok(());
        }
        if let Some(output) = &self.output {
            if output.width == self.width && output.height == self.height {
                return Ok(());
            }
        }

        // Release the old image before allocating its replacement
        self.output = None;
        let texture = self.backend.create_output_texture(self.width, self.height)?;
        self.output = Some(OutputImage {
            texture,
            width: self.width,
            height: self.height,
        });
        Ok(())
    }

    /// Render one frame into `target`.
    ///
    /// Does nothing while the viewport has a zero dimension.
    pub fn draw(&mut self, time: f32, camera: &Camera, target: &B::Target) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let uniforms = FrameUniforms::new(camera, self.width, self.height, time);

        match &self.programs {
            ProgramSet::Direct { raymarch } => {
                self.backend.write_uniforms(&uniforms);
                self.backend.draw_direct(raymarch, &self.quad, target);
            }
            ProgramSet::ComputeBlit { compute, display } => {
                let Some(output) = &self.output else {
                    return;
                };
                self.backend.write_uniforms(&uniforms);
                self.backend.dispatch_and_blit(
                    compute,
                    display,
                    &output.texture,
                    &self.quad,
                    dispatch_size(output.width, output.height),
                    target,
                );
            }
        }
    }

    /// Record the new viewport size and resize the output image
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width != self.width || height != self.height {
            tracing::debug!(width, height, "viewport resized");
            self.width = width;
            self.height = height;
        }

        let result = self.allocate_output();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "failed to allocate output image");
        }
        result
    }

    /// Rebuild the program set from the shader library.
    ///
    /// On success the new set replaces the old one and the generation
    /// advances. On failure the error is returned and the active set keeps
    /// running.
    pub fn reload(&mut self) -> Result<()> {
        match build_program_set(&mut self.backend, &self.library, self.topology) {
            Ok(programs) => {
                self.programs = programs;
                self.generation += 1;
                tracing::info!(generation = self.generation, "shaders reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    generation = self.generation,
                    error = %e,
                    "shader reload failed, keeping previous programs"
                );
                Err(e)
            }
        }
    }

    /// Release every GPU resource
    pub fn destroy(self) {
        tracing::debug!(generation = self.generation, "renderer destroyed");
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Current viewport `(width, height)`
    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Identifier of the active program set, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Size of the compute output image, if one is allocated
    pub fn output_texture_size(&self) -> Option<(u32, u32)> {
        self.output.as_ref().map(|o| (o.width, o.height))
    }

    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shader::{COMMON_FILE, ProgramKind, ProgramSource};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Uniforms([f32; 2]),
        Direct {
            program: u32,
        },
        ComputeBlit {
            compute: u32,
            display: u32,
            workgroups: [u32; 2],
            texture: (u32, u32),
        },
    }

    /// Shared view into what the fake backend has done
    #[derive(Default, Clone)]
    struct Tracker {
        live_textures: Rc<Cell<usize>>,
        textures_created: Rc<Cell<usize>>,
        calls: Rc<RefCell<Vec<Call>>>,
        fail_programs: Rc<Cell<bool>>,
        fail_textures: Rc<Cell<bool>>,
    }

    impl Tracker {
        fn take_calls(&self) -> Vec<Call> {
            self.calls.borrow_mut().drain(..).collect()
        }
    }

    struct FakeBackend {
        tracker: Tracker,
        next_id: u32,
    }

    struct FakeProgram {
        id: u32,
    }

    struct FakeTexture {
        width: u32,
        height: u32,
        live: Rc<Cell<usize>>,
    }

    impl Drop for FakeTexture {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    impl FakeBackend {
        fn new(tracker: &Tracker) -> Self {
            Self {
                tracker: tracker.clone(),
                next_id: 0,
            }
        }

        fn program(&mut self, source: &ProgramSource) -> Result<FakeProgram> {
            if self.tracker.fail_programs.get() {
                return Err(RenderError::link(source.kind.label(), "injected failure"));
            }
            self.next_id += 1;
            Ok(FakeProgram { id: self.next_id })
        }
    }

    impl GpuBackend for FakeBackend {
        type RenderProgram = FakeProgram;
        type ComputeProgram = FakeProgram;
        type OutputTexture = FakeTexture;
        type Quad = ();
        type Target = ();

        fn create_render_program(&mut self, source: &ProgramSource) -> Result<FakeProgram> {
            assert_ne!(source.kind, ProgramKind::Compute);
            self.program(source)
        }

        fn create_compute_program(&mut self, source: &ProgramSource) -> Result<FakeProgram> {
            assert_eq!(source.kind, ProgramKind::Compute);
            self.program(source)
        }

        fn create_output_texture(&mut self, width: u32, height: u32) -> Result<FakeTexture> {
            if self.tracker.fail_textures.get() {
                return Err(RenderError::Device("out of memory".into()));
            }
            self.tracker.live_textures.set(self.tracker.live_textures.get() + 1);
            self.tracker.textures_created.set(self.tracker.textures_created.get() + 1);
            Ok(FakeTexture {
                width,
                height,
                live: self.tracker.live_textures.clone(),
            })
        }

        fn create_fullscreen_quad(&mut self) -> Result<()> {
            Ok(())
        }

        fn write_uniforms(&mut self, uniforms: &FrameUniforms) {
            self.tracker.calls.borrow_mut().push(Call::Uniforms(uniforms.resolution));
        }

        fn draw_direct(&mut self, program: &FakeProgram, _quad: &(), _target: &()) {
            self.tracker.calls.borrow_mut().push(Call::Direct { program: program.id });
        }

        fn dispatch_and_blit(
            &mut self,
            compute: &FakeProgram,
            display: &FakeProgram,
            texture: &FakeTexture,
            _quad: &(),
            workgroups: [u32; 2],
            _target: &(),
        ) {
            self.tracker.calls.borrow_mut().push(Call::ComputeBlit {
                compute: compute.id,
                display: display.id,
                workgroups,
                texture: (texture.width, texture.height),
            });
        }
    }

    fn shader_dir() -> (tempfile::TempDir, ShaderLibrary) {
        let dir = tempfile::tempdir().unwrap();
        ShaderLibrary::export_embedded(dir.path()).unwrap();
        let library = ShaderLibrary::from_dir(dir.path());
        (dir, library)
    }

    fn create(
        tracker: &Tracker,
        library: ShaderLibrary,
        topology: Topology,
        width: u32,
        height: u32,
    ) -> Result<Renderer<FakeBackend>> {
        Renderer::create(FakeBackend::new(tracker), library, topology, width, height)
    }

    #[test]
    fn test_create_direct() {
        let tracker = Tracker::default();
        let renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::Direct, 640, 480).unwrap();
        assert_eq!(renderer.topology(), Topology::Direct);
        assert_eq!(renderer.viewport(), (640, 480));
        assert_eq!(renderer.generation(), 1);
        assert_eq!(renderer.output_texture_size(), None);
        assert_eq!(tracker.live_textures.get(), 0);
    }

    #[test]
    fn test_create_compute_allocates_output() {
        let tracker = Tracker::default();
        let renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 640, 480).unwrap();
        assert_eq!(renderer.output_texture_size(), Some((640, 480)));
        assert_eq!(tracker.live_textures.get(), 1);
    }

    #[test]
    fn test_create_with_broken_shader_fails_cleanly() {
        let (dir, library) = shader_dir();
        std::fs::write(dir.path().join(COMMON_FILE), "fn broken( {").unwrap();
        let tracker = Tracker::default();
        let err = create(&tracker, library, Topology::ComputeBlit, 64, 64).err().unwrap();
        assert!(matches!(err, RenderError::Creation(_)));
        assert!(matches!(err.root_cause(), RenderError::Compile { .. }));
        assert_eq!(tracker.live_textures.get(), 0);
    }

    #[test]
    fn test_create_texture_failure_is_creation_error() {
        let tracker = Tracker::default();
        tracker.fail_textures.set(true);
        let err = create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 64, 64)
            .err()
            .unwrap();
        assert!(matches!(err.root_cause(), RenderError::Device(_)));
    }

    #[test]
    fn test_draw_direct_uses_active_program() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::Direct, 320, 200).unwrap();
        renderer.draw(0.0, &Camera::default(), &());
        assert_eq!(
            tracker.take_calls(),
            vec![Call::Uniforms([320.0, 200.0]), Call::Direct { program: 1 }]
        );
    }

    #[test]
    fn test_draw_compute_dispatches_ceil_workgroups() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 1600, 900).unwrap();
        renderer.draw(1.0, &Camera::default(), &());
        assert_eq!(
            tracker.take_calls(),
            vec![
                Call::Uniforms([1600.0, 900.0]),
                Call::ComputeBlit {
                    compute: 1,
                    display: 2,
                    workgroups: [200, 113],
                    texture: (1600, 900),
                }
            ]
        );
    }

    #[test]
    fn test_zero_viewport_draw_is_noop() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 0, 480).unwrap();
        assert_eq!(renderer.output_texture_size(), None);
        renderer.draw(0.0, &Camera::default(), &());
        assert!(tracker.take_calls().is_empty());

        renderer.resize(100, 50).unwrap();
        assert_eq!(renderer.output_texture_size(), Some((100, 50)));
        renderer.draw(0.0, &Camera::default(), &());
        assert_eq!(tracker.take_calls().len(), 2);
    }

    #[test]
    fn test_resize_round_trip_keeps_one_texture() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 800, 600).unwrap();

        renderer.resize(1024, 768).unwrap();
        assert_eq!(renderer.viewport(), (1024, 768));
        assert_eq!(renderer.output_texture_size(), Some((1024, 768)));
        assert_eq!(tracker.live_textures.get(), 1);

        renderer.resize(800, 600).unwrap();
        assert_eq!(renderer.output_texture_size(), Some((800, 600)));
        assert_eq!(tracker.live_textures.get(), 1);
        assert_eq!(tracker.textures_created.get(), 3);
    }

    #[test]
    fn test_resize_to_zero_skips_allocation() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 800, 600).unwrap();
        renderer.resize(0, 0).unwrap();
        assert_eq!(renderer.viewport(), (0, 0));
        assert_eq!(tracker.textures_created.get(), 1);
        renderer.draw(0.0, &Camera::default(), &());
        assert!(tracker.take_calls().is_empty());

        // Restoring the old size reuses the existing image
        renderer.resize(800, 600).unwrap();
        assert_eq!(tracker.textures_created.get(), 1);
        assert_eq!(tracker.live_textures.get(), 1);
    }

    #[test]
    fn test_resize_direct_has_no_texture() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::Direct, 800, 600).unwrap();
        renderer.resize(1920, 1080).unwrap();
        assert_eq!(renderer.output_texture_size(), None);
        assert_eq!(tracker.textures_created.get(), 0);
    }

    #[test]
    fn test_failed_texture_allocation_leaves_no_output() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 800, 600).unwrap();
        tracker.fail_textures.set(true);
        assert!(renderer.resize(1024, 768).is_err());
        assert_eq!(renderer.output_texture_size(), None);
        assert_eq!(tracker.live_textures.get(), 0);
        renderer.draw(0.0, &Camera::default(), &());
        assert!(tracker.take_calls().is_empty());

        // Retrying at the same size allocates again
        tracker.fail_textures.set(false);
        renderer.resize(1024, 768).unwrap();
        assert_eq!(renderer.output_texture_size(), Some((1024, 768)));
        assert_eq!(tracker.live_textures.get(), 1);
    }

    #[test]
    fn test_reload_swaps_programs() {
        let (_dir, library) = shader_dir();
        let tracker = Tracker::default();
        let mut renderer = create(&tracker, library, Topology::Direct, 64, 64).unwrap();

        renderer.reload().unwrap();
        assert_eq!(renderer.generation(), 2);
        renderer.draw(0.0, &Camera::default(), &());
        assert_eq!(tracker.take_calls()[1], Call::Direct { program: 2 });
    }

    #[test]
    fn test_reload_with_invalid_source_keeps_previous_programs() {
        let (dir, library) = shader_dir();
        let tracker = Tracker::default();
        let mut renderer = create(&tracker, library, Topology::ComputeBlit, 64, 64).unwrap();

        std::fs::write(dir.path().join(COMMON_FILE), "this is not wgsl").unwrap();
        let err = renderer.reload().unwrap_err();
        assert!(matches!(err, RenderError::Compile { .. }));
        assert_eq!(renderer.generation(), 1);

        renderer.draw(0.0, &Camera::default(), &());
        assert!(matches!(
            tracker.take_calls()[1],
            Call::ComputeBlit {
                compute: 1,
                display: 2,
                ..
            }
        ));

        // Fixing the file makes the next reload succeed
        std::fs::write(
            dir.path().join(COMMON_FILE),
            crate::shader::embedded::COMMON,
        )
        .unwrap();
        renderer.reload().unwrap();
        assert_eq!(renderer.generation(), 2);
    }

    #[test]
    fn test_reload_backend_failure_keeps_generation() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::Direct, 64, 64).unwrap();
        tracker.fail_programs.set(true);
        assert!(matches!(renderer.reload(), Err(RenderError::Link { .. })));
        assert_eq!(renderer.generation(), 1);
        renderer.draw(0.0, &Camera::default(), &());
        assert_eq!(tracker.take_calls()[1], Call::Direct { program: 1 });
    }

    #[test]
    fn test_reload_keeps_output_image() {
        let tracker = Tracker::default();
        let mut renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 64, 64).unwrap();
        renderer.reload().unwrap();
        assert_eq!(tracker.textures_created.get(), 1);
        assert_eq!(renderer.output_texture_size(), Some((64, 64)));
    }

    #[test]
    fn test_destroy_releases_texture() {
        let tracker = Tracker::default();
        let renderer =
            create(&tracker, ShaderLibrary::embedded(), Topology::ComputeBlit, 64, 64).unwrap();
        assert_eq!(tracker.live_textures.get(), 1);
        renderer.destroy();
        assert_eq!(tracker.live_textures.get(), 0);
    }
}
