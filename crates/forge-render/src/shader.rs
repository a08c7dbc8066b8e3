//! Shader library loading, scene injection and program checks
//!
//! The library is either a directory on disk (hot-reloadable) or the copies
//! compiled into the crate. Building a program set reads every file it
//! needs, splices the scene into `common.wgsl`, then runs the WGSL front end
//! and validator from `naga`:
//!
//! - parse errors become [`RenderError::Compile`] naming the file they occur in
//! - validation errors, missing entry points, a wrong work-group size or a
//!   vertex/fragment interface mismatch become [`RenderError::Link`]
//!
//! Nothing here touches the GPU, so the same checks run headless in `forge
//! check` and in tests.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use forge_sdf::{Scene, SceneError, inject_scene};
use naga::{Binding, ShaderStage, TypeInner};

use crate::error::{RenderError, Result};
use crate::topology::{Topology, WORKGROUP_SIZE};

pub const COMMON_FILE: &str = "common.wgsl";
pub const DIRECT_FILE: &str = "direct.wgsl";
pub const COMPUTE_FILE: &str = "raymarch_compute.wgsl";
pub const BLIT_FILE: &str = "blit.wgsl";
pub const SCENE_FILE: &str = "scene.json";

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
pub const COMPUTE_ENTRY: &str = "cs_main";

/// Shader sources compiled into the crate
pub mod embedded {
    pub const COMMON: &str = include_str!("../shaders/common.wgsl");
    pub const DIRECT: &str = include_str!("../shaders/direct.wgsl");
    pub const COMPUTE: &str = include_str!("../shaders/raymarch_compute.wgsl");
    pub const BLIT: &str = include_str!("../shaders/blit.wgsl");

    /// `(file name, contents)` for every embedded shader
    pub const FILES: [(&str, &str); 4] = [
        (super::COMMON_FILE, COMMON),
        (super::DIRECT_FILE, DIRECT),
        (super::COMPUTE_FILE, COMPUTE),
        (super::BLIT_FILE, BLIT),
    ];
}

/// Role of a program within a program set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Fullscreen raymarch fragment program (Direct)
    Raymarch,
    /// Raymarch compute kernel (ComputeBlit)
    Compute,
    /// Blit of the output image to the target (ComputeBlit)
    Display,
}

impl ProgramKind {
    pub fn label(self) -> &'static str {
        match self {
            ProgramKind::Raymarch => "raymarch",
            ProgramKind::Compute => "compute",
            ProgramKind::Display => "display",
        }
    }
}

/// Checked WGSL for one program
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub kind: ProgramKind,
    pub wgsl: String,
}

/// Sources for a complete program set
#[derive(Debug, Clone)]
pub enum ProgramSources {
    Direct {
        raymarch: ProgramSource,
    },
    ComputeBlit {
        compute: ProgramSource,
        display: ProgramSource,
    },
}

/// Where shader text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum LibrarySource {
    Directory(PathBuf),
    Embedded,
}

/// Loads, preprocesses and checks the shader files
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    source: LibrarySource,
    default_scene: Scene,
}

impl ShaderLibrary {
    /// Library backed by the shaders compiled into the crate
    pub fn embedded() -> Self {
        Self {
            source: LibrarySource::Embedded,
            default_scene: Scene::demo(),
        }
    }

    /// Library read from `dir` every time a program set is built
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: LibrarySource::Directory(dir.into()),
            default_scene: Scene::demo(),
        }
    }

    /// Scene used when the directory has no `scene.json`
    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.default_scene = scene;
        self
    }

    /// Directory to watch for hot reload, if any
    pub fn directory(&self) -> Option<&Path> {
        match &self.source {
            LibrarySource::Directory(dir) => Some(dir),
            LibrarySource::Embedded => None,
        }
    }

    fn read(&self, file: &str) -> Result<String> {
        match &self.source {
            LibrarySource::Directory(dir) => {
                let path = dir.join(file);
                fs::read_to_string(&path)
                    .map_err(|source| RenderError::ResourceLoad { path, source })
            }
            LibrarySource::Embedded => embedded::FILES
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, text)| (*text).to_string())
                .ok_or_else(|| RenderError::ResourceLoad {
                    path: PathBuf::from(file),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not embedded"),
                }),
        }
    }

    /// The scene for the next build: `scene.json` if present, else the default
    pub fn load_scene(&self) -> Result<Scene> {
        let path = match self.directory() {
            Some(dir) => dir.join(SCENE_FILE),
            None => return Ok(self.default_scene.clone()),
        };
        if !path.is_file() {
            return Ok(self.default_scene.clone());
        }
        let text = fs::read_to_string(&path)
            .map_err(|source| RenderError::ResourceLoad { path, source })?;
        Scene::from_json(&text).map_err(|e| scene_error(&e))
    }

    /// Load and check every program of `topology`
    pub fn build(&self, topology: Topology) -> Result<ProgramSources> {
        let scene = self.load_scene()?;
        scene.validate().map_err(|e| scene_error(&e))?;
        let library = inject_scene(&self.read(COMMON_FILE)?, &scene);

        match topology {
            Topology::Direct => {
                let wgsl = compose(&library, &self.read(DIRECT_FILE)?);
                let module = compile_composed(DIRECT_FILE, library.len(), &wgsl)?;
                link(ProgramKind::Raymarch, &module, &wgsl)?;
                Ok(ProgramSources::Direct {
                    raymarch: ProgramSource {
                        kind: ProgramKind::Raymarch,
                        wgsl,
                    },
                })
            }
            Topology::ComputeBlit => {
                let compute_wgsl = compose(&library, &self.read(COMPUTE_FILE)?);
                let module = compile_composed(COMPUTE_FILE, library.len(), &compute_wgsl)?;
                link(ProgramKind::Compute, &module, &compute_wgsl)?;

                let display_wgsl = self.read(BLIT_FILE)?;
                let module = compile(BLIT_FILE, &display_wgsl)?;
                link(ProgramKind::Display, &module, &display_wgsl)?;

                Ok(ProgramSources::ComputeBlit {
                    compute: ProgramSource {
                        kind: ProgramKind::Compute,
                        wgsl: compute_wgsl,
                    },
                    display: ProgramSource {
                        kind: ProgramKind::Display,
                        wgsl: display_wgsl,
                    },
                })
            }
        }
    }

    /// Build every topology, stopping at the first failure
    pub fn check_all(&self) -> Result<()> {
        for topology in Topology::ALL {
            self.build(topology)?;
        }
        Ok(())
    }

    /// Write the embedded shaders into `dir`, creating it if needed
    pub fn export_embedded(dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|source| RenderError::ResourceLoad {
            path: dir.to_path_buf(),
            source,
        })?;
        for (name, text) in embedded::FILES {
            let path = dir.join(name);
            fs::write(&path, text).map_err(|source| RenderError::ResourceLoad { path, source })?;
        }
        Ok(())
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::embedded()
    }
}

fn scene_error(err: &SceneError) -> RenderError {
    RenderError::compile(SCENE_FILE, err.to_string())
}

fn compose(library: &str, stage: &str) -> String {
    let mut wgsl = String::with_capacity(library.len() + stage.len() + 1);
    wgsl.push_str(library);
    wgsl.push('\n');
    wgsl.push_str(stage);
    wgsl
}

/// Parse WGSL, reporting errors against `stage`
pub fn compile(stage: &str, wgsl: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(wgsl)
        .map_err(|e| RenderError::compile(stage, e.emit_to_string(wgsl)))
}

/// Parse a stage that follows the shared library in `wgsl`, reporting errors
/// located in the first `library_len` bytes against `common.wgsl`
fn compile_composed(stage: &str, library_len: usize, wgsl: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(wgsl).map_err(|e| {
        let in_library = e
            .labels()
            .find_map(|(span, _)| span.to_range())
            .is_some_and(|range| range.start < library_len);
        let file = if in_library { COMMON_FILE } else { stage };
        RenderError::compile(file, e.emit_to_string(wgsl))
    })
}

/// Validate a parsed module and check the entry points `kind` needs
pub fn link(kind: ProgramKind, module: &naga::Module, wgsl: &str) -> Result<()> {
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(module)
        .map_err(|e| RenderError::link(kind.label(), e.emit_to_string(wgsl)))?;

    match kind {
        ProgramKind::Raymarch | ProgramKind::Display => {
            let vertex = entry_point(kind, module, VERTEX_ENTRY, ShaderStage::Vertex)?;
            let fragment = entry_point(kind, module, FRAGMENT_ENTRY, ShaderStage::Fragment)?;
            check_interface(kind, module, vertex, fragment)
        }
        ProgramKind::Compute => {
            let compute = entry_point(kind, module, COMPUTE_ENTRY, ShaderStage::Compute)?;
            let expected = [WORKGROUP_SIZE, WORKGROUP_SIZE, 1];
            if compute.workgroup_size == expected {
                Ok(())
            } else {
                Err(RenderError::link(
                    kind.label(),
                    format!(
                        "{COMPUTE_ENTRY} has work-group size {:?}, expected {:?}",
                        compute.workgroup_size, expected
                    ),
                ))
            }
        }
    }
}

fn entry_point<'m>(
    kind: ProgramKind,
    module: &'m naga::Module,
    name: &str,
    stage: ShaderStage,
) -> Result<&'m naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage)
        .ok_or_else(|| {
            RenderError::link(
                kind.label(),
                format!("missing {stage:?} entry point `{name}`"),
            )
        })
}

/// Every fragment input location must be written by the vertex stage
fn check_interface(
    kind: ProgramKind,
    module: &naga::Module,
    vertex: &naga::EntryPoint,
    fragment: &naga::EntryPoint,
) -> Result<()> {
    let mut outputs = BTreeSet::new();
    if let Some(result) = &vertex.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let mut inputs = BTreeSet::new();
    for arg in &fragment.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    match inputs.difference(&outputs).next() {
        Some(location) => Err(RenderError::link(
            kind.label(),
            format!("fragment input @location({location}) is not written by {VERTEX_ENTRY}"),
        )),
        None => Ok(()),
    }
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        out.insert(*location);
                    }
                }
            }
        }
    }
}
