//! Pipeline topology selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Edge length of a compute work-group; must match `@workgroup_size`
pub const WORKGROUP_SIZE: u32 = 8;

/// How the raymarch kernel reaches the screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One fragment-shader pass over a fullscreen quad
    #[default]
    Direct,
    /// Compute pass into a storage texture, then a display blit
    ComputeBlit,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::Direct, Topology::ComputeBlit];

    pub fn name(self) -> &'static str {
        match self {
            Topology::Direct => "direct",
            Topology::ComputeBlit => "compute",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "fragment" => Ok(Topology::Direct),
            "compute" | "compute_blit" | "compute-blit" => Ok(Topology::ComputeBlit),
            other => Err(format!(
                "unknown topology '{other}', expected 'direct' or 'compute'"
            )),
        }
    }
}

/// Work-groups needed to cover a `width` x `height` image
pub fn dispatch_size(width: u32, height: u32) -> [u32; 2] {
    [
        width.div_ceil(WORKGROUP_SIZE),
        height.div_ceil(WORKGROUP_SIZE),
    ]
}
