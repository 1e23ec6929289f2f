//! Fixed pipeline state shared by every backend: the quad, the frame texture parameters and
//! the per-draw pass description.

/// Full-viewport quad as two indexed triangles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadGeometry {
    /// Clip-space positions.
    pub positions: [[f32; 2]; 4],
    /// Texture coordinates, `v = 1` at the top edge.
    pub uvs: [[f32; 2]; 4],
    pub indices: [u16; 6],
}

impl QuadGeometry {
    pub const FULL_VIEWPORT: Self = Self {
        positions: [[-1.0, 1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, -1.0]],
        uvs: [[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]],
        indices: [0, 1, 2, 1, 2, 3],
    };

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Frame texture configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureParams {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    /// Store the bottom image row at `v = 0`.
    pub flip_y: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::ClampToEdge,
            wrap_t: WrapMode::ClampToEdge,
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            flip_y: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthCompare {
    Less,
    LessEqual,
    Always,
}

impl DepthCompare {
    pub fn passes(self, fragment: f32, stored: f32) -> bool {
        match self {
            DepthCompare::Less => fragment < stored,
            DepthCompare::LessEqual => fragment <= stored,
            DepthCompare::Always => true,
        }
    }
}

/// What one `draw` does after the frame upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawPass {
    pub clear_color: [f64; 4],
    pub clear_depth: f32,
    pub depth_compare: DepthCompare,
    pub texture_unit: u32,
    pub index_count: u32,
}

impl DrawPass {
    /// Clear to opaque black, depth-test less-or-equal, sample unit 0, draw the quad.
    pub const QUAD: Self = Self {
        clear_color: [0.0, 0.0, 0.0, 1.0],
        clear_depth: 1.0,
        depth_compare: DepthCompare::LessEqual,
        texture_unit: 0,
        index_count: 6,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_two_triangles_sharing_the_diagonal() {
        let q = QuadGeometry::FULL_VIEWPORT;
        let tris: Vec<_> = q.triangles().collect();
        assert_eq!(tris, vec![[0, 1, 2], [1, 2, 3]]);
        assert_eq!(DrawPass::QUAD.index_count as usize, q.indices.len());
    }

    #[test]
    fn uvs_follow_positions() {
        let q = QuadGeometry::FULL_VIEWPORT;
        for (p, uv) in q.positions.iter().zip(q.uvs.iter()) {
            assert_eq!(uv[0], (p[0] + 1.0) / 2.0);
            assert_eq!(uv[1], (p[1] + 1.0) / 2.0);
        }
    }

    #[test]
    fn less_equal_passes_on_tie() {
        assert!(DepthCompare::LessEqual.passes(1.0, 1.0));
        assert!(!DepthCompare::Less.passes(1.0, 1.0));
    }
}
