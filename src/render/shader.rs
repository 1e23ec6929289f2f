//! The dual-sample alpha composite program.
//!
//! Every frame packs a luma mask in its left half and colour in its right half. The fragment
//! stage samples both halves at the same relative position and writes the colour darkened by
//! the mask with alpha forced to 1 (premultiplied against black).

use std::borrow::Cow;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// WGSL for the composite. Bindings: `@group(0) @binding(0)` frame texture,
/// `@group(0) @binding(1)` its sampler. Vertex inputs: location 0 position, location 1 uv.
pub const DUAL_SAMPLE_ALPHA_WGSL: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
  @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) a_position: vec2<f32>, @location(1) a_uv: vec2<f32>) -> VsOut {
  var o: VsOut;
  o.pos = vec4<f32>(a_position, 0.0, 1.0);
  o.uv = a_uv;
  return o;
}

@group(0) @binding(0) var u_frame: texture_2d<f32>;
@group(0) @binding(1) var u_sampler: sampler;

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
  let color = textureSample(u_frame, u_sampler, vec2<f32>(0.5 + in.uv.x / 2.0, in.uv.y)).rgb;
  let alpha = textureSample(u_frame, u_sampler, vec2<f32>(in.uv.x / 2.0, in.uv.y)).r;
  return vec4<f32>(color * alpha, 1.0);
}
"#;

/// A bound texture as seen from a fragment kernel.
pub trait Sampler2D {
    /// Filtered RGBA in `[0, 1]` at normalized coordinates.
    fn sample(&self, uv: [f32; 2]) -> [f32; 4];
}

/// Software counterpart of a program's fragment stage.
pub type FragmentKernel = fn(&dyn Sampler2D, [f32; 2]) -> [f32; 4];

/// `(sample(0.5 + u/2, v).rgb * sample(u/2, v).r, 1)`.
pub fn dual_sample_alpha(tex: &dyn Sampler2D, uv: [f32; 2]) -> [f32; 4] {
    let color = tex.sample([0.5 + uv[0] / 2.0, uv[1]]);
    let alpha = tex.sample([uv[0] / 2.0, uv[1]])[0];
    [color[0] * alpha, color[1] * alpha, color[2] * alpha, 1.0]
}

/// Source of a compositor program.
///
/// GPU backends compile `wgsl`; the software rasterizer links the same entry points and
/// evaluates `kernel` per fragment.
#[derive(Clone, Debug)]
pub struct ProgramSource {
    pub label: Cow<'static, str>,
    pub wgsl: Cow<'static, str>,
    pub vertex_entry: Cow<'static, str>,
    pub fragment_entry: Cow<'static, str>,
    pub kernel: FragmentKernel,
}

impl ProgramSource {
    pub fn dual_sample_alpha() -> Self {
        Self {
            label: Cow::Borrowed("alphavid_dual_sample_alpha"),
            wgsl: Cow::Borrowed(DUAL_SAMPLE_ALPHA_WGSL),
            vertex_entry: Cow::Borrowed(VERTEX_ENTRY),
            fragment_entry: Cow::Borrowed(FRAGMENT_ENTRY),
            kernel: dual_sample_alpha,
        }
    }

    /// Same kernel and entry points, different WGSL text.
    ///
    /// Only GPU backends compile the WGSL. The CPU backend checks that the entry points are
    /// declared and then runs `kernel`, so a different formula in the text has no effect
    /// there.
    pub fn with_wgsl(mut self, wgsl: impl Into<Cow<'static, str>>) -> Self {
        self.wgsl = wgsl.into();
        self
    }

    /// `true` when the WGSL declares `fn <name>` directly under `attr`.
    pub fn declares_entry(&self, attr: &str, name: &str) -> bool {
        let wanted = format!("fn {name}(");
        self.wgsl.match_indices(attr).any(|(idx, _)| {
            self.wgsl[idx + attr.len()..]
                .trim_start()
                .starts_with(wanted.as_str())
        })
    }
}

/// Quantize a `[0, 1]` channel to 8 bits, round to nearest.
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
