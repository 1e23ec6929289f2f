//! Software rasterizer implementing the compositor pipeline on the CPU.

use crate::{
    foundation::{
        core::PixelSize,
        error::{AlphaVideoError, AlphaVideoResult},
    },
    media::frame::VideoFrame,
    render::{
        backend::{BackendKind, CompositorBackend, FrameRGBA},
        pipeline::{DrawPass, FilterMode, QuadGeometry, TextureParams},
        shader::{FragmentKernel, ProgramSource, Sampler2D, to_unorm8},
    },
};

/// Texels in upload order with clamp-to-edge sampling.
struct CpuTexture {
    params: TextureParams,
    width: u32,
    height: u32,
    texels: Vec<u8>,
}

impl CpuTexture {
    fn new(params: TextureParams, frame: &VideoFrame) -> Self {
        Self {
            params,
            width: frame.width,
            height: frame.height,
            texels: frame.upload_rows(params.flip_y).into_owned(),
        }
    }

    fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        let idx = (y * self.width as usize + x) * 4;
        let t = &self.texels[idx..idx + 4];
        [
            f32::from(t[0]) / 255.0,
            f32::from(t[1]) / 255.0,
            f32::from(t[2]) / 255.0,
            f32::from(t[3]) / 255.0,
        ]
    }
}

impl Sampler2D for CpuTexture {
    fn sample(&self, uv: [f32; 2]) -> [f32; 4] {
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        // Minification shares the magnification filter; there are no mipmaps.
        if self.params.mag_filter == FilterMode::Nearest {
            return self.texel((fx + 0.5).floor() as i64, (fy + 0.5).floor() as i64);
        }

        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let c00 = self.texel(x0, y0);
        let c10 = self.texel(x0 + 1, y0);
        let c01 = self.texel(x0, y0 + 1);
        let c11 = self.texel(x0 + 1, y0 + 1);
        let mut out = [0.0f32; 4];
        for i in 0..4 {
            let top = c00[i] + (c10[i] - c00[i]) * tx;
            let bottom = c01[i] + (c11[i] - c01[i]) * tx;
            out[i] = top + (bottom - top) * ty;
        }
        out
    }
}

pub struct CpuBackend {
    size: PixelSize,
    kernel: Option<FragmentKernel>,
    geometry: Option<QuadGeometry>,
    texture: Option<CpuTexture>,
    color: Vec<u8>,
    depth: Vec<f32>,
}

impl CpuBackend {
    pub fn new(size: PixelSize) -> Self {
        Self {
            size,
            kernel: None,
            geometry: None,
            texture: None,
            color: vec![0; size.area() * 4],
            depth: vec![1.0; size.area()],
        }
    }

    fn clear(&mut self, pass: &DrawPass) {
        let rgba = pass.clear_color.map(|c| to_unorm8(c as f32));
        for px in self.color.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        self.depth.fill(pass.clear_depth);
    }

    fn rasterize(
        &mut self,
        pass: &DrawPass,
        kernel: FragmentKernel,
        geometry: &QuadGeometry,
        texture: &CpuTexture,
    ) {
        let w = self.size.width as f32;
        let h = self.size.height as f32;
        let screen = geometry
            .positions
            .map(|p| [(p[0] + 1.0) * 0.5 * w, (1.0 - p[1]) * 0.5 * h]);
        // Vertex positions carry z = 0.
        let frag_depth = 0.0f32;

        for tri in geometry
            .triangles()
            .take(pass.index_count as usize / 3)
        {
            let [a, b, c] = tri.map(|i| screen[i]);
            let area = edge(a, b, c);
            if area == 0.0 {
                continue;
            }
            let min_x = a[0].min(b[0]).min(c[0]).floor().max(0.0) as u32;
            let max_x = (a[0].max(b[0]).max(c[0]).ceil() as u32).min(self.size.width);
            let min_y = a[1].min(b[1]).min(c[1]).floor().max(0.0) as u32;
            let max_y = (a[1].max(b[1]).max(c[1]).ceil() as u32).min(self.size.height);

            for py in min_y..max_y {
                for px in min_x..max_x {
                    let p = [px as f32 + 0.5, py as f32 + 0.5];
                    let w0 = edge(b, c, p) / area;
                    let w1 = edge(c, a, p) / area;
                    let w2 = edge(a, b, p) / area;
                    if w0 < -EDGE_EPS || w1 < -EDGE_EPS || w2 < -EDGE_EPS {
                        continue;
                    }
                    let idx = py as usize * self.size.width as usize + px as usize;
                    if !pass.depth_compare.passes(frag_depth, self.depth[idx]) {
                        continue;
                    }

                    let [ua, ub, uc] = tri.map(|i| geometry.uvs[i]);
                    let uv = [
                        w0 * ua[0] + w1 * ub[0] + w2 * uc[0],
                        w0 * ua[1] + w1 * ub[1] + w2 * uc[1],
                    ];
                    let out = kernel(texture, uv);
                    self.depth[idx] = frag_depth;
                    let dst = &mut self.color[idx * 4..idx * 4 + 4];
                    for (d, v) in dst.iter_mut().zip(out) {
                        *d = to_unorm8(v);
                    }
                }
            }
        }
    }
}

/// Pixels on a shared edge are covered by both triangles; they shade identically.
const EDGE_EPS: f32 = 1e-5;

fn edge(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

impl CompositorBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn build_program(&mut self, program: &ProgramSource) -> AlphaVideoResult<()> {
        for (attr, entry) in [
            ("@vertex", program.vertex_entry.as_ref()),
            ("@fragment", program.fragment_entry.as_ref()),
        ] {
            if !program.declares_entry(attr, entry) {
                return Err(AlphaVideoError::shader(format!(
                    "program '{}' failed to link: no {attr} entry point '{entry}'",
                    program.label
                )));
            }
        }
        self.kernel = Some(program.kernel);
        Ok(())
    }

    fn create_geometry(&mut self, geometry: &QuadGeometry) -> AlphaVideoResult<()> {
        if geometry.indices.iter().any(|&i| usize::from(i) >= geometry.positions.len()) {
            return Err(AlphaVideoError::render("quad index out of range"));
        }
        self.geometry = Some(*geometry);
        Ok(())
    }

    fn create_frame_texture(
        &mut self,
        params: &TextureParams,
        placeholder: &VideoFrame,
    ) -> AlphaVideoResult<()> {
        self.texture = Some(CpuTexture::new(*params, placeholder));
        Ok(())
    }

    fn upload_frame(&mut self, frame: &VideoFrame) -> AlphaVideoResult<()> {
        frame
            .validate()
            .map_err(|e| AlphaVideoError::render(format!("rejected frame upload: {e}")))?;
        let texture = self
            .texture
            .as_mut()
            .ok_or_else(|| AlphaVideoError::render("frame texture not created"))?;
        *texture = CpuTexture::new(texture.params, frame);
        Ok(())
    }

    fn draw(&mut self, pass: &DrawPass) -> AlphaVideoResult<()> {
        let kernel = self
            .kernel
            .ok_or_else(|| AlphaVideoError::render("no linked program"))?;
        let geometry = self
            .geometry
            .ok_or_else(|| AlphaVideoError::render("geometry not created"))?;
        let texture = self
            .texture
            .take()
            .ok_or_else(|| AlphaVideoError::render("frame texture not created"))?;

        self.clear(pass);
        self.rasterize(pass, kernel, &geometry, &texture);
        self.texture = Some(texture);
        Ok(())
    }

    fn read_pixels(&mut self) -> AlphaVideoResult<FrameRGBA> {
        Ok(FrameRGBA {
            width: self.size.width,
            height: self.size.height,
            data: self.color.clone(),
        })
    }

    fn target_size(&self) -> PixelSize {
        self.size
    }

    fn release(&mut self) {
        self.kernel = None;
        self.geometry = None;
        self.texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shader::DUAL_SAMPLE_ALPHA_WGSL;

    fn ready_backend(size: PixelSize) -> CpuBackend {
        let mut b = CpuBackend::new(size);
        b.build_program(&ProgramSource::dual_sample_alpha()).unwrap();
        b.create_geometry(&QuadGeometry::FULL_VIEWPORT).unwrap();
        b.create_frame_texture(&TextureParams::default(), &VideoFrame::transparent_pixel())
            .unwrap();
        b
    }

    #[test]
    fn placeholder_draw_is_opaque_black() {
        let mut b = ready_backend(PixelSize::new(4, 4));
        b.draw(&DrawPass::QUAD).unwrap();
        let out = b.read_pixels().unwrap();
        assert!(out.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn linked_wgsl_text_does_not_change_the_cpu_kernel() {
        let other_formula = DUAL_SAMPLE_ALPHA_WGSL.replace("color * alpha", "vec3<f32>(alpha)");
        let mut b = CpuBackend::new(PixelSize::new(2, 2));
        b.build_program(&ProgramSource::dual_sample_alpha().with_wgsl(other_formula))
            .unwrap();
        b.create_geometry(&QuadGeometry::FULL_VIEWPORT).unwrap();
        b.create_frame_texture(&TextureParams::default(), &VideoFrame::transparent_pixel())
            .unwrap();
        let frame = VideoFrame::split(2, 2, [128, 128, 128, 255], [255, 0, 0, 255]).unwrap();
        b.upload_frame(&frame).unwrap();
        b.draw(&DrawPass::QUAD).unwrap();
        let out = b.read_pixels().unwrap();
        assert!(out.data.chunks_exact(4).all(|p| p == [128, 0, 0, 255]));
    }

    #[test]
    fn hand_built_frame_is_rejected_before_upload() {
        let mut b = ready_backend(PixelSize::new(2, 2));
        let bad = VideoFrame {
            width: 4,
            height: 2,
            rgba8: std::sync::Arc::new(Vec::new()),
        };
        let err = b.upload_frame(&bad).unwrap_err();
        assert!(matches!(err, AlphaVideoError::Render(_)));
        b.draw(&DrawPass::QUAD).unwrap();
    }

    #[test]
    fn quad_covers_every_pixel() {
        let mut b = ready_backend(PixelSize::new(7, 5));
        let frame = VideoFrame::split(7, 5, [255, 255, 255, 255], [0, 255, 0, 255]).unwrap();
        b.upload_frame(&frame).unwrap();
        b.draw(&DrawPass::QUAD).unwrap();
        let out = b.read_pixels().unwrap();
        assert!(out.data.chunks_exact(4).all(|p| p == [0, 255, 0, 255]));
    }

    #[test]
    fn orientation_is_preserved_through_flip() {
        // Mask: top row white, bottom row black. Colour: all white.
        let mut data = Vec::new();
        for y in 0..2u32 {
            for x in 0..4u32 {
                let v = if x < 2 && y == 1 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let frame = VideoFrame::new(4, 2, data).unwrap();
        let mut b = ready_backend(PixelSize::new(2, 2));
        b.upload_frame(&frame).unwrap();
        b.draw(&DrawPass::QUAD).unwrap();
        let out = b.read_pixels().unwrap();
        assert_eq!(out.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(out.pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn unlinkable_program_is_rejected() {
        let mut b = CpuBackend::new(PixelSize::new(1, 1));
        let err = b
            .build_program(&ProgramSource::dual_sample_alpha().with_wgsl("not wgsl"))
            .unwrap_err();
        assert!(matches!(err, AlphaVideoError::Shader(_)));
        assert!(b.draw(&DrawPass::QUAD).is_err());
    }

    #[test]
    fn bilinear_sampling_blends_neighbours() {
        let frame = VideoFrame::new(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]).unwrap();
        let tex = CpuTexture::new(TextureParams::default(), &frame);
        let mid = tex.sample([0.5, 0.5]);
        assert!((mid[0] - 0.5).abs() < 1e-6);
        let edge = tex.sample([0.0, 0.5]);
        assert_eq!(edge[0], 0.0);
    }
}
