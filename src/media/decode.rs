use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    foundation::{
        core::{Fps, PixelSize},
        error::{AlphaVideoError, AlphaVideoResult},
    },
    media::frame::VideoFrame,
};

/// Where a stream's bytes come from.
#[derive(Clone, Debug)]
pub enum MediaResource {
    /// Stream directly from a path or URL.
    Url(String),
    /// Bytes fetched up front and held in memory.
    Blob(Arc<[u8]>),
}

impl MediaResource {
    pub fn describe(&self) -> String {
        match self {
            MediaResource::Url(u) => u.clone(),
            MediaResource::Blob(b) => format!("blob ({} bytes)", b.len()),
        }
    }
}

/// A fully decoded stream: every frame plus the rate they play at.
#[derive(Clone, Debug)]
pub struct DecodedStream {
    pub fps: Fps,
    pub frames: Vec<VideoFrame>,
}

impl DecodedStream {
    pub fn new(fps: Fps, frames: Vec<VideoFrame>) -> AlphaVideoResult<Self> {
        if frames.is_empty() {
            return Err(AlphaVideoError::media("decoded stream has no frames"));
        }
        Ok(Self { fps, frames })
    }

    pub fn duration(&self) -> Duration {
        self.fps.frames_to_duration(self.frames.len() as u64)
    }

    /// Frame shown at `t`; times past the end hold the last frame.
    pub fn frame_at(&self, t: Duration) -> &VideoFrame {
        let idx = (self.fps.frame_at(t) as usize).min(self.frames.len() - 1);
        &self.frames[idx]
    }

    pub fn size(&self) -> PixelSize {
        self.frames[0].size()
    }
}

/// Turns a resource into decoded frames.
pub trait FrameDecoder {
    fn decode(&mut self, resource: &MediaResource) -> AlphaVideoResult<DecodedStream>;
}

/// In-memory frames, used by tests and demos.
#[derive(Clone, Debug)]
pub struct SyntheticDecoder {
    outcome: Result<DecodedStream, String>,
}

impl SyntheticDecoder {
    pub fn new(fps: Fps, frames: Vec<VideoFrame>) -> AlphaVideoResult<Self> {
        Ok(Self {
            outcome: Ok(DecodedStream::new(fps, frames)?),
        })
    }

    /// `count` identical split frames: grey mask on the left, colour on the right.
    pub fn split_frames(
        fps: Fps,
        count: usize,
        half_width: u32,
        height: u32,
        mask: [u8; 4],
        color: [u8; 4],
    ) -> AlphaVideoResult<Self> {
        let frame = VideoFrame::split(half_width, height, mask, color)?;
        Self::new(fps, vec![frame; count])
    }

    /// A decoder whose every load fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
        }
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn decode(&mut self, _resource: &MediaResource) -> AlphaVideoResult<DecodedStream> {
        self.outcome.clone().map_err(AlphaVideoError::media)
    }
}

/// A directory of still images played in lexical file-name order.
#[derive(Clone, Debug)]
pub struct ImageSequenceDecoder {
    fps: Fps,
}

impl ImageSequenceDecoder {
    pub fn new(fps: Fps) -> Self {
        Self { fps }
    }

    fn list_frames(dir: &Path) -> AlphaVideoResult<Vec<PathBuf>> {
        use anyhow::Context as _;

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read image sequence dir '{}'", dir.display()))?
        {
            let path = entry
                .with_context(|| format!("list image sequence dir '{}'", dir.display()))?
                .path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl FrameDecoder for ImageSequenceDecoder {
    fn decode(&mut self, resource: &MediaResource) -> AlphaVideoResult<DecodedStream> {
        let MediaResource::Url(url) = resource else {
            return Err(AlphaVideoError::capability(
                "image sequences cannot be loaded from a blob",
            ));
        };
        let dir = local_path(url);
        let paths = Self::list_frames(&dir)?;
        if paths.is_empty() {
            return Err(AlphaVideoError::media(format!(
                "no png/jpeg frames found in '{}'",
                dir.display()
            )));
        }

        let mut frames = Vec::with_capacity(paths.len());
        let mut size: Option<PixelSize> = None;
        for path in &paths {
            let img = image::open(path)
                .map_err(|e| {
                    AlphaVideoError::media(format!("decode frame '{}': {e}", path.display()))
                })?
                .to_rgba8();
            let frame = VideoFrame::from_image(img)?;
            match size {
                None => size = Some(frame.size()),
                Some(s) if s != frame.size() => {
                    return Err(AlphaVideoError::media(format!(
                        "frame '{}' is {}x{}, expected {}x{}",
                        path.display(),
                        frame.width,
                        frame.height,
                        s.width,
                        s.height
                    )));
                }
                Some(_) => {}
            }
            frames.push(frame);
        }
        tracing::debug!(dir = %dir.display(), frames = frames.len(), "decoded image sequence");
        DecodedStream::new(self.fps, frames)
    }
}

/// Stream metadata reported by `ffprobe`.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
}

impl VideoSourceInfo {
    pub fn fps(&self) -> AlphaVideoResult<Fps> {
        Fps::new(self.fps_num, self.fps_den)
    }
}

/// Decodes through the system `ffprobe` / `ffmpeg` binaries.
#[derive(Clone, Debug, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "media-ffmpeg")]
mod ffmpeg {
    use std::{
        io::Write as _,
        process::{Command, Stdio},
        sync::Arc,
    };

    use super::VideoSourceInfo;
    use crate::foundation::error::{AlphaVideoError, AlphaVideoResult};

    /// Input argument plus the bytes to pipe to stdin, if any.
    pub(super) struct Input<'a> {
        pub arg: String,
        pub stdin: Option<&'a Arc<[u8]>>,
    }

    pub(super) fn is_ffmpeg_on_path() -> bool {
        ["ffmpeg", "ffprobe"].iter().all(|bin| {
            Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn run(mut cmd: Command, stdin: Option<&Arc<[u8]>>) -> AlphaVideoResult<std::process::Output> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        let mut child = cmd
            .spawn()
            .map_err(|e| AlphaVideoError::media(format!("failed to spawn {cmd:?}: {e}")))?;

        // Feed stdin from a helper thread so a full stdout pipe cannot deadlock us.
        let writer = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => {
                let bytes = Arc::clone(bytes);
                Some(std::thread::spawn(move || {
                    // ffmpeg may close stdin early once it has what it needs.
                    let _ = pipe.write_all(&bytes);
                }))
            }
            _ => None,
        };
        let out = child
            .wait_with_output()
            .map_err(|e| AlphaVideoError::media(format!("failed to wait for ffmpeg: {e}")))?;
        if let Some(w) = writer {
            let _ = w.join();
        }
        Ok(out)
    }

    pub(super) fn probe_video(input: &Input<'_>) -> AlphaVideoResult<VideoSourceInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(&input.arg);
        let out = run(cmd, input.stdin)?;
        if !out.status.success() {
            return Err(AlphaVideoError::media(format!(
                "ffprobe failed for '{}': {}",
                input.arg,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| AlphaVideoError::media(format!("ffprobe json parse failed: {e}")))?;
        let video_stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| AlphaVideoError::media("no video stream found"))?;
        let width = video_stream
            .width
            .ok_or_else(|| AlphaVideoError::media("missing video width from ffprobe"))?;
        let height = video_stream
            .height
            .ok_or_else(|| AlphaVideoError::media("missing video height from ffprobe"))?;
        let (fps_num, fps_den) =
            parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
                .ok_or_else(|| AlphaVideoError::media("invalid video r_frame_rate"))?;
        let duration_sec = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(VideoSourceInfo {
            width,
            height,
            fps_num,
            fps_den,
            duration_sec,
        })
    }

    pub(super) fn decode_all_rgba8(
        input: &Input<'_>,
        info: &VideoSourceInfo,
    ) -> AlphaVideoResult<Vec<Vec<u8>>> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-i"])
            .arg(&input.arg)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"]);
        let out = run(cmd, input.stdin)?;
        if !out.status.success() {
            return Err(AlphaVideoError::media(format!(
                "ffmpeg video decode failed for '{}': {}",
                input.arg,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let expected_len = info.width as usize * info.height as usize * 4;
        if expected_len == 0 {
            return Err(AlphaVideoError::media(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }
        if !out.stdout.len().is_multiple_of(expected_len) {
            return Err(AlphaVideoError::media(format!(
                "decoded video has invalid size: got {} bytes, expected multiples of {expected_len}",
                out.stdout.len()
            )));
        }
        Ok(out
            .stdout
            .chunks_exact(expected_len)
            .map(<[u8]>::to_vec)
            .collect())
    }

    fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
        let mut parts = s.split('/');
        let a = parts.next()?.parse::<u32>().ok()?;
        let b = parts.next()?.parse::<u32>().ok()?;
        if a == 0 || b == 0 {
            return None;
        }
        Some((a, b))
    }

    #[cfg(test)]
    mod tests {
        use super::parse_ff_ratio;

        #[test]
        fn ratio_parsing_rejects_zero() {
            assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
            assert_eq!(parse_ff_ratio("0/0"), None);
            assert_eq!(parse_ff_ratio("25"), None);
        }
    }
}

impl FfmpegDecoder {
    /// Probe a stream without decoding its frames.
    #[cfg(feature = "media-ffmpeg")]
    #[tracing::instrument(skip_all, fields(source = %resource.describe()))]
    pub fn probe(&self, resource: &MediaResource) -> AlphaVideoResult<VideoSourceInfo> {
        ffmpeg::probe_video(&ffmpeg_input(resource))
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn probe(&self, _resource: &MediaResource) -> AlphaVideoResult<VideoSourceInfo> {
        Err(AlphaVideoError::capability(
            "video files require the 'media-ffmpeg' feature",
        ))
    }

    #[cfg(feature = "media-ffmpeg")]
    pub fn is_available() -> bool {
        ffmpeg::is_ffmpeg_on_path()
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    pub fn is_available() -> bool {
        false
    }
}

#[cfg(feature = "media-ffmpeg")]
fn ffmpeg_input(resource: &MediaResource) -> ffmpeg::Input<'_> {
    match resource {
        MediaResource::Url(url) => ffmpeg::Input {
            arg: local_path(url).to_string_lossy().into_owned(),
            stdin: None,
        },
        MediaResource::Blob(bytes) => ffmpeg::Input {
            arg: "pipe:0".to_string(),
            stdin: Some(bytes),
        },
    }
}

impl FrameDecoder for FfmpegDecoder {
    #[cfg(feature = "media-ffmpeg")]
    fn decode(&mut self, resource: &MediaResource) -> AlphaVideoResult<DecodedStream> {
        if !ffmpeg::is_ffmpeg_on_path() {
            return Err(AlphaVideoError::capability(
                "ffmpeg/ffprobe were not found on PATH",
            ));
        }
        let input = ffmpeg_input(resource);
        let info = ffmpeg::probe_video(&input)?;
        let fps = info.fps()?;
        let frames = ffmpeg::decode_all_rgba8(&input, &info)?
            .into_iter()
            .map(|data| VideoFrame::new(info.width, info.height, data))
            .collect::<AlphaVideoResult<Vec<_>>>()?;
        tracing::debug!(
            source = %resource.describe(),
            width = info.width,
            height = info.height,
            frames = frames.len(),
            "decoded video via ffmpeg"
        );
        DecodedStream::new(fps, frames)
    }

    #[cfg(not(feature = "media-ffmpeg"))]
    fn decode(&mut self, resource: &MediaResource) -> AlphaVideoResult<DecodedStream> {
        Err(AlphaVideoError::capability(format!(
            "cannot decode '{}': video files require the 'media-ffmpeg' feature",
            resource.describe()
        )))
    }
}

/// Picks a decoder from the resource: directories play as image sequences, everything else
/// goes through ffmpeg.
#[derive(Clone, Debug)]
pub struct AutoDecoder {
    sequence: ImageSequenceDecoder,
    ffmpeg: FfmpegDecoder,
}

impl AutoDecoder {
    pub fn new(sequence_fps: Fps) -> Self {
        Self {
            sequence: ImageSequenceDecoder::new(sequence_fps),
            ffmpeg: FfmpegDecoder::new(),
        }
    }
}

impl Default for AutoDecoder {
    fn default() -> Self {
        Self::new(Fps { num: 30, den: 1 })
    }
}

impl FrameDecoder for AutoDecoder {
    fn decode(&mut self, resource: &MediaResource) -> AlphaVideoResult<DecodedStream> {
        match resource {
            MediaResource::Url(url) if local_path(url).is_dir() => self.sequence.decode(resource),
            _ => self.ffmpeg.decode(resource),
        }
    }
}

/// Strip a `file://` scheme, leaving a filesystem path.
pub fn local_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}
