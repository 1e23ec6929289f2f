//! alphavid plays videos that carry their own alpha channel.
//!
//! Every source frame is twice as wide as the visible output: the left half holds a luma
//! mask, the right half holds colour. The [`Compositor`] samples both halves and writes one
//! opaque pixel per output pixel. The [`MediaSource`] gates drawing until the stream has both
//! started playing and reported progress, and the [`AlphaVideoPlayer`] ties the two together
//! with a cancelable render loop.
//!
//! - Build [`PlayerOptions`] (or load a [`PlayerConfig`])
//! - Create an [`AlphaVideoPlayer`] on a [`Surface`] or inside a [`Container`]
//! - Call [`AlphaVideoPlayer::pump`] once per display refresh
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod media;
pub mod player;
pub mod render;
pub mod schedule;

pub use crate::foundation::core::{Bound, Fps, PixelSize};
pub use crate::foundation::error::{AlphaVideoError, AlphaVideoResult};

pub use crate::config::PlayerConfig;
pub use crate::media::decode::{
    AutoDecoder, DecodedStream, FfmpegDecoder, FrameDecoder, ImageSequenceDecoder,
    MediaResource, SyntheticDecoder, VideoSourceInfo,
};
pub use crate::media::element::{MediaElement, VideoElement};
pub use crate::media::events::{
    EventTarget, MediaError, MediaErrorKind, MediaEvent, MediaEventKind, Subscription,
};
pub use crate::media::fetch::{BlobFetcher, FsFetcher};
pub use crate::media::frame::VideoFrame;
pub use crate::media::readiness::{Readiness, ReadinessSignal};
pub use crate::media::source::{MediaSource, VideoHooks, VideoOptions};
pub use crate::player::{AlphaVideoPlayer, PlayerOptions};
pub use crate::render::backend::{BackendKind, CompositorBackend, FrameRGBA, create_backend};
pub use crate::render::compositor::{Compositor, CompositorStats};
pub use crate::render::cpu::CpuBackend;
pub use crate::render::fallback::FallbackCanvas;
#[cfg(feature = "gpu")]
pub use crate::render::gpu::GpuBackend;
pub use crate::render::pipeline::{DrawPass, QuadGeometry, TextureParams};
pub use crate::render::shader::ProgramSource;
pub use crate::render::surface::{Container, Surface, SurfaceHost, SurfaceId};
pub use crate::schedule::{
    FrameHandle, FrameScheduler, LoopCanceller, ManualScheduler, RenderLoop, SharedScheduler,
};
