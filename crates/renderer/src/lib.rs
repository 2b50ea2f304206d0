//! Renderer crate for shaderdeck.
//!
//! Takes a resolved [`DemoBundle`] (stage sources plus channel bindings),
//! plans the per-frame draw order, and runs a `wgpu` render loop inside a
//! winit preview window. The overall flow is:
//!
//! ```text
//!   CLI / shaderdeck
//!          │ RendererConfig + DemoBundle
//!          ▼
//!   Renderer::run ──▶ StagePlan::resolve ──▶ GpuState ──▶ winit event loop
//!                                                │ per frame
//!                              buffer passes (plan order) ─▶ image pass
//!                                                │
//!                                         parity swap, present
//! ```
//!
//! Fragment shaders are ShaderToy bodies wrapped at load time so they can be
//! compiled as Vulkan GLSL and fed the expected uniforms and channel
//! bindings. Buffer stages render off screen, with double-buffered targets
//! when a stage's previous frame is consumed.

mod compile;
mod gpu;
mod plan;
mod runtime;
mod types;
mod window;

use std::sync::mpsc::{self, Receiver, SendError, Sender};

use anyhow::Result;

pub use plan::{ChannelRef, PlanError, StagePlan};
pub use runtime::{
    FixedTimeSource, FrameClock, FramePacer, Lifecycle, LifecycleError, Phase, SystemTimeSource,
    TimeSample, TimeSource,
};
pub use types::{
    Antialiasing, ChannelBindings, ChannelSlot, ChannelSource, ColorSpaceMode, DemoBundle,
    FilterMode, RendererConfig, StageDesc, SurfaceAlpha, WrapMode, CHANNEL_COUNT,
    MAX_BUFFER_STAGES,
};

/// One decoded RGBA frame for a video channel. `pixels` must be tightly
/// packed `width * height * 4` bytes.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Host-side handle for pushing decoded video frames into a running
/// renderer. Cloneable; pushes fail once the renderer has shut down.
#[derive(Clone)]
pub struct VideoFeed {
    sender: Sender<VideoFrame>,
}

impl VideoFeed {
    pub fn push(&self, frame: VideoFrame) -> std::result::Result<(), SendError<VideoFrame>> {
        self.sender.send(frame)
    }
}

/// Entry point: owns the renderer configuration and launches the preview
/// loop for one demo.
pub struct Renderer {
    config: RendererConfig,
    video: Option<Receiver<VideoFrame>>,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            video: None,
        }
    }

    /// Creates a feed handle for demos with video channels. Call before
    /// [`Renderer::run`]; repeated calls replace the previous feed.
    pub fn video_feed(&mut self) -> VideoFeed {
        let (sender, receiver) = mpsc::channel();
        self.video = Some(receiver);
        VideoFeed { sender }
    }

    /// Loads the demo and runs the preview window until the user quits.
    /// Must be called on the main thread; winit requires it on most
    /// platforms.
    pub fn run(mut self, bundle: &DemoBundle) -> Result<()> {
        window::run_window(&self.config, bundle, self.video.take())
    }
}
