use std::path::PathBuf;

use anyhow::Result;

/// Shadertoy-style stages expose four optional input channels (`iChannel0-3`).
pub const CHANNEL_COUNT: usize = 4;

/// Most auxiliary buffer stages a demo may declare.
pub const MAX_BUFFER_STAGES: usize = 4;

/// Describes how a channel slot should be populated.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelSource {
    /// Static image decoded at load time.
    Texture { path: PathBuf },
    /// Frame-updatable texture; pixels arrive from the host's decode side
    /// through [`crate::Renderer`]-level video feed pushes.
    Video { path: PathBuf, width: u32, height: u32 },
    /// Deterministic seeded RGBA noise generated at load time.
    Noise { seed: u64, size: u32 },
    /// Another buffer stage's render target. `history` selects the
    /// previous-frame copy; a stage naming itself always reads history.
    Buffer { stage: String, history: bool },
}

/// Texture sampling filter for a channel slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

/// Texture addressing mode for a channel slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
}

/// One bound channel: the source plus its sampling parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSlot {
    pub source: ChannelSource,
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

impl ChannelSlot {
    pub fn new(source: ChannelSource) -> Self {
        Self {
            source,
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
        }
    }
}

/// Collection of channel bindings for one stage, indexed positionally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelBindings {
    slots: [Option<ChannelSlot>; CHANNEL_COUNT],
}

impl ChannelBindings {
    /// Creates an empty bindings table with all channels unassigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the given channel. Out-of-range indices and double binds are
    /// rejected here so the planner can assume well-formed slots.
    pub fn set(&mut self, channel: usize, slot: ChannelSlot) -> Result<()> {
        if channel >= CHANNEL_COUNT {
            anyhow::bail!(
                "channel {} exceeds supported channel count ({})",
                channel,
                CHANNEL_COUNT
            );
        }
        if self.slots[channel].is_some() {
            anyhow::bail!("channel {} is already bound", channel);
        }
        self.slots[channel] = Some(slot);
        Ok(())
    }

    /// Exposes the underlying channel slots for planning and GPU resource
    /// creation.
    pub fn slots(&self) -> &[Option<ChannelSlot>; CHANNEL_COUNT] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// One stage of a demo: an auxiliary buffer pass or the final image pass.
#[derive(Clone, Debug)]
pub struct StageDesc {
    pub name: String,
    /// Raw fragment source body; wrapped with the prelude at compile time.
    pub source: String,
    pub channels: ChannelBindings,
}

/// Fully-resolved demo handed to the renderer: shader text already read,
/// asset references still paths.
#[derive(Clone, Debug)]
pub struct DemoBundle {
    pub key: String,
    pub name: String,
    /// Shared GLSL prelude prepended to every stage body.
    pub common: Option<String>,
    /// Auxiliary stages in declaration order; the planner decides draw order.
    pub buffers: Vec<StageDesc>,
    pub image: StageDesc,
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Choose a sensible default based on Shadertoy expectations
    /// (gamma-encoded swapchain).
    #[default]
    Auto,
    /// Treat shader outputs/textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains/textures.
    Linear,
}

/// Declares how the compositor should treat the swapchain alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceAlpha {
    #[default]
    Opaque,
    Transparent,
}

/// Anti-aliasing policy for the final pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to device support).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Optional FPS cap; None renders every callback.
    pub target_fps: Option<f32>,
    pub antialiasing: Antialiasing,
    pub surface_alpha: SurfaceAlpha,
    pub color_space: ColorSpaceMode,
    /// Evaluate at a fixed timestamp instead of animating.
    pub fixed_time: Option<f32>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            target_fps: None,
            antialiasing: Antialiasing::default(),
            surface_alpha: SurfaceAlpha::default(),
            color_space: ColorSpaceMode::default(),
            fixed_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_channel() {
        let mut bindings = ChannelBindings::new();
        let slot = ChannelSlot::new(ChannelSource::Noise { seed: 0, size: 64 });
        assert!(bindings.set(CHANNEL_COUNT, slot).is_err());
    }

    #[test]
    fn rejects_double_bind() {
        let mut bindings = ChannelBindings::new();
        let slot = ChannelSlot::new(ChannelSource::Noise { seed: 0, size: 64 });
        bindings.set(1, slot.clone()).unwrap();
        assert!(bindings.set(1, slot).is_err());
    }
}
