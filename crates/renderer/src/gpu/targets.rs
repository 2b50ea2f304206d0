//! Off-screen render targets for buffer stages.
//!
//! Every buffer stage renders into a float target at the surface resolution.
//! Stages whose previous frame is consumed own a front/back pair driven by a
//! single global [`PingPong`] parity: all pairs present the same "last frame"
//! side within a frame and flip together after submit, so a consumer can
//! never observe a half-swapped frame.

use winit::dpi::PhysicalSize;

/// Texture format used for all buffer stage targets. Float so feedback
/// accumulators keep precision across frames.
pub(crate) const BUFFER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Global double-buffer parity. Flipped exactly once per rendered frame,
/// after the frame's work is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PingPong {
    flip: bool,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the texture written this frame.
    pub fn write_index(self) -> usize {
        usize::from(self.flip)
    }

    /// Index of the texture holding the previous frame.
    pub fn read_index(self) -> usize {
        1 - self.write_index()
    }

    pub fn swap(&mut self) {
        self.flip = !self.flip;
    }
}

/// One off-screen color target.
pub(crate) struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub resolution: [f32; 4],
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, label: &str, size: PhysicalSize<u32>) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BUFFER_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            resolution: [size.width.max(1) as f32, size.height.max(1) as f32, 1.0, 0.0],
        }
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Target storage for one buffer stage: a single texture when nothing reads
/// its history, a front/back pair otherwise.
pub(crate) enum StageTarget {
    Single(RenderTarget),
    Paired([RenderTarget; 2]),
}

impl StageTarget {
    pub fn new(
        device: &wgpu::Device,
        stage_name: &str,
        size: PhysicalSize<u32>,
        paired: bool,
    ) -> Self {
        if paired {
            Self::Paired([
                RenderTarget::new(device, &format!("{stage_name} target A"), size),
                RenderTarget::new(device, &format!("{stage_name} target B"), size),
            ])
        } else {
            Self::Single(RenderTarget::new(device, &format!("{stage_name} target"), size))
        }
    }

    /// View the stage renders into this frame.
    pub fn write_view(&self, parity: PingPong) -> &wgpu::TextureView {
        match self {
            Self::Single(target) => &target.view,
            Self::Paired(pair) => &pair[parity.write_index()].view,
        }
    }

    /// View consumers read when they want this frame's output. Identical to
    /// the write view; the stage plan guarantees the producing pass has
    /// already been encoded.
    pub fn same_frame_view(&self, parity: PingPong) -> &wgpu::TextureView {
        self.write_view(parity)
    }

    /// View holding the previous frame. Only paired targets are ever read at
    /// history age; a single target returns its one view so a stale binding
    /// shows last frame's pixels rather than nothing.
    pub fn history_view(&self, parity: PingPong) -> &wgpu::TextureView {
        match self {
            Self::Single(target) => &target.view,
            Self::Paired(pair) => &pair[parity.read_index()].view,
        }
    }

    pub fn resolution(&self) -> [f32; 4] {
        match self {
            Self::Single(target) => target.resolution,
            Self::Paired(pair) => pair[0].resolution,
        }
    }

    pub fn texture_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Paired(_) => 2,
        }
    }

    pub fn destroy(&self) {
        match self {
            Self::Single(target) => target.destroy(),
            Self::Paired(pair) => {
                for target in pair {
                    target.destroy();
                }
            }
        }
    }
}

/// Counts live GPU objects the session has allocated so teardown can be
/// asserted complete. Purely bookkeeping; wgpu frees the actual memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourceLedger {
    pub textures: usize,
    pub buffers: usize,
    pub pipelines: usize,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_textures(&mut self, count: usize) {
        self.textures += count;
    }

    pub fn add_buffers(&mut self, count: usize) {
        self.buffers += count;
    }

    pub fn add_pipelines(&mut self, count: usize) {
        self.pipelines += count;
    }

    /// Clears the ledger; repeated calls are a no-op, matching the
    /// idempotent teardown contract.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_alternates_and_never_collides() {
        let mut parity = PingPong::new();
        assert_eq!(parity.write_index(), 0);
        assert_eq!(parity.read_index(), 1);
        parity.swap();
        assert_eq!(parity.write_index(), 1);
        assert_eq!(parity.read_index(), 0);
        parity.swap();
        assert_eq!(parity.write_index(), 0);
    }

    #[test]
    fn paired_slots_read_last_frames_write() {
        // Two slots stand in for a Paired target's textures; each frame
        // writes the frame number and checks the read side still holds the
        // previous frame's value.
        let mut slots = [u64::MAX, u64::MAX];
        let mut parity = PingPong::new();
        for frame in 0..6u64 {
            if frame > 0 {
                assert_eq!(slots[parity.read_index()], frame - 1);
            }
            slots[parity.write_index()] = frame;
            parity.swap();
        }
    }

    #[test]
    fn self_feedback_advances_one_generation_per_frame() {
        // Trivial evolution rule: next generation = previous + 1. Two frames
        // must yield exactly two generations.
        let mut slots = [0u32; 2];
        let mut parity = PingPong::new();
        for _ in 0..2 {
            slots[parity.write_index()] = slots[parity.read_index()] + 1;
            parity.swap();
        }
        assert_eq!(slots[parity.read_index()], 2);
    }

    #[test]
    fn ledger_clear_is_idempotent() {
        let mut ledger = ResourceLedger::new();
        ledger.add_textures(3);
        ledger.add_buffers(2);
        ledger.add_pipelines(2);
        assert!(!ledger.is_empty());
        ledger.clear();
        assert!(ledger.is_empty());
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
