use bytemuck::{Pod, Zeroable};

use crate::runtime::FrameContext;
use crate::types::CHANNEL_COUNT;

/// Per-stage uniform block mirrored by the injected `DeckParams` GLSL block.
///
/// The field order matches the std140 declaration exactly: the `vec4`
/// resolution (whose `w` mirrors the time so shaders survive swizzle-happy
/// compilers) is followed by four scalars that fill a 16-byte slot, so no
/// implicit padding exists anywhere and `bytemuck` can upload the struct
/// verbatim. `i_channel_time` and `i_channel_resolution` use 16-byte array
/// strides per std140.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct StageUniforms {
    pub i_resolution: [f32; 4],
    pub i_time: f32,
    pub i_time_delta: f32,
    pub i_frame: i32,
    pub i_sample_rate: f32,
    pub i_mouse: [f32; 4],
    pub i_date: [f32; 4],
    pub i_channel_time: [[f32; 4]; CHANNEL_COUNT],
    pub i_channel_resolution: [[f32; 4]; CHANNEL_COUNT],
}

unsafe impl Zeroable for StageUniforms {}
unsafe impl Pod for StageUniforms {}

impl StageUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            i_resolution: [width as f32, height as f32, 1.0, 0.0],
            i_time: 0.0,
            i_time_delta: 0.0,
            i_frame: 0,
            i_sample_rate: 44_100.0,
            i_mouse: [0.0; 4],
            i_date: [0.0; 4],
            i_channel_time: [[0.0; 4]; CHANNEL_COUNT],
            i_channel_resolution: [[0.0; 4]; CHANNEL_COUNT],
        }
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.i_resolution[0] = width;
        self.i_resolution[1] = height;
    }

    pub fn set_channel_resolution(&mut self, index: usize, resolution: [f32; 4]) {
        if let Some(slot) = self.i_channel_resolution.get_mut(index) {
            *slot = resolution;
        }
    }

    /// Applies the shared per-frame values. Channel resolutions are stage
    /// specific and set separately.
    pub fn apply_frame(&mut self, frame: &FrameContext) {
        self.set_resolution(frame.width as f32, frame.height as f32);
        self.i_time = frame.time;
        self.i_resolution[3] = frame.time;
        self.i_time_delta = frame.delta;
        self.i_frame = frame.frame.min(i32::MAX as u64) as i32;
        self.i_mouse = frame.mouse;
        self.i_date = frame.date;
        for channel in &mut self.i_channel_time {
            channel[0] = frame.time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        // vec4 + 4 scalars + vec4 + vec4 + float[4] + vec3[4] under std140.
        assert_eq!(std::mem::size_of::<StageUniforms>(), 192);
        assert_eq!(std::mem::align_of::<StageUniforms>(), 16);
    }

    #[test]
    fn frame_values_flow_into_uniforms() {
        let mut uniforms = StageUniforms::new(640, 360);
        uniforms.apply_frame(&FrameContext {
            width: 640,
            height: 360,
            time: 2.5,
            delta: 0.016,
            frame: 42,
            mouse: [10.0, 20.0, -10.0, -20.0],
            date: [2026.0, 7.0, 26.0, 0.0],
        });
        assert_eq!(uniforms.i_time, 2.5);
        assert_eq!(uniforms.i_resolution[3], 2.5);
        assert_eq!(uniforms.i_frame, 42);
        assert_eq!(uniforms.i_channel_time[3][0], 2.5);
    }
}
