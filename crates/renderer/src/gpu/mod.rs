//! GPU orchestration for the multi-pass renderer.
//!
//! - `context` owns wgpu instance/device/surface wiring and knows how to
//!   rebuild swapchain state when the window resizes.
//! - `channels` materialises channel assets (textures, noise, video feeds)
//!   and exposes their resolutions for uniforms.
//! - `targets` owns the off-screen buffer textures, including the front/back
//!   pairs that feedback stages alternate between.
//! - `pipeline` compiles wrapped GLSL into render pipelines sharing one bind
//!   group layout pair.
//! - `uniforms` mirrors the injected ShaderToy macros byte-for-byte.
//! - `state` glues everything together: it resolves the stage plan into
//!   pipelines and targets at load time and walks the plan every frame.

mod channels;
mod context;
mod pipeline;
mod state;
mod targets;
mod uniforms;

pub(crate) use state::GpuState;
