use anyhow::{Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::plan::StagePlan;
use crate::runtime::{FrameContext, Lifecycle, Phase};
use crate::types::{Antialiasing, ColorSpaceMode, DemoBundle, SurfaceAlpha, CHANNEL_COUNT};

use super::channels::{self, ChannelSlotResources, SlotTexture};
use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, StagePipeline};
use super::targets::{PingPong, ResourceLedger, StageTarget, BUFFER_TARGET_FORMAT};
use super::uniforms::StageUniforms;

/// One fully-materialised stage: compiled pipeline, channel resources, and
/// the bind groups for both double-buffer parities.
struct StageResources {
    name: String,
    pipeline: StagePipeline,
    uniform_bind_group: wgpu::BindGroup,
    channels: Vec<ChannelSlotResources>,
    /// Channel bind group per parity. Stages without history-backed inputs
    /// get two identical groups; picking by parity is then harmless.
    channel_bind_groups: [wgpu::BindGroup; 2],
    /// `iChannelResolution` values, refreshed when targets are rebuilt.
    channel_resolutions: [[f32; 4]; CHANNEL_COUNT],
}

struct MultisampleTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Owns every GPU resource of a loaded demo and walks the stage plan each
/// frame. Construction is all-or-nothing: every stage compiles and every
/// asset decodes before the first target is allocated, so a broken demo
/// never leaves a half-loaded session behind.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    plan: StagePlan,
    buffer_stages: Vec<StageResources>,
    buffer_targets: Vec<StageTarget>,
    image_stage: StageResources,
    parity: PingPong,
    uniforms: StageUniforms,
    multisample_target: Option<MultisampleTarget>,
    lifecycle: Lifecycle,
    ledger: ResourceLedger,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        bundle: &DemoBundle,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
        surface_alpha: SurfaceAlpha,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let plan = StagePlan::resolve(bundle)
            .with_context(|| format!("demo '{}' has an invalid stage graph", bundle.key))?;

        let context = GpuContext::new(target, initial_size, antialiasing, color_space, surface_alpha)?;
        let layouts = PipelineLayouts::new(&context.device)?;
        let mut ledger = ResourceLedger::new();

        let common = bundle.common.as_deref();
        let uniform_size = std::mem::size_of::<StageUniforms>() as u64;

        // Compile every pipeline before touching assets or targets; a shader
        // error anywhere fails the load with nothing else allocated.
        let mut buffer_pipelines = Vec::with_capacity(bundle.buffers.len());
        for stage in &bundle.buffers {
            buffer_pipelines.push(StagePipeline::new(
                &context.device,
                &layouts,
                &stage.name,
                &stage.source,
                common,
                BUFFER_TARGET_FORMAT,
                1,
                uniform_size,
            )?);
        }
        let image_pipeline = StagePipeline::new(
            &context.device,
            &layouts,
            &bundle.image.name,
            &bundle.image.source,
            common,
            context.surface_format,
            context.sample_count,
            uniform_size,
        )?;
        ledger.add_pipelines(buffer_pipelines.len() + 1);
        ledger.add_buffers(buffer_pipelines.len() + 1);

        // Assets next. A missing texture or undecodable image is fatal.
        let mut buffer_channels = Vec::with_capacity(bundle.buffers.len());
        for (index, stage) in bundle.buffers.iter().enumerate() {
            buffer_channels.push(channels::create_stage_resources(
                &context.device,
                &context.queue,
                &stage.name,
                &stage.channels,
                &plan.buffer_channels[index],
                context.color_space,
            )?);
        }
        let image_channels = channels::create_stage_resources(
            &context.device,
            &context.queue,
            &bundle.image.name,
            &bundle.image.channels,
            &plan.image_channels,
            context.color_space,
        )?;
        for resources in buffer_channels.iter().chain(std::iter::once(&image_channels)) {
            ledger.add_textures(
                resources
                    .iter()
                    .filter(|slot| matches!(slot.source, SlotTexture::Owned { .. }))
                    .count(),
            );
        }

        let buffer_targets: Vec<StageTarget> = bundle
            .buffers
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                StageTarget::new(&context.device, &stage.name, context.size, plan.history[index])
            })
            .collect();
        ledger.add_textures(buffer_targets.iter().map(StageTarget::texture_count).sum());

        let buffer_stages = bundle
            .buffers
            .iter()
            .zip(buffer_pipelines)
            .zip(buffer_channels)
            .map(|((stage, pipeline), channels)| {
                build_stage(
                    &context.device,
                    &layouts,
                    &stage.name,
                    pipeline,
                    channels,
                    &buffer_targets,
                )
            })
            .collect::<Vec<_>>();
        let image_stage = build_stage(
            &context.device,
            &layouts,
            &bundle.image.name,
            image_pipeline,
            image_channels,
            &buffer_targets,
        );

        let multisample_target = (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        });
        if multisample_target.is_some() {
            ledger.add_textures(1);
        }

        let uniforms = StageUniforms::new(context.size.width, context.size.height);

        let mut lifecycle = Lifecycle::new();
        lifecycle.mark_loaded()?;
        debug!(
            demo = %bundle.key,
            buffers = buffer_stages.len(),
            programs = plan.program_count(),
            draw_calls = plan.draw_calls_per_frame(),
            targets = plan.target_count(),
            sample_count = context.sample_count,
            "demo loaded"
        );

        Ok(Self {
            context,
            layouts,
            plan,
            buffer_stages,
            buffer_targets,
            image_stage,
            parity: PingPong::new(),
            uniforms,
            multisample_target,
            lifecycle,
            ledger,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        self.lifecycle.mark_running()?;
        Ok(())
    }

    pub(crate) fn has_video_channel(&self) -> bool {
        self.all_stages().any(|stage| {
            stage.channels.iter().any(ChannelSlotResources::is_video)
        })
    }

    /// Uploads a decoded RGBA frame into every video feed channel.
    pub(crate) fn push_video_frame(&self, data: &[u8]) {
        for stage in self.all_stages() {
            for slot in &stage.channels {
                slot.update_video(&self.context.queue, data);
            }
        }
    }

    fn all_stages(&self) -> impl Iterator<Item = &StageResources> {
        self.buffer_stages
            .iter()
            .chain(std::iter::once(&self.image_stage))
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.uniforms
            .set_resolution(new_size.width as f32, new_size.height as f32);

        // Reallocate buffer targets at the new size. Feedback content does
        // not survive a resize; stages start again from cleared targets.
        for target in &self.buffer_targets {
            target.destroy();
        }
        self.buffer_targets = self
            .buffer_stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                StageTarget::new(
                    &self.context.device,
                    &stage.name,
                    self.context.size,
                    self.plan.history[index],
                )
            })
            .collect();

        for stage in self
            .buffer_stages
            .iter_mut()
            .chain(std::iter::once(&mut self.image_stage))
        {
            refresh_stage_targets(
                &self.context.device,
                &self.layouts,
                stage,
                &self.buffer_targets,
            );
        }

        self.multisample_target = (self.context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &self.context.device,
                self.context.surface_format,
                self.context.size,
                self.context.sample_count,
            )
        });
    }

    /// Renders one frame: buffer stages in plan order, then the image pass,
    /// one submission, then the parity flip. Every consumer inside the frame
    /// saw a consistent parity; the flip publishes this frame as "previous".
    pub(crate) fn render(&mut self, frame_ctx: &FrameContext) -> Result<(), wgpu::SurfaceError> {
        if !self.lifecycle.is_running() {
            debug!(phase = ?self.lifecycle.phase(), "frame skipped outside the Running phase");
            return Ok(());
        }
        let frame = self.context.surface.get_current_texture()?;
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.uniforms.apply_frame(frame_ctx);

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        let parity = self.parity;
        for &stage_index in &self.plan.order {
            let stage = &self.buffer_stages[stage_index];
            let attachment = self.buffer_targets[stage_index].write_view(parity);
            self.write_stage_uniforms(stage);
            encode_stage(&mut encoder, stage, parity, attachment, None);
        }

        self.write_stage_uniforms(&self.image_stage);
        let (attachment, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(&surface_view)),
            None => (&surface_view, None),
        };
        encode_stage(
            &mut encoder,
            &self.image_stage,
            parity,
            attachment,
            resolve_target,
        );

        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.parity.swap();
        frame.present();
        Ok(())
    }

    fn write_stage_uniforms(&self, stage: &StageResources) {
        let mut uniforms = self.uniforms;
        for (index, resolution) in stage.channel_resolutions.iter().enumerate() {
            uniforms.set_channel_resolution(index, *resolution);
        }
        self.context.queue.write_buffer(
            &stage.pipeline.uniform_buffer,
            0,
            bytemuck::bytes_of(&uniforms),
        );
    }

    /// Releases the demo's GPU resources. Safe to call more than once.
    pub(crate) fn destroy(&mut self) {
        if self.lifecycle.phase() == Phase::Destroyed {
            return;
        }
        if let Err(err) = self.lifecycle.mark_destroyed() {
            tracing::warn!(error = %err, "teardown requested before load completed");
            return;
        }
        for target in &self.buffer_targets {
            target.destroy();
        }
        for stage in self
            .buffer_stages
            .iter()
            .chain(std::iter::once(&self.image_stage))
        {
            for slot in &stage.channels {
                if let SlotTexture::Owned { texture, .. } = &slot.source {
                    texture.destroy();
                }
            }
        }
        if let Some(msaa) = &self.multisample_target {
            msaa.texture.destroy();
        }
        self.ledger.clear();
        debug!(released = self.ledger.is_empty(), "demo resources released");
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn build_stage(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    name: &str,
    pipeline: StagePipeline,
    channels: Vec<ChannelSlotResources>,
    targets: &[StageTarget],
) -> StageResources {
    let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{name} uniform bind group")),
        layout: &layouts.uniform_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: pipeline.uniform_buffer.as_entire_binding(),
        }],
    });

    let channel_bind_groups = [
        build_channel_bind_group(device, layouts, name, &channels, targets, PingPong::new()),
        build_channel_bind_group(device, layouts, name, &channels, targets, {
            let mut parity = PingPong::new();
            parity.swap();
            parity
        }),
    ];
    let channel_resolutions = channel_resolutions(&channels, targets);

    StageResources {
        name: name.to_string(),
        pipeline,
        uniform_bind_group,
        channels,
        channel_bind_groups,
        channel_resolutions,
    }
}

/// Rebuilds the target-dependent pieces of a stage after targets were
/// reallocated.
fn refresh_stage_targets(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    stage: &mut StageResources,
    targets: &[StageTarget],
) {
    stage.channel_bind_groups = [
        build_channel_bind_group(
            device,
            layouts,
            &stage.name,
            &stage.channels,
            targets,
            PingPong::new(),
        ),
        build_channel_bind_group(device, layouts, &stage.name, &stage.channels, targets, {
            let mut parity = PingPong::new();
            parity.swap();
            parity
        }),
    ];
    stage.channel_resolutions = channel_resolutions(&stage.channels, targets);
}

fn channel_resolutions(
    channels: &[ChannelSlotResources],
    targets: &[StageTarget],
) -> [[f32; 4]; CHANNEL_COUNT] {
    let mut resolutions = [[0.0; 4]; CHANNEL_COUNT];
    for (index, slot) in channels.iter().enumerate().take(CHANNEL_COUNT) {
        resolutions[index] = match &slot.source {
            SlotTexture::Owned { .. } => slot.resolution,
            SlotTexture::Stage { index: stage, .. } => targets[*stage].resolution(),
        };
    }
    resolutions
}

fn build_channel_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    name: &str,
    channels: &[ChannelSlotResources],
    targets: &[StageTarget],
    parity: PingPong,
) -> wgpu::BindGroup {
    let views: Vec<&wgpu::TextureView> = channels
        .iter()
        .map(|slot| match &slot.source {
            SlotTexture::Owned { view, .. } => view,
            SlotTexture::Stage {
                index,
                history: false,
            } => targets[*index].same_frame_view(parity),
            SlotTexture::Stage {
                index,
                history: true,
            } => targets[*index].history_view(parity),
        })
        .collect();

    let mut entries = Vec::with_capacity(channels.len() * 2);
    for (index, (slot, view)) in channels.iter().zip(views.iter()).enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&slot.sampler),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{name} channel bind group")),
        layout: &layouts.channel_layout,
        entries: &entries,
    })
}

fn encode_stage(
    encoder: &mut wgpu::CommandEncoder,
    stage: &StageResources,
    parity: PingPong,
    attachment: &wgpu::TextureView,
    resolve_target: Option<&wgpu::TextureView>,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(&format!("{} pass", stage.name)),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: attachment,
            depth_slice: None,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    render_pass.set_pipeline(&stage.pipeline.pipeline);
    render_pass.set_bind_group(0, &stage.uniform_bind_group, &[]);
    render_pass.set_bind_group(
        1,
        &stage.channel_bind_groups[parity.write_index()],
        &[],
    );
    render_pass.draw(0..3, 0..1);
}
