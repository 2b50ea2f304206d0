use anyhow::{Context, Result};
use image::imageops::flip_vertical_in_place;
use image::GenericImageView;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::plan::ChannelRef;
use crate::types::{ChannelBindings, ChannelSource, FilterMode, WrapMode, CHANNEL_COUNT};

use super::context::SurfaceColorSpace;

pub(crate) const VIDEO_BYTES_PER_PIXEL: u32 = 4;

/// Where a channel slot's texture view comes from at bind time.
pub(crate) enum SlotTexture {
    /// Texture owned by this slot (image, noise, video feed, or the black
    /// placeholder for unbound slots).
    Owned {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        /// Present for video feed slots; frames pushed from the host must
        /// match this size exactly.
        video_size: Option<(u32, u32)>,
    },
    /// Another buffer stage's render target; the view is picked per parity
    /// when bind groups are built.
    Stage { index: usize, history: bool },
}

/// GPU resources for one channel slot of one stage.
pub(crate) struct ChannelSlotResources {
    pub source: SlotTexture,
    pub sampler: wgpu::Sampler,
    /// `iChannelResolution` entry. Stage-backed slots are filled in from the
    /// target's resolution by the caller.
    pub resolution: [f32; 4],
}

impl ChannelSlotResources {
    pub(crate) fn is_video(&self) -> bool {
        matches!(
            self.source,
            SlotTexture::Owned {
                video_size: Some(_),
                ..
            }
        )
    }

    /// Uploads a frame into a video feed slot. Mismatched payloads are
    /// dropped with a warning rather than tearing the texture.
    pub(crate) fn update_video(&self, queue: &wgpu::Queue, data: &[u8]) {
        let SlotTexture::Owned {
            texture,
            video_size: Some((width, height)),
            ..
        } = &self.source
        else {
            return;
        };

        let expected_len = (width * height * VIDEO_BYTES_PER_PIXEL) as usize;
        if data.len() != expected_len {
            tracing::warn!(
                expected_len,
                actual_len = data.len(),
                "video frame ignored due to mismatched payload size"
            );
            return;
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * VIDEO_BYTES_PER_PIXEL),
                rows_per_image: Some(*height),
            },
            wgpu::Extent3d {
                width: *width,
                height: *height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Materialises the channel resources for one stage. A missing or
/// undecodable asset fails the whole load; callers tear down and report
/// rather than render with placeholders.
pub(crate) fn create_stage_resources(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    stage_name: &str,
    bindings: &ChannelBindings,
    refs: &[Option<ChannelRef>; CHANNEL_COUNT],
    color_space: SurfaceColorSpace,
) -> Result<Vec<ChannelSlotResources>> {
    let mut resources = Vec::with_capacity(CHANNEL_COUNT);
    for (index, (slot, resolved)) in bindings.slots().iter().zip(refs.iter()).enumerate() {
        let resource = match (slot, resolved) {
            (Some(slot), Some(ChannelRef::Asset)) => match &slot.source {
                ChannelSource::Texture { path } => {
                    let (texture, view, resolution) =
                        load_image_texture(device, queue, index, path, color_space).with_context(
                            || format!("stage '{stage_name}' channel {index} failed to load"),
                        )?;
                    ChannelSlotResources {
                        source: SlotTexture::Owned {
                            texture,
                            view,
                            video_size: None,
                        },
                        sampler: make_sampler(device, slot.filter, slot.wrap),
                        resolution,
                    }
                }
                ChannelSource::Noise { seed, size } => {
                    let (texture, view, resolution) =
                        create_noise_texture(device, queue, index, *seed, *size);
                    ChannelSlotResources {
                        source: SlotTexture::Owned {
                            texture,
                            view,
                            video_size: None,
                        },
                        sampler: make_sampler(device, slot.filter, slot.wrap),
                        resolution,
                    }
                }
                ChannelSource::Video { path, width, height } => {
                    tracing::info!(
                        stage = stage_name,
                        channel = index,
                        path = %path.display(),
                        width,
                        height,
                        "allocated video feed channel; frames arrive via push"
                    );
                    let (texture, view, resolution) =
                        create_video_texture(device, queue, index, *width, *height, color_space);
                    ChannelSlotResources {
                        source: SlotTexture::Owned {
                            texture,
                            view,
                            video_size: Some((*width, *height)),
                        },
                        sampler: make_sampler(device, slot.filter, slot.wrap),
                        resolution,
                    }
                }
                ChannelSource::Buffer { .. } => {
                    // The planner never resolves a buffer source to Asset.
                    anyhow::bail!(
                        "stage '{stage_name}' channel {index}: buffer source resolved as asset"
                    )
                }
            },
            (Some(slot), Some(ChannelRef::SameFrame(stage))) => ChannelSlotResources {
                source: SlotTexture::Stage {
                    index: *stage,
                    history: false,
                },
                sampler: make_sampler(device, slot.filter, slot.wrap),
                resolution: [0.0; 4],
            },
            (Some(slot), Some(ChannelRef::History(stage))) => ChannelSlotResources {
                source: SlotTexture::Stage {
                    index: *stage,
                    history: true,
                },
                sampler: make_sampler(device, slot.filter, slot.wrap),
                resolution: [0.0; 4],
            },
            _ => {
                let (texture, view, resolution) =
                    create_placeholder_texture(device, queue, index, color_space);
                ChannelSlotResources {
                    source: SlotTexture::Owned {
                        texture,
                        view,
                        video_size: None,
                    },
                    sampler: make_sampler(device, FilterMode::Linear, WrapMode::Clamp),
                    resolution,
                }
            }
        };
        resources.push(resource);
    }

    Ok(resources)
}

fn make_sampler(device: &wgpu::Device, filter: FilterMode, wrap: WrapMode) -> wgpu::Sampler {
    let address_mode = match wrap {
        WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    };
    let filter_mode = match filter {
        FilterMode::Linear => wgpu::FilterMode::Linear,
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter_mode,
        min_filter: filter_mode,
        mipmap_filter: filter_mode,
        ..Default::default()
    })
}

fn asset_format(color_space: SurfaceColorSpace) -> wgpu::TextureFormat {
    match color_space {
        SurfaceColorSpace::Gamma => wgpu::TextureFormat::Rgba8Unorm,
        SurfaceColorSpace::Linear => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> (wgpu::Texture, wgpu::TextureView, [f32; 4]) {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view, [width as f32, height as f32, 1.0, 0.0])
}

fn load_image_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    path: &std::path::Path,
    color_space: SurfaceColorSpace,
) -> Result<(wgpu::Texture, wgpu::TextureView, [f32; 4])> {
    let image = image::open(path)
        .with_context(|| format!("failed to open texture at {}", path.display()))?;
    let (width, height) = image.dimensions();
    let mut rgba = image.to_rgba8();
    flip_vertical_in_place(&mut rgba);

    Ok(upload_rgba(
        device,
        queue,
        &format!("channel texture #{index}"),
        width,
        height,
        asset_format(color_space),
        &rgba,
    ))
}

/// Deterministic RGBA noise: the same seed always yields the same texture,
/// keeping noise-driven demos reproducible across runs and machines.
fn create_noise_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    seed: u64,
    size: u32,
) -> (wgpu::Texture, wgpu::TextureView, [f32; 4]) {
    let size = size.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; (size * size * 4) as usize];
    rng.fill(data.as_mut_slice());

    // Linear format regardless of surface color space: noise is data, not
    // color, and must not be gamma-decoded on sampling.
    upload_rgba(
        device,
        queue,
        &format!("noise channel #{index}"),
        size,
        size,
        wgpu::TextureFormat::Rgba8Unorm,
        &data,
    )
}

fn create_video_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    width: u32,
    height: u32,
    color_space: SurfaceColorSpace,
) -> (wgpu::Texture, wgpu::TextureView, [f32; 4]) {
    let width = width.max(1);
    let height = height.max(1);
    let data = vec![0u8; (width * height * VIDEO_BYTES_PER_PIXEL) as usize];
    upload_rgba(
        device,
        queue,
        &format!("video channel #{index}"),
        width,
        height,
        asset_format(color_space),
        &data,
    )
}

fn create_placeholder_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    color_space: SurfaceColorSpace,
) -> (wgpu::Texture, wgpu::TextureView, [f32; 4]) {
    // Unbound channels sample opaque black, matching ShaderToy.
    let data = [0u8, 0, 0, 255];
    upload_rgba(
        device,
        queue,
        &format!("placeholder channel #{index}"),
        1,
        1,
        asset_format(color_space),
        &data,
    )
}
