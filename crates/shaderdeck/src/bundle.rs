//! Lowers a resolved gallery demo into the renderer's stage descriptions.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use gallery::{ChannelDecl, InputDecl, PassKind, ResolvedDemo};
use renderer::{
    ChannelBindings, ChannelSlot, ChannelSource, ColorSpaceMode, DemoBundle, FilterMode,
    StageDesc, SurfaceAlpha, WrapMode,
};

/// Builds a renderer bundle from a resolved demo. `asset_root` anchors
/// relative texture/video paths; in-process demos pass `None` and must use
/// absolute paths or asset-free channels.
pub fn bundle_from_resolved(
    resolved: &ResolvedDemo,
    asset_root: Option<&Path>,
) -> Result<DemoBundle> {
    let manifest = &resolved.manifest;

    let mut buffers = Vec::new();
    let mut image = None;
    for pass in &manifest.passes {
        let source = resolved
            .sources
            .iter()
            .find(|(name, _)| name == &pass.name)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| anyhow!("pass '{}' has no source text", pass.name))?;

        let stage = StageDesc {
            name: pass.name.clone(),
            source,
            channels: channel_bindings(&pass.channels, asset_root)?,
        };
        match pass.kind {
            PassKind::Buffer => buffers.push(stage),
            PassKind::Image => image = Some(stage),
        }
    }

    let image = image.ok_or_else(|| anyhow!("demo '{}' has no image pass", manifest.key))?;

    Ok(DemoBundle {
        key: manifest.key.clone(),
        name: manifest.display_name().to_string(),
        common: resolved.common.clone(),
        buffers,
        image,
    })
}

fn channel_bindings(decls: &[ChannelDecl], asset_root: Option<&Path>) -> Result<ChannelBindings> {
    let mut bindings = ChannelBindings::new();
    for decl in decls {
        let source = match &decl.source {
            InputDecl::Texture { path } => ChannelSource::Texture {
                path: anchor_path(path, asset_root),
            },
            InputDecl::Video {
                path,
                width,
                height,
            } => ChannelSource::Video {
                path: anchor_path(path, asset_root),
                width: *width,
                height: *height,
            },
            InputDecl::Noise { seed, size } => ChannelSource::Noise {
                seed: *seed,
                size: *size,
            },
            InputDecl::Buffer { name, history } => ChannelSource::Buffer {
                stage: name.clone(),
                history: *history,
            },
        };
        let slot = ChannelSlot {
            source,
            filter: map_filter(decl.filter),
            wrap: map_wrap(decl.wrap),
        };
        bindings.set(usize::from(decl.channel), slot)?;
    }
    Ok(bindings)
}

fn anchor_path(path: &Path, asset_root: Option<&Path>) -> PathBuf {
    match asset_root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

fn map_filter(filter: gallery::FilterMode) -> FilterMode {
    match filter {
        gallery::FilterMode::Linear => FilterMode::Linear,
        gallery::FilterMode::Nearest => FilterMode::Nearest,
    }
}

fn map_wrap(wrap: gallery::WrapMode) -> WrapMode {
    match wrap {
        gallery::WrapMode::Clamp => WrapMode::Clamp,
        gallery::WrapMode::Repeat => WrapMode::Repeat,
    }
}

pub fn map_manifest_alpha(alpha: gallery::SurfaceAlpha) -> SurfaceAlpha {
    match alpha {
        gallery::SurfaceAlpha::Opaque => SurfaceAlpha::Opaque,
        gallery::SurfaceAlpha::Transparent => SurfaceAlpha::Transparent,
    }
}

pub fn map_manifest_color(color: gallery::ColorSpace) -> ColorSpaceMode {
    match color {
        gallery::ColorSpace::Auto => ColorSpaceMode::Auto,
        gallery::ColorSpace::Gamma => ColorSpaceMode::Gamma,
        gallery::ColorSpace::Linear => ColorSpaceMode::Linear,
    }
}

/// CLI `auto` defers to the manifest; anything explicit wins.
pub fn resolve_color_space(cli: ColorSpaceMode, manifest: ColorSpaceMode) -> ColorSpaceMode {
    match cli {
        ColorSpaceMode::Auto => manifest,
        explicit => explicit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery::{DemoPassSource, ShaderDemo};

    struct Feedback;

    impl ShaderDemo for Feedback {
        fn key(&self) -> &str {
            "feedback"
        }

        fn passes(&self) -> Vec<DemoPassSource> {
            vec![
                DemoPassSource {
                    name: "trail".into(),
                    kind: PassKind::Buffer,
                    source: "void mainImage(out vec4 c, vec2 f) { c = texture(iChannel0, f / iResolution.xy) * 0.97; }".into(),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Buffer {
                            name: "trail".into(),
                            history: true,
                        },
                        filter: gallery::FilterMode::Linear,
                        wrap: gallery::WrapMode::Clamp,
                    }],
                },
                DemoPassSource {
                    name: "image".into(),
                    kind: PassKind::Image,
                    source: "void mainImage(out vec4 c, vec2 f) { c = texture(iChannel0, f / iResolution.xy); }".into(),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Buffer {
                            name: "trail".into(),
                            history: false,
                        },
                        filter: gallery::FilterMode::Linear,
                        wrap: gallery::WrapMode::Clamp,
                    }],
                },
            ]
        }
    }

    #[test]
    fn lowers_resolved_demo_into_bundle() {
        let resolved = gallery::resolve_demo(&Feedback).expect("resolve");
        let bundle = bundle_from_resolved(&resolved, None).expect("bundle");
        assert_eq!(bundle.key, "feedback");
        assert_eq!(bundle.buffers.len(), 1);
        assert_eq!(bundle.image.name, "image");
        assert!(matches!(
            bundle.buffers[0].channels.slots()[0],
            Some(ChannelSlot {
                source: ChannelSource::Buffer { ref stage, history: true },
                ..
            }) if stage == "trail"
        ));
    }

    #[test]
    fn relative_asset_paths_anchor_to_pack_root() {
        let anchored = anchor_path(Path::new("textures/rock.png"), Some(Path::new("/demos/a")));
        assert_eq!(anchored, PathBuf::from("/demos/a/textures/rock.png"));
        let absolute = anchor_path(Path::new("/tmp/rock.png"), Some(Path::new("/demos/a")));
        assert_eq!(absolute, PathBuf::from("/tmp/rock.png"));
    }

    #[test]
    fn explicit_color_space_overrides_manifest() {
        assert_eq!(
            resolve_color_space(ColorSpaceMode::Auto, ColorSpaceMode::Gamma),
            ColorSpaceMode::Gamma
        );
        assert_eq!(
            resolve_color_space(ColorSpaceMode::Linear, ColorSpaceMode::Gamma),
            ColorSpaceMode::Linear
        );
    }
}
