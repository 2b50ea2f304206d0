//! Defines the manifest schema shared by on-disk demo packs and in-process
//! `ShaderDemo` implementations. `pack` parses and validates these structures,
//! `repository` searches their metadata, and the renderer glue walks passes and
//! channel declarations to build its stage graph.
//!
//! Types:
//!
//! - `DemoManifest` captures gallery metadata (key, display name, sort hint,
//!   GLSL dialect) plus the ordered pass list.
//! - `DemoPass` stores per-pass source paths, kind, and declared channels.
//! - `ChannelDecl` pairs a channel index with an `InputDecl` and sampling
//!   parameters.
//! - `InputDecl` enumerates the channel sources a demo may declare: static
//!   textures, video feeds, seeded noise, or another buffer pass.
//!
//! Functions:
//!
//! - `DemoManifest::validate` returns human-readable issues so pack loading can
//!   surface misconfigurations without panicking; anything structural beyond
//!   naming (same-frame cycles) is left to the renderer's planner.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Shadertoy-style demos expose four optional input channels (`iChannel0-3`).
pub const CHANNEL_COUNT: usize = 4;

/// Most auxiliary buffers observed per demo; the corpus never declares more.
pub const MAX_BUFFER_PASSES: usize = 4;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DemoManifest {
    /// Stable identifier used for gallery selection (`shaderdeck <key>`).
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Gallery ordering hint; lower values list first.
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub glsl: GlslDialect,
    #[serde(default)]
    pub surface_alpha: SurfaceAlpha,
    #[serde(default)]
    pub color_space: ColorSpace,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional shared GLSL prelude prepended to every pass body.
    #[serde(default)]
    pub common: Option<PathBuf>,
    #[serde(default)]
    pub passes: Vec<DemoPass>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DemoPass {
    pub name: String,
    #[serde(default)]
    pub kind: PassKind,
    pub source: PathBuf,
    #[serde(default)]
    pub channels: Vec<ChannelDecl>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Auxiliary pass rendered into an off-screen target.
    Buffer,
    /// The final pass, drawn to the visible surface. Exactly one per demo.
    #[default]
    Image,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GlslDialect {
    Webgl1,
    #[default]
    Webgl2,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceAlpha {
    #[default]
    Opaque,
    Transparent,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Auto,
    Gamma,
    Linear,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChannelDecl {
    /// Positional slot index; maps directly onto `iChannelN`.
    pub channel: u8,
    #[serde(flatten)]
    pub source: InputDecl,
    #[serde(default)]
    pub filter: FilterMode,
    #[serde(default)]
    pub wrap: WrapMode,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputDecl {
    Texture {
        path: PathBuf,
    },
    Video {
        path: PathBuf,
        #[serde(default = "default_video_width")]
        width: u32,
        #[serde(default = "default_video_height")]
        height: u32,
    },
    Noise {
        #[serde(default)]
        seed: u64,
        #[serde(default = "default_noise_size")]
        size: u32,
    },
    Buffer {
        name: String,
        /// When true the consumer reads the named buffer's previous-frame
        /// contents instead of this frame's output.
        #[serde(default)]
        history: bool,
    },
}

fn default_video_width() -> u32 {
    640
}

fn default_video_height() -> u32 {
    360
}

fn default_noise_size() -> u32 {
    256
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
}

impl DemoManifest {
    /// Returns the display name, falling back to the key.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }

    pub fn image_pass(&self) -> Option<&DemoPass> {
        self.passes
            .iter()
            .find(|pass| pass.kind == PassKind::Image)
    }

    pub fn buffer_passes(&self) -> impl Iterator<Item = &DemoPass> {
        self.passes
            .iter()
            .filter(|pass| pass.kind == PassKind::Buffer)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.key.trim().is_empty() {
            issues.push("demo key must not be empty".to_string());
        }

        let image_count = self
            .passes
            .iter()
            .filter(|pass| pass.kind == PassKind::Image)
            .count();
        if image_count != 1 {
            issues.push(format!(
                "demo must declare exactly one image pass, found {image_count}"
            ));
        }

        let buffer_count = self.buffer_passes().count();
        if buffer_count > MAX_BUFFER_PASSES {
            issues.push(format!(
                "demo declares {buffer_count} buffer passes; at most {MAX_BUFFER_PASSES} are supported"
            ));
        }

        let mut seen_names: Vec<&str> = Vec::new();
        for pass in &self.passes {
            if seen_names.contains(&pass.name.as_str()) {
                issues.push(format!("pass name '{}' declared twice", pass.name));
            }
            seen_names.push(pass.name.as_str());
        }

        for pass in &self.passes {
            let mut seen_channels: Vec<u8> = Vec::new();
            for decl in &pass.channels {
                if usize::from(decl.channel) >= CHANNEL_COUNT {
                    issues.push(format!(
                        "pass '{}' uses channel {} which exceeds the iChannel0-3 range",
                        pass.name, decl.channel
                    ));
                }
                if seen_channels.contains(&decl.channel) {
                    issues.push(format!(
                        "pass '{}' binds channel {} more than once",
                        pass.name, decl.channel
                    ));
                }
                seen_channels.push(decl.channel);

                if let InputDecl::Buffer { name, .. } = &decl.source {
                    match self.passes.iter().find(|candidate| &candidate.name == name) {
                        None => issues.push(format!(
                            "pass '{}' references buffer '{}' which is undefined",
                            pass.name, name
                        )),
                        Some(target) if target.kind == PassKind::Image => issues.push(format!(
                            "pass '{}' references '{}', but the image pass is not addressable as a channel",
                            pass.name, name
                        )),
                        Some(_) => {}
                    }
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_passes(passes: Vec<DemoPass>) -> DemoManifest {
        DemoManifest {
            key: "demo".into(),
            name: None,
            sort: 0,
            glsl: GlslDialect::default(),
            surface_alpha: SurfaceAlpha::default(),
            color_space: ColorSpace::default(),
            description: None,
            tags: vec![],
            common: None,
            passes,
        }
    }

    fn image_pass(channels: Vec<ChannelDecl>) -> DemoPass {
        DemoPass {
            name: "image".into(),
            kind: PassKind::Image,
            source: PathBuf::from("image.glsl"),
            channels,
        }
    }

    fn buffer_pass(name: &str, channels: Vec<ChannelDecl>) -> DemoPass {
        DemoPass {
            name: name.into(),
            kind: PassKind::Buffer,
            source: PathBuf::from(format!("{name}.glsl")),
            channels,
        }
    }

    fn buffer_ref(channel: u8, name: &str) -> ChannelDecl {
        ChannelDecl {
            channel,
            source: InputDecl::Buffer {
                name: name.into(),
                history: false,
            },
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
        }
    }

    #[test]
    fn accepts_minimal_image_only_demo() {
        let manifest = manifest_with_passes(vec![image_pass(vec![])]);
        assert!(manifest.validate().is_empty());
    }

    #[test]
    fn rejects_missing_image_pass() {
        let manifest = manifest_with_passes(vec![buffer_pass("a", vec![])]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("image pass")));
    }

    #[test]
    fn rejects_out_of_range_channel() {
        let manifest = manifest_with_passes(vec![
            buffer_pass("a", vec![]),
            image_pass(vec![buffer_ref(4, "a")]),
        ]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("iChannel0-3")));
    }

    #[test]
    fn rejects_duplicate_channel_binding() {
        let manifest = manifest_with_passes(vec![
            buffer_pass("a", vec![]),
            image_pass(vec![buffer_ref(0, "a"), buffer_ref(0, "a")]),
        ]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("more than once")));
    }

    #[test]
    fn rejects_undefined_buffer_reference() {
        let manifest = manifest_with_passes(vec![image_pass(vec![buffer_ref(0, "ghost")])]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("undefined")));
    }

    #[test]
    fn rejects_reference_to_image_pass() {
        let manifest = manifest_with_passes(vec![
            buffer_pass("a", vec![buffer_ref(0, "image")]),
            image_pass(vec![]),
        ]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("not addressable")));
    }

    #[test]
    fn rejects_too_many_buffer_passes() {
        let manifest = manifest_with_passes(vec![
            buffer_pass("a", vec![]),
            buffer_pass("b", vec![]),
            buffer_pass("c", vec![]),
            buffer_pass("d", vec![]),
            buffer_pass("e", vec![]),
            image_pass(vec![]),
        ]);
        let issues = manifest.validate();
        assert!(issues.iter().any(|issue| issue.contains("at most")));
    }

    #[test]
    fn channel_decl_parses_from_toml() {
        let manifest: DemoManifest = toml::from_str(
            r#"
                key = "automaton"
                name = "Cellular Automaton"
                sort = 12

                [[passes]]
                name = "state"
                kind = "buffer"
                source = "state.glsl"

                [[passes.channels]]
                channel = 0
                type = "buffer"
                name = "state"
                history = true

                [[passes]]
                name = "image"
                source = "image.glsl"

                [[passes.channels]]
                channel = 0
                type = "buffer"
                name = "state"
                filter = "nearest"
            "#,
        )
        .expect("parse manifest");

        assert_eq!(manifest.key, "automaton");
        assert_eq!(manifest.display_name(), "Cellular Automaton");
        assert!(manifest.validate().is_empty());
        let image = manifest.image_pass().expect("image pass");
        assert_eq!(image.channels[0].filter, FilterMode::Nearest);
        match &manifest.passes[0].channels[0].source {
            InputDecl::Buffer { name, history } => {
                assert_eq!(name, "state");
                assert!(history);
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }
}
