//! In-process demo definitions. Most demos ship as on-disk packs, but tests,
//! built-ins, and embedded galleries implement `ShaderDemo` instead: a leaf
//! trait with no shared base behaviour, mirroring the per-demo adapter classes
//! the gallery format grew out of. `resolve_demo` lowers a trait object into
//! the same `ResolvedDemo` a `DemoPack` produces, so the renderer glue never
//! cares where a demo came from.

use crate::manifest::{ChannelDecl, DemoManifest, DemoPass, GlslDialect, PassKind};
use crate::pack::ResolvedDemo;

/// One pass with its source text inlined.
#[derive(Debug, Clone)]
pub struct DemoPassSource {
    pub name: String,
    pub kind: PassKind,
    pub source: String,
    pub channels: Vec<ChannelDecl>,
}

/// A demo defined in code rather than on disk.
pub trait ShaderDemo {
    fn key(&self) -> &str;

    fn name(&self) -> &str {
        self.key()
    }

    fn sort(&self) -> i32 {
        0
    }

    fn glsl(&self) -> GlslDialect {
        GlslDialect::Webgl2
    }

    /// Shared GLSL prelude prepended to every pass body.
    fn common(&self) -> Option<&str> {
        None
    }

    fn passes(&self) -> Vec<DemoPassSource>;
}

/// Lowers a `ShaderDemo` into the resolved form shared with pack loading,
/// running the same manifest validation a `demo.toml` would get.
pub fn resolve_demo(demo: &dyn ShaderDemo) -> Result<ResolvedDemo, Vec<String>> {
    let passes = demo.passes();
    let manifest = DemoManifest {
        key: demo.key().to_string(),
        name: Some(demo.name().to_string()),
        sort: demo.sort(),
        glsl: demo.glsl(),
        surface_alpha: Default::default(),
        color_space: Default::default(),
        description: None,
        tags: vec![],
        common: None,
        passes: passes
            .iter()
            .map(|pass| DemoPass {
                name: pass.name.clone(),
                kind: pass.kind,
                // Synthetic path; in-process demos never touch the filesystem.
                source: format!("{}.glsl", pass.name).into(),
                channels: pass.channels.clone(),
            })
            .collect(),
    };

    let issues = manifest.validate();
    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(ResolvedDemo {
        manifest,
        common: demo.common().map(str::to_string),
        sources: passes
            .into_iter()
            .map(|pass| (pass.name, pass.source))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{FilterMode, InputDecl, WrapMode};

    struct Automaton;

    impl ShaderDemo for Automaton {
        fn key(&self) -> &str {
            "automaton"
        }

        fn name(&self) -> &str {
            "Cellular Automaton"
        }

        fn passes(&self) -> Vec<DemoPassSource> {
            vec![
                DemoPassSource {
                    name: "state".into(),
                    kind: PassKind::Buffer,
                    source: "void mainImage(out vec4 c, vec2 f) { c = texture(iChannel0, f / iResolution.xy); }".into(),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Buffer {
                            name: "state".into(),
                            history: true,
                        },
                        filter: FilterMode::Nearest,
                        wrap: WrapMode::Clamp,
                    }],
                },
                DemoPassSource {
                    name: "image".into(),
                    kind: PassKind::Image,
                    source: "void mainImage(out vec4 c, vec2 f) { c = texture(iChannel0, f / iResolution.xy); }".into(),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Buffer {
                            name: "state".into(),
                            history: false,
                        },
                        filter: FilterMode::Linear,
                        wrap: WrapMode::Clamp,
                    }],
                },
            ]
        }
    }

    #[test]
    fn resolves_in_process_demo() {
        let resolved = resolve_demo(&Automaton).expect("resolve");
        assert_eq!(resolved.manifest.key, "automaton");
        assert_eq!(resolved.manifest.display_name(), "Cellular Automaton");
        assert_eq!(resolved.sources.len(), 2);
        assert!(resolved.manifest.image_pass().is_some());
    }

    struct Broken;

    impl ShaderDemo for Broken {
        fn key(&self) -> &str {
            "broken"
        }

        fn passes(&self) -> Vec<DemoPassSource> {
            // No image pass at all.
            vec![]
        }
    }

    #[test]
    fn in_process_demo_gets_manifest_validation() {
        let issues = resolve_demo(&Broken).unwrap_err();
        assert!(issues.iter().any(|issue| issue.contains("image pass")));
    }
}
