//! Wraps a demo pack directory so `repository` and the CLI can load manifests,
//! read GLSL sources, and resolve asset paths consistently. Filesystem
//! validation stays centralized here while higher layers decide what to do
//! with a loaded demo.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures so
//!   the CLI can report load-time fatals per demo.
//! - `DemoPack` stores the resolved root directory and parsed `DemoManifest`.
//! - `ResolvedDemo` carries the manifest plus every pass body (and the shared
//!   prelude) read into memory, ready for renderer handoff.
//!
//! Functions:
//!
//! - `DemoPack::load` reads `demo.toml` (or `demo.json`), validates it, and
//!   returns a filesystem-backed handle.
//! - `ensure_sources` confirms every declared pass has a file on disk so later
//!   compile errors point at shader code, not missing assets.
//! - `DemoPack::resolve_sources` produces the `ResolvedDemo` handed to the
//!   renderer glue.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::{DemoManifest, InputDecl};

pub const MANIFEST_TOML: &str = "demo.toml";
pub const MANIFEST_JSON: &str = "demo.json";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found in {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("failed to parse JSON manifest: {0}")]
    ManifestParseJson(#[from] serde_json::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DemoPack {
    root: PathBuf,
    manifest: DemoManifest,
}

/// A demo with all shader text read off disk; asset paths stay paths because
/// texture decoding belongs to the renderer.
#[derive(Debug, Clone)]
pub struct ResolvedDemo {
    pub manifest: DemoManifest,
    /// Shared prelude text, if the manifest declares one.
    pub common: Option<String>,
    /// Pass bodies in manifest order, paired with the pass name.
    pub sources: Vec<(String, String)>,
}

impl DemoPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let toml_path = root.join(MANIFEST_TOML);
        let json_path = root.join(MANIFEST_JSON);

        let manifest: DemoManifest = if toml_path.exists() {
            toml::from_str(&fs::read_to_string(&toml_path)?)?
        } else if json_path.exists() {
            serde_json::from_str(&fs::read_to_string(&json_path)?)?
        } else {
            return Err(PackError::ManifestMissing(root));
        };

        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &DemoManifest {
        &self.manifest
    }

    pub fn pass_source_path(&self, pass_name: &str) -> Option<PathBuf> {
        self.manifest
            .passes
            .iter()
            .find(|pass| pass.name == pass_name)
            .map(|pass| self.root.join(&pass.source))
    }

    /// Resolves a channel declaration to an absolute asset path, when the
    /// source is a filesystem asset at all.
    pub fn asset_path(&self, source: &InputDecl) -> Option<PathBuf> {
        match source {
            InputDecl::Texture { path } | InputDecl::Video { path, .. } => {
                Some(self.root.join(path))
            }
            InputDecl::Noise { .. } | InputDecl::Buffer { .. } => None,
        }
    }

    /// Reads every pass body (and the common prelude) into memory.
    pub fn resolve_sources(&self) -> Result<ResolvedDemo, PackError> {
        ensure_sources(self)?;

        let common = match &self.manifest.common {
            Some(path) => Some(fs::read_to_string(self.root.join(path))?),
            None => None,
        };

        let mut sources = Vec::with_capacity(self.manifest.passes.len());
        for pass in &self.manifest.passes {
            let text = fs::read_to_string(self.root.join(&pass.source))?;
            sources.push((pass.name.clone(), text));
        }

        Ok(ResolvedDemo {
            manifest: self.manifest.clone(),
            common,
            sources,
        })
    }
}

/// Confirms every declared GLSL source (passes plus common prelude) exists.
pub fn ensure_sources(pack: &DemoPack) -> Result<Vec<PathBuf>, PackError> {
    let mut missing = Vec::new();
    let mut resolved = Vec::new();

    let mut candidates: Vec<PathBuf> = pack
        .manifest()
        .passes
        .iter()
        .map(|pass| pack.root().join(&pass.source))
        .collect();
    if let Some(common) = &pack.manifest().common {
        candidates.push(pack.root().join(common));
    }

    for path in candidates {
        if path.exists() {
            resolved.push(path);
        } else {
            missing.push(path);
        }
    }

    if !missing.is_empty() {
        return Err(PackError::ManifestValidation(
            missing
                .into_iter()
                .map(|p| format!("missing shader source: {}", p.display()))
                .collect(),
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ChannelDecl, DemoPass, FilterMode, PassKind, WrapMode};

    fn write_pack(dir: &Path, manifest: &DemoManifest, extra_files: &[(&str, &str)]) {
        let manifest_str = toml::to_string(manifest).expect("serialize manifest");
        fs::write(dir.join(MANIFEST_TOML), manifest_str).expect("write manifest");
        for (path, contents) in extra_files {
            let full_path = dir.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).expect("create dirs");
            }
            fs::write(full_path, contents).expect("write file");
        }
    }

    fn demo_manifest() -> DemoManifest {
        DemoManifest {
            key: "demo".into(),
            name: Some("Demo".into()),
            sort: 5,
            glsl: Default::default(),
            surface_alpha: Default::default(),
            color_space: Default::default(),
            description: None,
            tags: vec![],
            common: Some(PathBuf::from("common.glsl")),
            passes: vec![
                DemoPass {
                    name: "trail".into(),
                    kind: PassKind::Buffer,
                    source: PathBuf::from("trail.glsl"),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Buffer {
                            name: "trail".into(),
                            history: true,
                        },
                        filter: FilterMode::Nearest,
                        wrap: WrapMode::Clamp,
                    }],
                },
                DemoPass {
                    name: "image".into(),
                    kind: PassKind::Image,
                    source: PathBuf::from("image.glsl"),
                    channels: vec![ChannelDecl {
                        channel: 0,
                        source: InputDecl::Texture {
                            path: PathBuf::from("textures/tex0.png"),
                        },
                        filter: FilterMode::Linear,
                        wrap: WrapMode::Repeat,
                    }],
                },
            ],
        }
    }

    #[test]
    fn loads_valid_pack_and_resolves_sources() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = demo_manifest();
        write_pack(
            temp.path(),
            &manifest,
            &[
                ("common.glsl", "// shared"),
                ("trail.glsl", "// trail"),
                ("image.glsl", "// image"),
                ("textures/tex0.png", "fake"),
            ],
        );

        let pack = DemoPack::load(temp.path()).expect("load pack");
        assert_eq!(pack.manifest().key, "demo");
        assert!(pack.pass_source_path("trail").unwrap().exists());
        assert!(pack
            .asset_path(&InputDecl::Texture {
                path: PathBuf::from("textures/tex0.png"),
            })
            .unwrap()
            .exists());

        let resolved = pack.resolve_sources().expect("resolve sources");
        assert_eq!(resolved.common.as_deref(), Some("// shared"));
        assert_eq!(resolved.sources.len(), 2);
        assert_eq!(resolved.sources[0].0, "trail");
        assert_eq!(resolved.sources[1].1, "// image");
    }

    #[test]
    fn detects_missing_shader_source() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = demo_manifest();
        write_pack(
            temp.path(),
            &manifest,
            &[("common.glsl", "// shared"), ("image.glsl", "// image")],
        );

        let pack = DemoPack::load(temp.path()).expect("load pack");
        let err = ensure_sources(&pack).unwrap_err();
        assert!(matches!(err, PackError::ManifestValidation(_)));
    }

    #[test]
    fn rejects_invalid_manifest_at_load() {
        let temp = tempfile::tempdir().unwrap();
        let mut manifest = demo_manifest();
        manifest.passes.retain(|pass| pass.kind == PassKind::Buffer);
        write_pack(temp.path(), &manifest, &[("trail.glsl", "// trail")]);

        let err = DemoPack::load(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::ManifestValidation(_)));
    }

    #[test]
    fn loads_json_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let manifest = demo_manifest();
        let json = serde_json::to_string_pretty(&manifest).expect("serialize json");
        fs::write(temp.path().join(MANIFEST_JSON), json).expect("write json manifest");
        fs::write(temp.path().join("trail.glsl"), "// trail").unwrap();
        fs::write(temp.path().join("image.glsl"), "// image").unwrap();
        fs::write(temp.path().join("common.glsl"), "// shared").unwrap();

        let pack = DemoPack::load(temp.path()).expect("load json pack");
        assert_eq!(pack.manifest().display_name(), "Demo");
    }

    #[test]
    fn reports_missing_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let err = DemoPack::load(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::ManifestMissing(_)));
    }
}
