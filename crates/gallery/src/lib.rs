//! Demo metadata for shaderdeck: manifest schema, pack loading, the gallery
//! repository, and the `ShaderDemo` trait for in-process demos. The renderer
//! never links this crate; the CLI translates a `ResolvedDemo` into renderer
//! stage descriptions.

mod demo;
mod manifest;
mod pack;
mod repository;

pub use demo::{resolve_demo, DemoPassSource, ShaderDemo};
pub use manifest::{
    ChannelDecl, ColorSpace, DemoManifest, DemoPass, FilterMode, GlslDialect, InputDecl, PassKind,
    SurfaceAlpha, WrapMode, CHANNEL_COUNT, MAX_BUFFER_PASSES,
};
pub use pack::{ensure_sources, DemoPack, PackError, ResolvedDemo, MANIFEST_JSON, MANIFEST_TOML};
pub use repository::{DemoEntry, DemoRepository};

use std::path::{Path, PathBuf};

/// How the user referred to a demo on the command line: by gallery key or by
/// a pack directory path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoHandle {
    Key(String),
    LocalPack(PathBuf),
}

impl DemoHandle {
    /// Anything that looks like a path (separator, dot-prefix, or an existing
    /// directory) resolves as a pack path; everything else is a gallery key.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        let looks_like_path = trimmed.contains(std::path::MAIN_SEPARATOR)
            || trimmed.contains('/')
            || trimmed.starts_with('.')
            || Path::new(trimmed).is_dir();
        if looks_like_path {
            Self::LocalPack(PathBuf::from(trimmed))
        } else {
            Self::Key(trimmed.to_string())
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalPack(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_word_parses_as_key() {
        assert_eq!(
            DemoHandle::from_input("plasma"),
            DemoHandle::Key("plasma".into())
        );
    }

    #[test]
    fn separator_parses_as_path() {
        assert!(matches!(
            DemoHandle::from_input("demos/plasma"),
            DemoHandle::LocalPack(path) if path == PathBuf::from("demos/plasma")
        ));
    }

    #[test]
    fn dot_prefix_parses_as_path() {
        assert!(DemoHandle::from_input("./plasma").is_local());
    }
}
