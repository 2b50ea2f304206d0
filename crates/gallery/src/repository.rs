//! Resolves demo handles into ready-to-render packs and produces the ordered
//! gallery listing. CLI code hands it `DemoHandle`s while it walks the
//! configured demo roots, loads manifests through `DemoPack`, and returns the
//! matching pack or a sorted catalogue of everything it found.
//!
//! Types:
//!
//! - `DemoEntry` is one row of the gallery listing: key, display name, sort
//!   hint, and the pack directory.
//! - `DemoRepository` stores the search roots and performs resolution for
//!   every handle the CLI encounters.
//!
//! Functions:
//!
//! - `DemoRepository::resolve` loads a pack by key or explicit path.
//! - `DemoRepository::catalogue` scans all roots and returns entries ordered
//!   by sort hint, then key, the order the gallery displays them in.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::pack::{ensure_sources, DemoPack, MANIFEST_JSON, MANIFEST_TOML};
use crate::DemoHandle;

#[derive(Debug, Clone)]
pub struct DemoEntry {
    pub key: String,
    pub name: String,
    pub sort: i32,
    pub root: PathBuf,
}

#[derive(Debug)]
pub struct DemoRepository {
    roots: Vec<PathBuf>,
}

impl DemoRepository {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn with_defaults() -> Self {
        Self::new(vec![PathBuf::from("demos")])
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn resolve(&self, handle: &DemoHandle) -> Result<DemoPack> {
        match handle {
            DemoHandle::LocalPack(path) => self.load_pack_path(path),
            DemoHandle::Key(key) => self.resolve_key(key),
        }
    }

    fn load_pack_path(&self, path: &Path) -> Result<DemoPack> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("demo pack path must not be empty"));
        }

        debug!(requested = %path.display(), roots = ?self.roots, "resolving demo pack by path");
        let candidates = if path.is_absolute() || path.exists() {
            vec![path.to_path_buf()]
        } else {
            self.roots.iter().map(|root| root.join(path)).collect()
        };

        for candidate in candidates {
            if candidate.exists() {
                let pack = DemoPack::load(&candidate).map_err(|err| anyhow!(err))?;
                ensure_sources(&pack).map_err(|err| anyhow!(err))?;
                debug!(path = %candidate.display(), key = %pack.manifest().key, "loaded demo pack");
                return Ok(pack);
            }
        }

        Err(anyhow!(
            "unable to locate demo pack '{}'. searched roots: {:?}",
            path.display(),
            self.roots
        ))
    }

    fn resolve_key(&self, key: &str) -> Result<DemoPack> {
        for entry in self.catalogue() {
            if entry.key == key {
                let pack = DemoPack::load(&entry.root).map_err(|err| anyhow!(err))?;
                ensure_sources(&pack).map_err(|err| anyhow!(err))?;
                return Ok(pack);
            }
        }
        Err(anyhow!(
            "no demo with key '{}' found under roots {:?}",
            key,
            self.roots
        ))
    }

    /// Scans every root and returns the gallery listing, sorted by the demos'
    /// sort hints and then by key. Unreadable packs are skipped with a warning
    /// so one broken demo never hides the rest of the gallery.
    pub fn catalogue(&self) -> Vec<DemoEntry> {
        let mut entries = Vec::new();
        for root in &self.roots {
            let Ok(read_dir) = fs::read_dir(root) else {
                debug!(root = %root.display(), "demo root missing or unreadable");
                continue;
            };
            for dir_entry in read_dir.flatten() {
                let path = dir_entry.path();
                if !path.is_dir() {
                    continue;
                }
                if !path.join(MANIFEST_TOML).exists() && !path.join(MANIFEST_JSON).exists() {
                    continue;
                }
                match DemoPack::load(&path) {
                    Ok(pack) => {
                        let manifest = pack.manifest();
                        if entries
                            .iter()
                            .any(|existing: &DemoEntry| existing.key == manifest.key)
                        {
                            warn!(
                                key = %manifest.key,
                                path = %path.display(),
                                "duplicate demo key; keeping the first occurrence"
                            );
                            continue;
                        }
                        entries.push(DemoEntry {
                            key: manifest.key.clone(),
                            name: manifest.display_name().to_string(),
                            sort: manifest.sort,
                            root: path,
                        });
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable demo pack");
                    }
                }
            }
        }
        entries.sort_by(|a, b| a.sort.cmp(&b.sort).then_with(|| a.key.cmp(&b.key)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_demo(root: &Path, dir: &str, key: &str, sort: i32) {
        let demo_dir = root.join(dir);
        fs::create_dir_all(&demo_dir).unwrap();
        fs::write(
            demo_dir.join(MANIFEST_TOML),
            format!(
                r#"
                    key = "{key}"
                    sort = {sort}

                    [[passes]]
                    name = "image"
                    source = "image.glsl"
                "#
            ),
        )
        .unwrap();
        fs::write(demo_dir.join("image.glsl"), "// shader").unwrap();
    }

    #[test]
    fn catalogue_orders_by_sort_then_key() {
        let temp = tempfile::tempdir().unwrap();
        write_demo(temp.path(), "zeta", "zeta", 1);
        write_demo(temp.path(), "alpha", "alpha", 1);
        write_demo(temp.path(), "omega", "omega", 0);

        let repo = DemoRepository::new(vec![temp.path().to_path_buf()]);
        let keys: Vec<String> = repo
            .catalogue()
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        assert_eq!(keys, vec!["omega", "alpha", "zeta"]);
    }

    #[test]
    fn resolves_by_key() {
        let temp = tempfile::tempdir().unwrap();
        write_demo(temp.path(), "plasma-dir", "plasma", 3);

        let repo = DemoRepository::new(vec![temp.path().to_path_buf()]);
        let pack = repo
            .resolve(&DemoHandle::Key("plasma".into()))
            .expect("resolve by key");
        assert_eq!(pack.manifest().key, "plasma");
    }

    #[test]
    fn resolves_relative_path_against_roots() {
        let temp = tempfile::tempdir().unwrap();
        write_demo(temp.path(), "plasma", "plasma", 0);

        let repo = DemoRepository::new(vec![temp.path().to_path_buf()]);
        let pack = repo
            .resolve(&DemoHandle::LocalPack(PathBuf::from("plasma")))
            .expect("resolve by relative path");
        assert_eq!(pack.manifest().key, "plasma");
    }

    #[test]
    fn default_repository_searches_the_demos_directory() {
        let repo = DemoRepository::with_defaults();
        assert_eq!(repo.roots(), &[PathBuf::from("demos")]);
    }

    #[test]
    fn missing_key_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let repo = DemoRepository::new(vec![temp.path().to_path_buf()]);
        assert!(repo.resolve(&DemoHandle::Key("ghost".into())).is_err());
    }

    #[test]
    fn skips_broken_pack_but_lists_the_rest() {
        let temp = tempfile::tempdir().unwrap();
        write_demo(temp.path(), "good", "good", 0);
        let broken = temp.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(MANIFEST_TOML), "key = ").unwrap();

        let repo = DemoRepository::new(vec![temp.path().to_path_buf()]);
        let entries = repo.catalogue();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "good");
    }
}
