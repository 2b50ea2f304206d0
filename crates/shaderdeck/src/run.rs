use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use gallery::{DemoHandle, DemoRepository};
use renderer::{Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::bundle::{
    bundle_from_resolved, map_manifest_alpha, map_manifest_color, resolve_color_space,
};
use crate::cli::Cli;

const ROOTS_ENV: &str = "SHADERDECK_ROOTS";

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let repo = demo_repository(&args);
    tracing::debug!(roots = ?repo.roots(), "resolved demo roots");

    if args.list {
        return list_demos(&repo);
    }

    let input = args
        .demo
        .as_deref()
        .ok_or_else(|| anyhow!("no demo given; pass a key or pack path, or use --list"))?;
    let handle = DemoHandle::from_input(input);
    tracing::info!(?handle, "loading demo");

    let pack = repo.resolve(&handle)?;
    let resolved = pack
        .resolve_sources()
        .with_context(|| format!("failed to load demo '{}'", pack.manifest().key))?;
    let bundle = bundle_from_resolved(&resolved, Some(pack.root()))?;

    let manifest = pack.manifest();
    let config = RendererConfig {
        surface_size: args.size.unwrap_or((1280, 720)),
        target_fps: match args.fps {
            Some(fps) if fps > 0.0 => Some(fps),
            _ => None,
        },
        antialiasing: args.antialias,
        surface_alpha: map_manifest_alpha(manifest.surface_alpha),
        color_space: resolve_color_space(args.color_space, map_manifest_color(manifest.color_space)),
        fixed_time: args.at_time,
    };

    tracing::info!(
        demo = %bundle.key,
        name = %bundle.name,
        buffers = bundle.buffers.len(),
        "starting preview"
    );
    Renderer::new(config).run(&bundle)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Search roots: `--root` flags first, then the `SHADERDECK_ROOTS` env var
/// (colon separated). With neither, the repository falls back to its
/// conventional `./demos` default.
fn demo_repository(args: &Cli) -> DemoRepository {
    let mut roots = args.roots.clone();
    if let Ok(env_roots) = std::env::var(ROOTS_ENV) {
        roots.extend(
            env_roots
                .split(':')
                .filter(|entry| !entry.is_empty())
                .map(PathBuf::from),
        );
    }
    if roots.is_empty() {
        DemoRepository::with_defaults()
    } else {
        DemoRepository::new(roots)
    }
}

fn list_demos(repo: &DemoRepository) -> Result<()> {
    let entries = repo.catalogue();
    if entries.is_empty() {
        println!("no demos found under roots {:?}", repo.roots());
        return Ok(());
    }
    for entry in entries {
        println!("{:<24} {:<32} {}", entry.key, entry.name, entry.root.display());
    }
    Ok(())
}
