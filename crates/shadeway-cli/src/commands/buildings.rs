//! Buildings command handler: export the footprints in a bounding box as
//! GeoJSON.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use shadeway_lib::{to_geojson, BoundingBox};
use tracing::info;

use super::RouterOptions;
use crate::output::render_json;

#[derive(Debug, Clone)]
pub struct BuildingsCommandArgs {
    pub bbox: BoundingBox,
    /// Write to this file instead of stdout.
    pub output: Option<PathBuf>,
}

pub fn handle_buildings_command(
    options: &RouterOptions,
    args: &BuildingsCommandArgs,
) -> Result<()> {
    let router = options.build_router()?;
    let buildings = router
        .buildings_in(&args.bbox)
        .context("failed to look up buildings")?;
    let collection = to_geojson(&buildings);

    match &args.output {
        Some(path) => {
            let text = serde_json::to_string_pretty(&collection)?;
            fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), count = buildings.len(), "buildings written");
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            render_json(&mut out, &collection)?;
            out.flush()?;
        }
    }
    Ok(())
}
