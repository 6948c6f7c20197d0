//! Route command handler.

use std::io::{self, Write};

use anyhow::{Context, Result};
use shadeway_lib::{Error as LibError, LonLat, RouteRequest, TimeOfDay, TransportMode};
use tracing::debug;

use super::RouterOptions;
use crate::output::{render_comparison_text, render_json, render_plan_text, OutputFormat};
use crate::terminal::ColorPalette;

/// Which plan(s) the route command produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteKind {
    #[default]
    ShadeAware,
    Direct,
    Compare,
}

/// Arguments for the route command.
#[derive(Debug, Clone)]
pub struct RouteCommandArgs {
    pub from: LonLat,
    pub to: LonLat,
    /// `HH:MM`.
    pub time: String,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    pub mode: TransportMode,
    pub kind: RouteKind,
}

impl RouteCommandArgs {
    /// Convert CLI args to a validated library request.
    pub fn to_request(&self) -> Result<RouteRequest> {
        let time = TimeOfDay::parse(&self.time)?;
        let mut request = RouteRequest::new(self.from, self.to, time).with_mode(self.mode);
        if let Some(date) = &self.date {
            request = request.with_date(date.as_str());
        }
        request.validate()?;
        Ok(request)
    }
}

/// Handle the route subcommand, writing to stdout.
pub fn handle_route_command(
    options: &RouterOptions,
    format: OutputFormat,
    args: &RouteCommandArgs,
) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_route(options, format, args, &ColorPalette::detect(), &mut out)?;
    out.flush()?;
    Ok(())
}

/// Plan and render; separated from stdout so it can be exercised directly.
pub fn run_route(
    options: &RouterOptions,
    format: OutputFormat,
    args: &RouteCommandArgs,
    palette: &ColorPalette,
    out: &mut impl Write,
) -> Result<()> {
    let request = args.to_request().context("invalid route request")?;
    let router = options.build_router()?;
    debug!(kind = ?args.kind, mode = %request.transport_mode, "planning route");

    match args.kind {
        RouteKind::ShadeAware => {
            let plan = router.plan_route(&request).map_err(planning_error)?;
            match format {
                OutputFormat::Json => render_json(out, &plan)?,
                OutputFormat::Text => render_plan_text(out, &plan, palette)?,
            }
        }
        RouteKind::Direct => {
            let plan = router.direct_route(&request).map_err(planning_error)?;
            match format {
                OutputFormat::Json => render_json(out, &plan)?,
                OutputFormat::Text => render_plan_text(out, &plan, palette)?,
            }
        }
        RouteKind::Compare => {
            let comparison = router.compare_routes(&request).map_err(planning_error)?;
            match format {
                OutputFormat::Json => render_json(out, &comparison)?,
                OutputFormat::Text => render_comparison_text(out, &comparison, palette)?,
            }
        }
    }
    Ok(())
}

fn planning_error(error: LibError) -> anyhow::Error {
    let hint = match &error {
        LibError::NoPath { .. } => {
            "no walkable path between the endpoints; use --direct for a straight-line route"
        }
        LibError::InvalidEndpoint { .. } => "an endpoint lies inside a building",
        _ => "route planning failed",
    };
    anyhow::Error::new(error).context(hint)
}
