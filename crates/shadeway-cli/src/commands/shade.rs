//! Shade command handler.

use std::io::{self, Write};

use anyhow::{Context, Result};
use shadeway_lib::{LonLat, TimeOfDay};

use super::RouterOptions;
use crate::output::{render_hourly_text, render_json, render_shade_text, OutputFormat};
use crate::terminal::ColorPalette;

/// Arguments for the shade command.
#[derive(Debug, Clone)]
pub struct ShadeCommandArgs {
    pub at: LonLat,
    /// `HH:MM`; noon when absent.
    pub time: Option<String>,
    /// Report every hour instead of one time.
    pub hourly: bool,
}

impl ShadeCommandArgs {
    pub fn time_of_day(&self) -> Result<TimeOfDay> {
        match &self.time {
            Some(value) => Ok(TimeOfDay::parse(value)?),
            None => Ok(TimeOfDay::new(12, 0)?),
        }
    }
}

/// Handle the shade subcommand, writing to stdout.
pub fn handle_shade_command(
    options: &RouterOptions,
    format: OutputFormat,
    args: &ShadeCommandArgs,
) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_shade(options, format, args, &ColorPalette::detect(), &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn run_shade(
    options: &RouterOptions,
    format: OutputFormat,
    args: &ShadeCommandArgs,
    palette: &ColorPalette,
    out: &mut impl Write,
) -> Result<()> {
    let router = options.build_router()?;

    if args.hourly {
        let samples = router
            .hourly_shade(args.at)
            .context("failed to estimate hourly shade")?;
        match format {
            OutputFormat::Json => render_json(out, &samples)?,
            OutputFormat::Text => render_hourly_text(out, &samples, palette)?,
        }
    } else {
        let time = args.time_of_day().context("invalid --time")?;
        let shade = router
            .shade_at(args.at, time)
            .context("failed to estimate shade")?;
        match format {
            OutputFormat::Json => render_json(out, &shade)?,
            OutputFormat::Text => render_shade_text(out, &shade, palette)?,
        }
    }
    Ok(())
}
