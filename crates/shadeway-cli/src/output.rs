//! Output formatting for plans and shade reports.
//!
//! Every renderer writes to a caller-supplied writer so the binary can target
//! stdout while tests capture into a buffer.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;
use shadeway_lib::{PointShade, RouteComparison, RoutePlan, RouteStrategy};

use crate::terminal::{format_with_separators, shade_bar, ColorPalette};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable listing.
    #[default]
    Text,
    /// Pretty-printed JSON of the underlying value.
    Json,
}

/// Pretty JSON followed by a newline.
pub fn render_json<T: Serialize>(out: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::other)?;
    out.write_all(b"\n")
}

/// Whole percent, e.g. `42%`.
pub fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

fn strategy_label(strategy: RouteStrategy) -> &'static str {
    match strategy {
        RouteStrategy::ShadeAware => "Shade-aware route",
        RouteStrategy::Direct => "Direct route",
    }
}

/// Numbered point list followed by the plan summary.
pub fn render_plan_text(
    out: &mut impl Write,
    plan: &RoutePlan,
    palette: &ColorPalette,
) -> io::Result<()> {
    let p = palette;
    writeln!(
        out,
        "{}{} ({}){}: {} points",
        p.white_bold,
        strategy_label(plan.strategy),
        plan.transport_mode,
        p.reset,
        plan.point_count()
    )?;
    for (i, point) in plan.route_points.iter().enumerate() {
        let color = p.for_shade(point.shade_ratio);
        writeln!(
            out,
            "{}{:>3}{}  {:.6}, {:.6}  {}{} {:>4}{}",
            p.gray,
            i + 1,
            p.reset,
            point.longitude,
            point.latitude,
            color,
            shade_bar(point.shade_ratio),
            percent(point.shade_ratio),
            p.reset
        )?;
    }
    render_summary(out, plan, palette)
}

fn render_summary(out: &mut impl Write, plan: &RoutePlan, p: &ColorPalette) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Total distance: {} m",
        format_with_separators(plan.total_distance_m.round() as u64)
    )?;
    writeln!(out, "Estimated time: {} min", plan.estimated_minutes)?;
    writeln!(
        out,
        "Average shade: {}{}{}",
        p.for_shade(plan.average_shade_ratio),
        percent(plan.average_shade_ratio),
        p.reset
    )?;
    if plan.grid_width > 0 {
        writeln!(out, "Grid: {} x {} cells", plan.grid_width, plan.grid_height)?;
    }
    let cache = if plan.cache_used { " (cached)" } else { "" };
    writeln!(
        out,
        "{}Computed in {} ms{}{}",
        p.gray, plan.calculation_time_ms, cache, p.reset
    )
}

/// Both plans side by side with the differences.
pub fn render_comparison_text(
    out: &mut impl Write,
    comparison: &RouteComparison,
    palette: &ColorPalette,
) -> io::Result<()> {
    render_plan_text(out, &comparison.shade_aware, palette)?;
    writeln!(out)?;
    render_plan_text(out, &comparison.direct, palette)?;
    writeln!(out)?;
    writeln!(out, "{}Comparison{}", palette.white_bold, palette.reset)?;
    writeln!(
        out,
        "Extra distance: {:+.0} m",
        -comparison.distance_improvement_m
    )?;
    writeln!(
        out,
        "Extra shade: {:+.0} points",
        comparison.shade_improvement * 100.0
    )?;
    writeln!(
        out,
        "Extra time: {:+} min",
        comparison.time_difference_minutes
    )
}

/// Shade breakdown for one point and time.
pub fn render_shade_text(
    out: &mut impl Write,
    shade: &PointShade,
    palette: &ColorPalette,
) -> io::Result<()> {
    let p = palette;
    writeln!(
        out,
        "{}Shade at {:.6}, {:.6} ({}){}",
        p.white_bold, shade.longitude, shade.latitude, shade.time, p.reset
    )?;
    writeln!(
        out,
        "Sun: elevation {:.0} deg, azimuth {:.0} deg",
        shade.sun_elevation_deg, shade.sun_azimuth_deg
    )?;
    if shade.occupied {
        writeln!(out, "{}Point is inside a building{}", p.blocked, p.reset)?;
    }
    writeln!(out, "Building shade: {}", percent(shade.building_shade))?;
    writeln!(out, "Ambient shade: {}", percent(shade.ambient_shade))?;
    writeln!(
        out,
        "Shade ratio: {}{} {}{}",
        p.for_shade(shade.shade_ratio),
        shade_bar(shade.shade_ratio),
        percent(shade.shade_ratio),
        p.reset
    )
}

/// One line per hourly sample.
pub fn render_hourly_text(
    out: &mut impl Write,
    samples: &[PointShade],
    palette: &ColorPalette,
) -> io::Result<()> {
    let p = palette;
    if let Some(first) = samples.first() {
        writeln!(
            out,
            "{}Hourly shade at {:.6}, {:.6}{}",
            p.white_bold, first.longitude, first.latitude, p.reset
        )?;
    }
    for sample in samples {
        let marker = if sample.occupied { " (inside building)" } else { "" };
        writeln!(
            out,
            "{}  {}{} {:>4}{}{}",
            sample.time,
            p.for_shade(sample.shade_ratio),
            shade_bar(sample.shade_ratio),
            percent(sample.shade_ratio),
            p.reset,
            marker
        )?;
    }
    Ok(())
}
