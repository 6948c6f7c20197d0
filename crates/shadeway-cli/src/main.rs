use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shadeway_lib::{BoundingBox, LonLat, TransportMode};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use shadeway_cli::commands::buildings::{handle_buildings_command, BuildingsCommandArgs};
use shadeway_cli::commands::route::{handle_route_command, RouteCommandArgs, RouteKind};
use shadeway_cli::commands::shade::{handle_shade_command, ShadeCommandArgs};
use shadeway_cli::commands::{bbox_arg, lonlat_arg, RouterOptions};
use shadeway_cli::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shade-aware route planning")]
struct Cli {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// GeoJSON FeatureCollection of building footprints. Buildings are
    /// fetched from Overpass when omitted.
    #[arg(long, global = true)]
    buildings: Option<PathBuf>,

    /// JSON configuration file. Defaults plus `SHADEWAY_*` overrides when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a route that trades distance against sun exposure.
    Route(RouteArgs),
    /// Estimate shade at a point.
    Shade(ShadeArgs),
    /// Export the buildings in a bounding box as GeoJSON.
    Buildings(BuildingsArgs),
}

#[derive(Args, Debug)]
struct RouteArgs {
    /// Start point as `LON,LAT`.
    #[arg(long = "from", value_parser = lonlat_arg, allow_hyphen_values = true)]
    from: LonLat,
    /// Destination as `LON,LAT`.
    #[arg(long = "to", value_parser = lonlat_arg, allow_hyphen_values = true)]
    to: LonLat,
    /// Time of day, `HH:MM`.
    #[arg(long)]
    time: String,
    /// Date, `YYYY-MM-DD`.
    #[arg(long)]
    date: Option<String>,
    /// Transport mode: walk, run, bike or car.
    #[arg(long, default_value_t = TransportMode::Walk)]
    mode: TransportMode,
    /// Straight-line route instead of the grid search.
    #[arg(long, conflicts_with = "compare")]
    direct: bool,
    /// Plan both routes and report the differences.
    #[arg(long)]
    compare: bool,
}

#[derive(Args, Debug)]
struct ShadeArgs {
    /// Point as `LON,LAT`.
    #[arg(long, value_parser = lonlat_arg, allow_hyphen_values = true)]
    at: LonLat,
    /// Time of day, `HH:MM` (default 12:00).
    #[arg(long, conflicts_with = "hourly")]
    time: Option<String>,
    /// Report every hour of the day.
    #[arg(long)]
    hourly: bool,
}

#[derive(Args, Debug)]
struct BuildingsArgs {
    /// `SOUTH,WEST,NORTH,EAST` in degrees.
    #[arg(long, value_parser = bbox_arg, allow_hyphen_values = true)]
    bbox: BoundingBox,
    /// Write the GeoJSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let options = RouterOptions {
        buildings: cli.buildings,
        config: cli.config,
    };

    match cli.command {
        Command::Route(args) => {
            let kind = if args.direct {
                RouteKind::Direct
            } else if args.compare {
                RouteKind::Compare
            } else {
                RouteKind::ShadeAware
            };
            let args = RouteCommandArgs {
                from: args.from,
                to: args.to,
                time: args.time,
                date: args.date,
                mode: args.mode,
                kind,
            };
            handle_route_command(&options, cli.format, &args)
        }
        Command::Shade(args) => handle_shade_command(
            &options,
            cli.format,
            &ShadeCommandArgs {
                at: args.at,
                time: args.time,
                hourly: args.hourly,
            },
        ),
        Command::Buildings(args) => handle_buildings_command(
            &options,
            &BuildingsCommandArgs {
                bbox: args.bbox,
                output: args.output,
            },
        ),
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
