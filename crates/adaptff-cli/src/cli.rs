use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "adaptff CLI - Evaluate refittable force fields and prepare their parameter files.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to evaluate geometries in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate energies (and optionally gradients) of geometries with a parameter file.
    Energy(EnergyArgs),
    /// Write a zero-valued parameter file covering every key a method needs for the geometries.
    Stub(StubArgs),
    /// Print the search bounds of every parameter in a parameter file.
    Bounds(BoundsArgs),
}

/// Arguments for the `energy` subcommand.
#[derive(Args, Debug)]
pub struct EnergyArgs {
    /// Geometry files in TOML format.
    #[arg(value_name = "GEOMETRY")]
    pub geometries: Vec<PathBuf>,

    /// Run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Method string, e.g. 'amberff:totalshift' or 'adaptivegupta:2.0,true'.
    /// Defaults to the method the parameter file is tagged with.
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<String>,

    /// Parameter file to evaluate with.
    #[arg(short, long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Write energies as CSV to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub energies: Option<PathBuf>,

    /// Also compute Cartesian gradients and write them as CSV to this file.
    #[arg(short, long, value_name = "PATH")]
    pub gradients: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S output.energies=run.csv
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `stub` subcommand.
#[derive(Args, Debug)]
pub struct StubArgs {
    /// Geometry files in TOML format.
    #[arg(required = true, value_name = "GEOMETRY")]
    pub geometries: Vec<PathBuf>,

    /// Method string the stub is generated for.
    #[arg(short, long, required = true, value_name = "METHOD")]
    pub method: String,

    /// Path for the generated parameter file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

/// Arguments for the `bounds` subcommand.
#[derive(Args, Debug)]
pub struct BoundsArgs {
    /// Parameter file whose bounds are printed.
    #[arg(value_name = "PATH")]
    pub params: PathBuf,

    /// Method string; defaults to the method the parameter file is tagged with.
    #[arg(short, long, value_name = "METHOD")]
    pub method: Option<String>,
}
