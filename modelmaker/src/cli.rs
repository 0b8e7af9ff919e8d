//! The `modelmaker` command line interface.
//!
//! The extraction pipeline and the file formats are provided by the [`modelmaker_lib`] crate.

use crate::{inspect, logging, make};
use anyhow::Context;
use clap::Parser;
use log::info;

static HELP_TEMPLATE: &str = "{before-help}{name} (v{version}) - {author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}";

#[derive(Clone, Debug, clap::Parser)]
#[command(
    name = "modelmaker",
    about = "Extracts one surface model per label from a labeled volume",
    version,
    propagate_version = true,
    help_template = HELP_TEMPLATE,
)]
struct CommandlineArgs {
    /// Enable quiet mode (no output except for severe panic messages), overrides verbosity level
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
    /// Print more verbose output, use multiple "v"s for even more verbose output (-v, -vv)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbosity: u8,
    /// Subcommands
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Clone, Debug, clap::Parser)]
enum Subcommand {
    /// Generate surface models from the labels of a volume
    #[command(help_template = HELP_TEMPLATE)]
    Make(make::MakeSubcommandArgs),
    /// Print information and the label histogram of a volume
    #[command(help_template = HELP_TEMPLATE)]
    Inspect(inspect::InspectSubcommandArgs),
}

/// A simple on/off switch for command line arguments.
///
/// For example an argument defined as:
/// ```rust ignore
/// /// Pad the volume before extracting the surfaces
/// #[arg(
///     long,
///     default_value = "off",
///     value_name = "off|on",
///     ignore_case = true,
///     require_equals = true
/// )]
/// pub pad: Switch,
/// ```
/// can be used in the CLI as `--pad=on` or `--pad=off`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Switch {
    Off,
    On,
}

impl Switch {
    pub(crate) fn into_bool(self) -> bool {
        match self {
            Switch::Off => false,
            Switch::On => true,
        }
    }
}

/// Runs the modelmaker CLI with the provided command line arguments.
///
/// This function behaves like the binary `modelmaker` command line tool including output to stdout
/// and stderr. It will also exit the process depending on the command line arguments, so it should
/// not be used in typical library contexts.
/// Note that the first argument is always ignored - this is typically the binary name when called using
/// `std::env::args()` from the terminal:
/// ```
/// modelmaker::cli::run_modelmaker(["modelmaker", "--version"]);
/// ```
pub fn run_modelmaker<I, T>(args: I) -> Result<(), anyhow::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    run_modelmaker_impl(args).inspect_err(logging::log_error)
}

fn run_modelmaker_impl<I, T>(args: I) -> Result<(), anyhow::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cmd_args = CommandlineArgs::parse_from(args);

    let verbosity = VerbosityLevel::from(cmd_args.verbosity);
    let is_quiet = cmd_args.quiet;

    logging::initialize_logging(verbosity, is_quiet).context("Failed to initialize logging")?;
    logging::log_program_info();

    let result = match &cmd_args.subcommand {
        Subcommand::Make(cmd_args) => make::make_subcommand(cmd_args),
        Subcommand::Inspect(cmd_args) => inspect::inspect_subcommand(cmd_args),
    };

    info!("Timings:");
    match modelmaker_lib::profiling::write_to_string() {
        Ok(timings) => timings
            .lines()
            .filter(|l| !l.is_empty())
            .for_each(|l| info!("{}", l)),
        Err(e) => info!("  not available ({})", e),
    }

    info!(
        "Finished at {}.",
        chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
    );

    result
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum VerbosityLevel {
    None,
    Verbose,
    VeryVerbose,
    VeryVeryVerbose,
}

impl From<u8> for VerbosityLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => VerbosityLevel::None,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::VeryVerbose,
            _ => VerbosityLevel::VeryVeryVerbose,
        }
    }
}

impl VerbosityLevel {
    /// Maps this verbosity level to a log filter
    pub fn into_filter(self) -> Option<log::LevelFilter> {
        match self {
            VerbosityLevel::None => None,
            VerbosityLevel::Verbose => Some(log::LevelFilter::Info),
            VerbosityLevel::VeryVerbose => Some(log::LevelFilter::Debug),
            VerbosityLevel::VeryVeryVerbose => Some(log::LevelFilter::Trace),
        }
    }
}

#[cfg(test)]
mod cli_args_tests {
    use super::*;
    use crate::io::OutputFormat;
    use crate::make::{FilterType, HistogramOverflow};
    use std::path::PathBuf;

    fn parse_make(args: &[&str]) -> make::MakeSubcommandArgs {
        let args = ["modelmaker", "make"].iter().chain(args);
        match CommandlineArgs::try_parse_from(args)
            .expect("this command is supposed to work")
            .subcommand
        {
            Subcommand::Make(make_args) => make_args,
            _ => panic!("expected the make subcommand"),
        }
    }

    #[test]
    fn verify_main_cli() {
        use clap::CommandFactory;
        CommandlineArgs::command().debug_assert()
    }

    #[test]
    fn verify_make_cli() {
        use clap::CommandFactory;
        make::MakeSubcommandArgs::command().debug_assert()
    }

    #[test]
    fn verify_inspect_cli() {
        use clap::CommandFactory;
        inspect::InspectSubcommandArgs::command().debug_assert()
    }

    #[test]
    fn test_help() {
        for args in [
            vec!["modelmaker", "--help"],
            vec!["modelmaker", "make", "--help"],
            vec!["modelmaker", "inspect", "--help"],
        ] {
            assert_eq!(
                CommandlineArgs::try_parse_from(args)
                    .expect_err("this command is supposed to fail")
                    .kind(),
                clap::error::ErrorKind::DisplayHelp
            );
        }
    }

    #[test]
    fn test_make_defaults() {
        let args = parse_make(&["labels.vtk", "--labels", "5"]);
        assert_eq!(args.input_volume, PathBuf::from("labels.vtk"));
        assert_eq!(args.labels, vec![5]);
        assert_eq!(args.start_label, -1);
        assert_eq!(args.end_label, -1);
        assert_eq!(args.generate_all, Switch::Off);
        assert_eq!(args.name, "Model");
        assert_eq!(args.smooth, 10);
        assert_eq!(args.decimate, 0.25);
        assert_eq!(args.joint_smoothing, Switch::Off);
        assert_eq!(args.split_normals, Switch::On);
        assert_eq!(args.point_normals, Switch::On);
        assert_eq!(args.pad, Switch::Off);
        assert_eq!(args.filter_type, FilterType::Sinc);
        assert_eq!(args.histogram_overflow, HistogramOverflow::Clamp);
        assert_eq!(args.output_format, OutputFormat::Vtk);
        assert_eq!(args.model_scene_file, None);
        assert_eq!(args.ijk_to_ras, None);
    }

    #[test]
    fn test_make_switches_and_lists() {
        let args = parse_make(&[
            "labels.vti",
            "--labels",
            "3",
            "1",
            "2",
            "--joint-smoothing=on",
            "--pad=on",
            "--skip-unnamed=on",
            "--save-intermediate-models=on",
            "--filter-type",
            "Laplacian",
            "--model-scene-file",
            "out/scene.mrml.json#Hierarchy2",
        ]);
        assert_eq!(args.labels, vec![3, 1, 2]);
        assert_eq!(args.joint_smoothing, Switch::On);
        assert_eq!(args.pad, Switch::On);
        assert_eq!(args.skip_unnamed, Switch::On);
        assert_eq!(args.save_intermediate_models, Switch::On);
        assert_eq!(args.filter_type, FilterType::Laplacian);
        assert_eq!(
            args.model_scene_file.as_deref(),
            Some("out/scene.mrml.json#Hierarchy2")
        );
    }

    #[test]
    fn test_make_ijk_to_ras() {
        let values = [
            "-1", "0", "0", "10.5", "0", "-1", "0", "0", "0", "0", "1", "-3", "0", "0", "0", "1",
        ];
        let mut args = vec!["labels.vtk", "--generate-all=on", "--ijk-to-ras"];
        args.extend(values);
        let args = parse_make(&args);
        assert_eq!(args.generate_all, Switch::On);
        assert_eq!(
            args.ijk_to_ras,
            Some(vec![
                -1.0, 0.0, 0.0, 10.5, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, -3.0, 0.0, 0.0, 0.0, 1.0
            ])
        );

        // Too few values
        assert!(
            CommandlineArgs::try_parse_from([
                "modelmaker",
                "make",
                "labels.vtk",
                "--ijk-to-ras",
                "1",
                "0",
                "0"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_switch_requires_equals() {
        assert!(
            CommandlineArgs::try_parse_from(["modelmaker", "make", "labels.vtk", "--pad", "on"])
                .is_err()
        );
    }
}
