use crate::config::{BuildConfig, ImageLabels};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build custom live-build Linux images
#[derive(Parser, Debug)]
#[command(
    name = "livebuilder",
    about = "Build custom live-build Linux images",
    version,
    author,
    long_about = "livebuilder drives Debian live-build through a fixed pipeline: configure the \
                  build tree, import custom files, package lists and splash images, run the \
                  build, and collect the finished images. Progress is streamed to stdout while \
                  the build runs."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Verbose logging, including builder output"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full build pipeline",
        long_about = "Configures, imports assets, builds and collects the image.\n\n\
                      WARNING: the working directory is emptied before the build starts.\n\n\
                      Examples:\n  \
                      livebuilder build\n  \
                      livebuilder build /var/tmp/live --volume \"Rescue Disk\"\n  \
                      livebuilder build --config live.toml --package-list desktop.list --format json"
    )]
    Build(BuildArgs),

    #[command(
        about = "Check that the host has the tools a build needs",
        long_about = "Looks up required commands on PATH and compares the installed \
                      live-build version with the tested one.\n\n\
                      Examples:\n  \
                      livebuilder check\n  \
                      livebuilder check --builder /usr/local/bin/lb"
    )]
    Check(CheckArgs),

    #[command(
        about = "Print the configure command without running it",
        long_about = "Renders the configure template with the image labels and prints the \
                      resulting argv.\n\n\
                      Examples:\n  \
                      livebuilder render --volume \"Debian Live\"\n  \
                      livebuilder render --template lb.template --format json"
    )]
    Render(RenderArgs),
}

/// Image label overrides shared by `build` and `render`
#[derive(Args, Debug, Clone, Default)]
pub struct LabelArgs {
    #[arg(long, value_name = "TEXT", help = "ISO volume label")]
    pub volume: Option<String>,

    #[arg(long, value_name = "TEXT", help = "ISO publisher")]
    pub publisher: Option<String>,

    #[arg(long, value_name = "TEXT", help = "ISO application")]
    pub application: Option<String>,

    #[arg(long, value_name = "NAME", help = "Image file name prefix")]
    pub image_name: Option<String>,
}

impl LabelArgs {
    pub fn apply(&self, labels: &mut ImageLabels) {
        let overrides = [
            (&self.volume, &mut labels.volume),
            (&self.publisher, &mut labels.publisher),
            (&self.application, &mut labels.application),
            (&self.image_name, &mut labels.image_name),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        value_name = "WORKDIR",
        help = "Working directory (defaults to a fresh temp directory)"
    )]
    pub workdir: Option<PathBuf>,

    #[arg(short = 'c', long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub labels: LabelArgs,

    #[arg(long, value_name = "FILE", help = "Configure command template file")]
    pub template: Option<PathBuf>,

    #[arg(long = "custom-file", value_name = "FILE", help = "Custom file to import (repeatable)")]
    pub custom_files: Vec<PathBuf>,

    #[arg(long = "package-list", value_name = "FILE", help = "Package list to import (repeatable)")]
    pub package_lists: Vec<PathBuf>,

    #[arg(long = "splash", value_name = "FILE", help = "Splash image to import (repeatable)")]
    pub splash_images: Vec<PathBuf>,

    #[arg(short = 'o', long, value_name = "DIR", help = "Directory receiving built images")]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Kill any external command running longer than this"
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Progress output format"
    )]
    pub format: OutputFormatArg,
}

impl BuildArgs {
    /// Layer the command-line flags over a loaded configuration
    pub fn apply(&self, mut config: BuildConfig) -> BuildConfig {
        self.labels.apply(&mut config.image);
        if let Some(template) = &self.template {
            config.builder.configure_template_file = Some(template.clone());
        }
        config.assets.custom_files.extend(self.custom_files.iter().cloned());
        config.assets.package_lists.extend(self.package_lists.iter().cloned());
        config.assets.splash_images.extend(self.splash_images.iter().cloned());
        if let Some(dir) = &self.output_dir {
            config.output.artifact_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            config.builder.process_timeout_secs = Some(secs);
        }
        config
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[arg(short = 'c', long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "PROGRAM", help = "Builder program to check")]
    pub builder: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct RenderArgs {
    #[arg(short = 'c', long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub labels: LabelArgs,

    #[arg(long, value_name = "FILE", help = "Configure command template file")]
    pub template: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

impl RenderArgs {
    pub fn apply(&self, mut config: BuildConfig) -> BuildConfig {
        self.labels.apply(&mut config.image);
        if let Some(template) = &self.template {
            config.builder.configure_template_file = Some(template.clone());
        }
        config
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => super::output::OutputFormat::Human,
            OutputFormatArg::Json => super::output::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_build_args() {
        let args = CliArgs::parse_from(["livebuilder", "build"]);
        match args.command {
            Commands::Build(build) => {
                assert!(build.workdir.is_none());
                assert!(build.config.is_none());
                assert_eq!(build.format, OutputFormatArg::Human);
                assert!(build.custom_files.is_empty());
                assert!(build.timeout.is_none());
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_with_options() {
        let args = CliArgs::parse_from([
            "livebuilder",
            "build",
            "/var/tmp/live",
            "--volume",
            "Rescue Disk",
            "--package-list",
            "base.list",
            "--package-list",
            "desktop.list",
            "--splash",
            "splash.png",
            "--custom-file",
            "motd.txt",
            "--output-dir",
            "/srv/isos",
            "--timeout",
            "3600",
            "--format",
            "json",
        ]);

        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.workdir, Some(PathBuf::from("/var/tmp/live")));
                assert_eq!(build.labels.volume.as_deref(), Some("Rescue Disk"));
                assert_eq!(build.package_lists.len(), 2);
                assert_eq!(build.splash_images, vec![PathBuf::from("splash.png")]);
                assert_eq!(build.custom_files, vec![PathBuf::from("motd.txt")]);
                assert_eq!(build.output_dir, Some(PathBuf::from("/srv/isos")));
                assert_eq!(build.timeout, Some(3600));
                assert_eq!(build.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_build_args_apply() {
        let args = CliArgs::parse_from([
            "livebuilder",
            "build",
            "--publisher",
            "ACME",
            "--package-list",
            "extra.list",
            "--timeout",
            "60",
        ]);
        let Commands::Build(build) = args.command else {
            panic!("Expected Build command");
        };

        let config = build.apply(BuildConfig::default().with_package_list("base.list"));
        assert_eq!(config.image.publisher, "ACME");
        assert_eq!(config.image.volume, "DefaultVolume");
        assert_eq!(
            config.assets.package_lists,
            vec![PathBuf::from("base.list"), PathBuf::from("extra.list")]
        );
        assert_eq!(config.builder.process_timeout_secs, Some(60));
    }

    #[test]
    fn test_render_command() {
        let args = CliArgs::parse_from([
            "livebuilder",
            "render",
            "--image-name",
            "rescue",
            "--template",
            "lb.template",
        ]);
        match args.command {
            Commands::Render(render) => {
                let config = render.apply(BuildConfig::default());
                assert_eq!(config.image.image_name, "rescue");
                assert_eq!(
                    config.builder.configure_template_file,
                    Some(PathBuf::from("lb.template"))
                );
            }
            _ => panic!("Expected Render command"),
        }
    }

    #[test]
    fn test_check_command() {
        let args = CliArgs::parse_from(["livebuilder", "check", "--builder", "/opt/lb"]);
        match args.command {
            Commands::Check(check) => assert_eq!(check.builder.as_deref(), Some("/opt/lb")),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["livebuilder", "-v", "check"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["livebuilder", "-q", "--log-level", "warn", "check"]);
        assert!(args.quiet);
        assert_eq!(args.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["livebuilder", "-q", "-v", "check"]).is_err());
    }
}
