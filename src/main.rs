use livebuilder::cli::commands::{CliArgs, Commands};
use livebuilder::cli::handlers::{handle_build, handle_check, handle_render};
use livebuilder::util::logging::{init_logging, parse_level, LoggingConfig};
use livebuilder::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("livebuilder v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Build(build_args) => handle_build(build_args, args.quiet, args.verbose).await,
        Commands::Check(check_args) => handle_check(check_args, args.quiet).await,
        Commands::Render(render_args) => handle_render(render_args).await,
    };

    std::process::exit(exit_code);
}

/// Flags win over `LIVEBUILDER_LOG_LEVEL`; JSON output still follows the environment
fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_env();

    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }

    init_logging(config);
}
