mod cli;
mod core;
mod logging;

use clap::{Parser, Subcommand};

use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "cloud-doctor",
    about = "Cost, trend and waste report across AWS, GCP and Azure",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Provider to report on: aws, gcp, azure or all
    #[arg(short, long, default_value = "all")]
    provider: String,

    /// Show the last six months of totals instead of the monthly comparison
    #[arg(long)]
    trend: bool,

    /// List unused and idle resources instead of costs
    #[arg(long, conflicts_with = "trend")]
    waste: bool,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS CLI profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// GCP project ID
    #[arg(long, env = "GCP_PROJECT_ID")]
    project: Option<String>,

    /// GCP billing account ID (cost and trend reports)
    #[arg(long, env = "GCP_BILLING_ACCOUNT")]
    billing_account: Option<String>,

    /// Azure subscription ID
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription: Option<String>,

    /// Seconds each provider may take
    #[arg(long)]
    timeout: Option<u64>,

    /// Shorthand for JSON output
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate config file
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Ignoring config file: {}", e);
            AppConfig::default()
        }
    };

    let output_opts = cli::output::OutputOptions {
        format: cli::output::OutputFormat::resolve(cli.json, &config.settings.default_format),
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &config.settings.color),
        verbose: cli.verbose,
    };
    logging::init(cli.verbose, output_opts.use_color);

    match cli.command {
        None => {
            let args = cli::report_cmd::ReportArgs {
                provider: cli.provider,
                trend: cli.trend,
                waste: cli.waste,
                region: cli.region,
                profile: cli.profile,
                project: cli.project,
                billing_account: cli.billing_account,
                subscription: cli.subscription,
                timeout: cli.timeout,
            };
            cli::report_cmd::run(args, &config, &output_opts).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { force } => cli::config_cmd::init(force)?,
            ConfigAction::Check => cli::config_cmd::check()?,
        },
    }

    Ok(())
}
