mod commands;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use converge_cloud::{
    ApplyConfig, AttachResource, DetachResource, ResourceKind, StartReplication, StopReplication,
    SwitchMaster, ToggleSsl,
};

#[derive(Parser)]
#[command(name = "convergectl")]
#[command(about = "Submit a database change and wait until it settles", long_about = None)]
struct Cli {
    /// API endpoint (overrides the settings file)
    #[arg(long, global = true, env = "CONVERGE_ENDPOINT")]
    endpoint: Option<String>,

    /// API token
    #[arg(long, global = true, env = "CONVERGE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Region sent with every request
    #[arg(long, global = true, env = "CONVERGE_REGION")]
    region: Option<String>,

    /// Polling deadline in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Seconds between polls
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start replication on a replica
    StartReplication {
        /// Instance ID
        instance: String,
    },
    /// Stop replication on a replica
    StopReplication {
        /// Instance ID
        instance: String,
    },
    /// Turn SSL on or off
    Ssl {
        /// Instance ID
        instance: String,
        /// Desired SSL state
        state: SslState,
    },
    /// Promote a replica to master
    SwitchMaster {
        /// Instance ID
        instance: String,
        /// Replica to promote
        #[arg(short, long)]
        replica: String,
        /// Switch even if the replica is lagging
        #[arg(long)]
        force: bool,
    },
    /// Apply database parameters
    ApplyConfig {
        /// Instance ID
        instance: String,
        /// Parameter to set (name=value), repeatable
        #[arg(short = 's', long = "set", required = true)]
        set: Vec<String>,
        /// Allow a restart if a parameter needs one
        #[arg(long)]
        restart: bool,
    },
    /// Attach a resource to an instance
    Attach {
        /// Instance ID
        instance: String,
        /// security-group, read-only-group, parameter-template
        #[arg(short, long, value_parser = parse_kind)]
        kind: ResourceKind,
        /// Resource ID
        #[arg(short, long)]
        resource: String,
    },
    /// Detach a resource from an instance
    Detach {
        /// Instance ID
        instance: String,
        /// security-group, read-only-group, parameter-template
        #[arg(short, long, value_parser = parse_kind)]
        kind: ResourceKind,
        /// Resource ID
        #[arg(short, long)]
        resource: String,
    },
    /// Wait for an instance to reach a state
    Wait {
        /// Instance ID
        instance: String,
        /// Target state
        #[arg(long, default_value = "running")]
        status: String,
    },
    /// Check a task's status once
    Task {
        /// Task ID
        task_id: String,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum SslState {
    On,
    Off,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    ResourceKind::parse(s).ok_or_else(|| {
        format!(
            "unknown resource kind '{}' (expected security-group, read-only-group or parameter-template)",
            s
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout は結果出力 (--json) 用に空けておく
    let directive = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive)),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("converge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = converge_config::load_settings()?;
    let ctx = utils::Context::new(
        settings,
        utils::ConnectionArgs {
            endpoint: cli.endpoint,
            token: cli.token,
            region: cli.region,
        },
        utils::TimingOverrides {
            timeout_secs: cli.timeout,
            poll_interval_secs: cli.poll_interval,
        },
        cli.json,
    )?;

    match cli.command {
        Commands::StartReplication { instance } => {
            commands::mutate::handle(&ctx, &StartReplication::new(&instance)?).await?;
        }
        Commands::StopReplication { instance } => {
            commands::mutate::handle(&ctx, &StopReplication::new(&instance)?).await?;
        }
        Commands::Ssl { instance, state } => {
            let enabled = matches!(state, SslState::On);
            commands::mutate::handle(&ctx, &ToggleSsl::new(&instance, enabled)?).await?;
        }
        Commands::SwitchMaster {
            instance,
            replica,
            force,
        } => {
            let mutation = SwitchMaster::new(&instance, &replica)?.with_force(force);
            commands::mutate::handle(&ctx, &mutation).await?;
        }
        Commands::ApplyConfig {
            instance,
            set,
            restart,
        } => {
            let mutation = ApplyConfig::from_pairs(&instance, set.as_slice())?.with_restart(restart);
            commands::mutate::handle(&ctx, &mutation).await?;
        }
        Commands::Attach {
            instance,
            kind,
            resource,
        } => {
            let mutation = AttachResource::new(&instance, kind, &resource)?;
            commands::mutate::handle(&ctx, &mutation).await?;
        }
        Commands::Detach {
            instance,
            kind,
            resource,
        } => {
            let mutation = DetachResource::new(&instance, kind, &resource)?;
            commands::mutate::handle(&ctx, &mutation).await?;
        }
        Commands::Wait { instance, status } => {
            commands::wait::handle(&ctx, &instance, &status).await?;
        }
        Commands::Task { task_id } => {
            commands::task::handle(&ctx, &task_id).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}
