use clap::Parser;
use tracing::info;

use gridd_core::{
    BootstrapConfiguration, ConfigurationSnapshot, ConfigurationError, DiscoveryBinding,
    GriddResult, GridNode, GridRuntimeRegistry, HostContext, NodeIdentity, SecurityContext,
    ServiceRegistry,
};

#[derive(Parser)]
#[command(name = "gridd")]
#[command(about = "Distributed in-memory compute and data grid node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start a grid node and keep it running until SIGINT/SIGTERM
    Run {
        /// Grid runtime implementation to use
        #[arg(long, default_value = "mock")]
        runtime: String,

        /// Override the instance name hint from the environment
        #[arg(long)]
        instance_name: Option<String>,
    },
    /// Validate configuration and print the assembled bootstrap settings
    /// without starting anything
    Check {
        /// Override the instance name hint from the environment
        #[arg(long)]
        instance_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> GriddResult<()> {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "gridd=info"
            .parse()
            .map_err(|e| ConfigurationError::InvalidSetting {
                key: "RUST_LOG",
                message: format!("invalid log directive: {}", e),
            })?,
    );

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            runtime,
            instance_name,
        } => run(&runtime, instance_name).await,
        Commands::Check { instance_name } => check(instance_name),
    }
}

async fn run(runtime_type: &str, instance_name: Option<String>) -> GriddResult<()> {
    let snapshot = load_snapshot(instance_name)?;

    let registry = GridRuntimeRegistry::default();
    let runtime = registry.create(runtime_type)?;
    let ctx = HostContext::new("gridd");

    let mut node = GridNode::bootstrap(&snapshot, runtime.as_ref(), &ctx).await?;

    // Teardown is guaranteed on every exit path of serve(), including
    // registration failure.
    let result = serve(&node, &ctx).await;
    node.stop().await;
    result
}

async fn serve(node: &GridNode, ctx: &HostContext) -> GriddResult<()> {
    let grid = match node.grid() {
        Some(grid) => grid,
        None => {
            return Err(gridd_core::BootstrapError::DependencyNotReady { service: "grid" }.into())
        }
    };

    let services = ServiceRegistry::register_all(grid, node.identity(), ctx)?;
    info!(services = ?services.names(), "grid node ready, waiting for shutdown signal");

    wait_for_shutdown().await;
    info!("shutdown signal received");
    Ok(())
}

fn check(instance_name: Option<String>) -> GriddResult<()> {
    let snapshot = load_snapshot(instance_name)?;

    let identity = NodeIdentity::resolve(snapshot.instance_name_hint.as_deref());
    let security = SecurityContext::from_snapshot(&snapshot)?;
    let discovery = DiscoveryBinding::select(&snapshot)?;
    let configuration = BootstrapConfiguration::assemble(&snapshot, &identity, security, discovery);

    // Secrets serialize redacted, so this is safe to print.
    println!("{}", serde_json::to_string_pretty(&configuration)?);
    Ok(())
}

fn load_snapshot(instance_name: Option<String>) -> GriddResult<ConfigurationSnapshot> {
    let mut snapshot = ConfigurationSnapshot::from_env()?;
    if let Some(name) = instance_name {
        snapshot.instance_name_hint = Some(name);
    }
    Ok(snapshot)
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
