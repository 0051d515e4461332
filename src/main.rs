mod geo;
mod hub;
mod identity;
mod location;
mod session;
mod storage;
mod web;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::identity::{JwtIdentityResolver, Role};
use crate::web::Config;

#[derive(Parser)]
#[command(name = "fleet-tracker")]
#[command(about = "Real-time vehicle location tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the location server
    Serve { config: String },
    /// Validate a configuration file
    Validate { config: String },
    /// Issue a credential signed with the configured secret
    Token {
        config: String,
        #[arg(long)]
        user_id: u64,
        /// reporter, tenant_watcher or rider_watcher
        #[arg(long)]
        role: String,
        #[arg(long)]
        tenant_id: Option<u64>,
        #[arg(long)]
        reporter_id: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(&config).await,
        Commands::Validate { config } => validate(&config),
        Commands::Token {
            config,
            user_id,
            role,
            tenant_id,
            reporter_id,
        } => token(&config, user_id, &role, tenant_id, reporter_id),
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            None
        }
    }
}

async fn serve(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    println!("Config is valid");
    println!("  bind: {}", config.web.bind);
    println!("  journal: {}", config.storage.journal_folder.display());
    println!(
        "  hub: queue {} / watcher buffer {}",
        config.hub.queue_capacity, config.hub.watcher_buffer
    );
    println!(
        "  policy: {} m / {} s, moving above {} m/s, stopped below {} m/s, heartbeat {} s",
        config.policy.min_distance_m,
        config.policy.min_elapsed_s,
        config.policy.min_moving_speed_mps,
        config.policy.max_stopped_speed_mps,
        config.policy.heartbeat_s
    );
    println!("  vehicles: {}", config.vehicles.len());
    ExitCode::SUCCESS
}

fn token(
    path: &str,
    user_id: u64,
    role: &str,
    tenant_id: Option<u64>,
    reporter_id: Option<u64>,
) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let Some(role) = Role::parse(role) else {
        eprintln!("Unknown role: {}", role);
        return ExitCode::FAILURE;
    };

    let resolver = JwtIdentityResolver::new(config.auth);
    match resolver.issue(user_id, role, tenant_id, reporter_id) {
        Ok(token) => {
            println!("{}", token);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to sign token: {}", e);
            ExitCode::FAILURE
        }
    }
}
