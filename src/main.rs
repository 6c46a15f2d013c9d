use clap::Parser;
use daybook::cli::{Cli, Commands};
use daybook::cli_handlers::handle_command;
use daybook::config::DaybookConfig;
use daybook::dashboard::server::DaybookServer;
use daybook::error::{PlannerError, Result};
use daybook::logging::{
    cleanup_old_logs, init_logging, log_dir, log_file_path, ApplicationMode, LoggingConfig,
};
use std::io::IsTerminal;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Commands::Serve { .. });

    let mut log_config = LoggingConfig::from_args(cli.quiet, cli.verbose > 0, cli.json);

    // Detached server: log to a rolling file instead of the terminal
    if serving {
        log_config = LoggingConfig::for_mode(ApplicationMode::Server);
        log_config.json_format = cli.json;
        let force_file_log = std::env::var("DAYBOOK_LOG_FILE").is_ok();
        if force_file_log || !std::io::stdout().is_terminal() {
            match log_file_path(ApplicationMode::Server) {
                Ok(path) => log_config.file_output = Some(path),
                Err(e) => eprintln!("Warning: cannot create log directory: {}", e),
            }
        }
    }

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli, serving).await {
        let error_response = e.to_error_response();
        match serde_json::to_string_pretty(&error_response) {
            Ok(body) => eprintln!("{}", body),
            Err(_) => eprintln!("{}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, serving: bool) -> Result<()> {
    let port = match cli.command {
        Commands::Serve { port } => port,
        _ => None,
    };
    let config = DaybookConfig::from_env()?.with_overrides(cli.db, cli.api, cli.owner, port)?;

    if serving {
        cleanup_old_logs(&log_dir(), config.log_retention_days).ok();
        return DaybookServer::new(config.port, config.db_path.clone())
            .run()
            .await
            .map_err(|e| PlannerError::PersistenceFailure(format!("{:#}", e)));
    }

    handle_command(cli.command, &config).await
}
