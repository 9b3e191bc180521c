use std::sync::Arc;

use clap::Parser;
use graphdock_host::cli::{Cli, Commands};
use graphdock_host::driver::HttpGraphDriver;
use graphdock_host::{logging, server, sessions, storage};
use graphdock_protocol::ConnectionParams;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let storage_dir = cli
        .storage_dir
        .clone()
        .unwrap_or_else(storage::default_storage_dir);

    let result = match cli.command {
        Commands::Serve { socket } => {
            server::serve(&socket, &storage_dir, Arc::new(HttpGraphDriver::new())).await
        }
        Commands::TestConnection {
            host,
            login,
            password,
            db,
        } => {
            let params = ConnectionParams {
                id: "adhoc".to_string(),
                name: "adhoc".to_string(),
                host,
                login,
                password,
                db,
            };
            let driver = HttpGraphDriver::new();
            println!("{}", sessions::connection_report(&driver, &params).await);
            Ok(())
        }
    };

    if let Err(err) = result {
        error!(target = "graphdock", error = %err, "command failed");
        std::process::exit(1);
    }
}
