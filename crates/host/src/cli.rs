use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "graphdock")]
#[command(about = "Graph database workbench host - sessions, storage, and tabs over a socket")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory for persisted settings (defaults to the user config dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the host over a unix socket until the window closes
    Serve {
        /// Socket path surfaces connect to
        #[arg(long, default_value = "/tmp/graphdock.sock")]
        socket: PathBuf,
    },

    /// Probe connectivity to a database and print the verdict
    #[command(alias = "test")]
    TestConnection {
        /// Database endpoint, e.g. http://localhost:7474
        host: String,
        #[arg(long, default_value = "neo4j")]
        login: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "neo4j")]
        db: String,
    },
}
