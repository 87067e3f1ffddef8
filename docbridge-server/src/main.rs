use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docbridge_config::{ConfigLoader, DocbridgeConfig, LogLevel};
use docbridge_server::{docs::docs_tool_registry, init_tracing, Context7Client, Server};

#[derive(Parser)]
#[command(name = "docbridge")]
#[command(about = "MCP server exposing library documentation lookup over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the registered tools as JSON
    Tools,

    /// Validate configuration
    ValidateConfig,

    /// Print a sample configuration file
    SampleConfig,
}

fn load_config(cli: &Cli) -> Result<DocbridgeConfig> {
    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("Failed to load configuration")?;
    if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }
    Ok(config)
}

fn build_tools(config: &DocbridgeConfig) -> Result<docbridge_mcp::ToolRegistry> {
    let client = Context7Client::new(&config.docs).context("Failed to create docs client")?;
    docs_tool_registry(Arc::new(client), &config.docs).context("Failed to register tools")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::SampleConfig => {
            print!("{}", DocbridgeConfig::generate_sample());
        }
        Commands::ValidateConfig => {
            load_config(&cli)?;
            println!("Configuration is valid");
        }
        Commands::Tools => {
            let config = load_config(&cli)?;
            let tools = build_tools(&config)?;
            println!("{}", serde_json::to_string_pretty(&tools.list())?);
        }
        Commands::Serve { host, port } => {
            let mut config = load_config(&cli)?;
            if let Some(host) = host {
                config.server.bind_address = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            config
                .validate_all()
                .context("Invalid configuration after command-line overrides")?;

            init_tracing(&config.logging)?;
            let tools = build_tools(&config)?;
            Server::new(config, tools)?.start().await?;
        }
    }

    Ok(())
}
