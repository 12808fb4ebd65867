use clap::{Parser, Subcommand};
use sdk_rust::AdminClient;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the balancing proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8100")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered backends
    List,
    /// Register a backend
    Add { backend: String },
    /// Deregister a backend
    Remove { backend: String },
    /// Show outstanding requests and health per backend
    Load,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let admin = AdminClient::new(&cli.url);

    match cli.command {
        Commands::List => print_json(&admin.list().await?)?,
        Commands::Add { backend } => print_json(&admin.register(&backend).await?)?,
        Commands::Remove { backend } => print_json(&admin.deregister(&backend).await?)?,
        Commands::Load => print_json(&admin.load().await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
