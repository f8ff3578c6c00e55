use anyhow::Result;
use clap::{Parser, Subcommand};
use compounding_docs::mcp_server::DocsMcpServer;
use std::panic;

/// Compounding Docs: per-project markdown knowledge MCP server
#[derive(Parser)]
#[command(name = "compounding-docs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for project knowledge search and RAG over markdown docs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server over stdio (default mode)
    Serve,

    /// Show version and system information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs and diagnostics go to stderr only; stdout belongs to the transport
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Handle commands
    match cli.command {
        Some(Commands::Version) => {
            show_version_info();
            return Ok(());
        }
        Some(Commands::Serve) | None => {
            // Set up global panic handler
            setup_panic_handler();

            // Start the MCP server over stdio with error handling
            if let Err(e) = DocsMcpServer::serve_stdio().await {
                tracing::error!("Fatal error in MCP server: {:#}", e);
                eprintln!("Fatal error: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Display comprehensive version and system information
fn show_version_info() {
    use compounding_docs::paths::PlatformPaths;

    // Basic version info
    println!("compounding-docs v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // System information
    println!("System Information:");
    println!("  Build Date:      {}", env!("BUILD_TIMESTAMP"));
    println!("  Git Commit:      {}", env!("GIT_COMMIT_HASH"));
    println!("  Rust Version:    {}", env!("CARGO_PKG_RUST_VERSION"));
    println!();

    // Vector database configuration
    println!("Vector Database:");
    println!("  Backend:         LanceDB");
    println!(
        "  Default Path:    {}",
        PlatformPaths::default_lancedb_path().display()
    );
    println!("  Type:            Embedded (no external server required)");
    println!();

    // Embedding service information
    println!("Embedding Service:");
    println!("  Default URL:     http://localhost:11434");
    println!("  Dimensions:      1024");
    println!("  Provider:        Local generator service (Ollama-compatible)");
    println!();

    // Configuration
    println!("Configuration:");
    println!("  Project Config:  {{root}}/.csharp-compounding-docs/config.json");
    println!("  Docs Directory:  {{root}}/.csharp-compounding-docs/docs/");
    println!();

    // Additional features
    println!("Features:");
    println!("  Tenant Isolation: (project_name, branch_name, path_hash)");
    println!("  Live Index:       Debounced file watcher + reconciliation");
    println!("  Degradation:      Circuit breaker + deferred indexing queue");
    println!("  RAG:              Critical prepend, chunk dedup, link expansion");
}

/// Set up a global panic handler that logs panic information
fn setup_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic message".to_string()
        };

        // Log to tracing system
        tracing::error!(
            "PANIC at {}: {}\nBacktrace:\n{:?}",
            location,
            message,
            backtrace
        );

        // Also log to stderr for immediate visibility
        eprintln!("\n!!! PANIC !!!");
        eprintln!("Location: {}", location);
        eprintln!("Message: {}", message);
        eprintln!("Backtrace:\n{:?}", backtrace);
        eprintln!("!!! END PANIC !!!\n");
    }));

    tracing::info!("Global panic handler initialized");
}
