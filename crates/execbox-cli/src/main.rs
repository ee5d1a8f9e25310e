use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use execbox_cli::{exit_status, parse_input, RemoteExecutor, SourceFile};
use execbox_core::{ConfigLoader, ExecutionEngine, ExecutionResult, RuntimeRegistry};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "execbox", author, version, about = "Run untrusted code in disposable sandboxes")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, global = true, help = "Engine configuration file (YAML)")]
    config: Option<PathBuf>,

    #[clap(long, short, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a source file and print the result as JSON
    Run {
        file: PathBuf,

        #[clap(long, short, help = "Runtime to use (default: inferred from the file extension)")]
        runtime: Option<String>,

        #[clap(long, short, help = "JSON object made available to the program")]
        input: Option<String>,

        #[clap(long, short, help = "Timeout in seconds (default: engine configuration)")]
        timeout: Option<u64>,

        #[clap(long, env = "EXECBOX_SERVER", help = "Executor service URL; runs locally through Docker when absent")]
        server: Option<String>,
    },
    /// List supported runtimes and their images
    Runtimes {
        #[clap(long, env = "EXECBOX_SERVER", help = "Ask this executor service instead")]
        server: Option<String>,
    },
    /// Pull sandbox images ahead of time
    Pull {
        #[clap(help = "Runtimes to prepare (default: all)")]
        runtimes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Commands::Run {
            file,
            runtime,
            input,
            timeout,
            server,
        } => {
            let input = input.as_deref().map(parse_input).transpose()?;
            let registry = RuntimeRegistry::builtin();
            let source = SourceFile::load(&file, runtime.as_deref(), &registry).await?;
            log::info!("Running {} with runtime {}", source.path.display(), source.runtime);
            let request = source.into_request(input, timeout);

            let result = match server {
                Some(url) => {
                    let remote = RemoteExecutor::new(url);
                    remote.execute(&request).await?
                }
                None => local_engine(cli.config).await?.execute(request).await?,
            };

            print_result(&result)?;
            std::process::exit(exit_status(&result));
        }
        Commands::Runtimes { server } => {
            let runtimes = match server {
                Some(url) => RemoteExecutor::new(url).runtimes().await?,
                None => RuntimeRegistry::builtin()
                    .profiles()
                    .into_iter()
                    .map(|profile| (profile.name.to_string(), profile.image.to_string()))
                    .collect(),
            };
            for (name, image) in runtimes {
                println!("{:<10} {}", name, image);
            }
            Ok(())
        }
        Commands::Pull { runtimes } => {
            let engine = local_engine(cli.config).await?;
            engine
                .health_check()
                .await
                .context("Docker is required to pull images")?;
            for image in engine.prepare(&runtimes).await? {
                println!("ready  {}", image);
            }
            Ok(())
        }
    }
}

async fn local_engine(config: Option<PathBuf>) -> Result<ExecutionEngine> {
    let config = ConfigLoader::load(config.as_deref())
        .await
        .context("Failed to load engine configuration")?;
    Ok(ExecutionEngine::connect_docker(config)?)
}

fn print_result(result: &ExecutionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
