mod config;
mod error;
mod probe;
mod report;
mod scheduler;
mod strategy;
mod traits;
mod types;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::Config;
use probe::HttpProbe;
use scheduler::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use types::Metric;

#[derive(Parser)]
#[command(name = "proxyrank")]
#[command(about = "Rank HTTP/HTTPS proxies by latency, stability and throughput", long_about = None)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the number of stability attempts
    #[arg(long, global = true)]
    attempts: Option<u32>,

    /// Override the ping timeout (seconds)
    #[arg(long, global = true)]
    ping_timeout: Option<u64>,

    /// Override the speed timeout (seconds)
    #[arg(long, global = true)]
    speed_timeout: Option<u64>,

    /// Max proxies tested at once (0 = unlimited)
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,

    /// Hide progress bars
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ping, stability and speed tests (e.g., proxyrank run)
    Run,
    /// Single request latency
    Ping,
    /// Mean latency over repeated requests
    Stability,
    /// Time to download the speed target
    Speed,
    /// Show the configured proxy pool
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 日志走 stderr, stdout 只输出报告
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("proxyrank=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load(&cli.opts).await?;

    match cli.command {
        Commands::Run => handle_run(config, &Metric::ALL, cli.opts.quiet).await,
        Commands::Ping => handle_run(config, &[Metric::Ping], cli.opts.quiet).await,
        Commands::Stability => handle_run(config, &[Metric::Stability], cli.opts.quiet).await,
        Commands::Speed => handle_run(config, &[Metric::Speed], cli.opts.quiet).await,
        Commands::List => handle_list(&config),
    }

    Ok(())
}

async fn load(opts: &GlobalOpts) -> Result<Config> {
    let mut config = config::load_config(opts.config.as_deref()).await?;

    // 命令行参数覆盖配置文件
    if let Some(n) = opts.attempts {
        config.settings.stability_attempts = n;
    }
    if let Some(t) = opts.ping_timeout {
        config.settings.ping_timeout_secs = t;
    }
    if let Some(t) = opts.speed_timeout {
        config.settings.speed_timeout_secs = t;
    }
    if let Some(n) = opts.max_concurrency {
        config.settings.max_concurrency = n;
    }
    config.validate()?;

    Ok(config)
}

// --- Handlers ---

async fn handle_run(config: Config, metrics: &[Metric], quiet: bool) {
    let scheduler = Scheduler::new(config, Arc::new(HttpProbe::new())).with_progress(!quiet);
    let run = scheduler.run(metrics).await;

    match metrics {
        [metric] => {
            if let Some(result) = run.get(*metric) {
                report::print(metric.title(), &report::rank(result));
            }
        }
        _ => print!("{}", report::render_run(&run)),
    }
    println!();
}

fn handle_list(config: &Config) {
    println!("{}", "-".repeat(70));
    println!("{:<16} Proxy URL", "Name");
    println!("{}", "-".repeat(70));
    for proxy in &config.proxies {
        println!("{:<16} {}", proxy.name, proxy.masked_url());
    }
    println!("{}", "-".repeat(70));
    println!("ping target:  {}", config.targets.ping);
    println!("speed target: {}", config.targets.speed);
}
