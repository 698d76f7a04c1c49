mod config;
mod link;
mod scenario;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use config::DemoConfig;

#[derive(Parser)]
#[command(name = "tether-demo")]
#[command(about = "Synchronizes a simulated ball across a lossy link and reports tracking error")]
struct Args {
    #[arg(short, long, help = "TOML file with [sync], [link] and [scenario] tables")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Simulated seconds")]
    duration: Option<f32>,

    #[arg(long, help = "Packet loss percentage (0-100)")]
    loss_percent: Option<f32>,

    #[arg(long, help = "Minimum latency in ms")]
    min_latency: Option<u32>,

    #[arg(long, help = "Maximum latency in ms")]
    max_latency: Option<u32>,

    #[arg(long, help = "Jitter in ms")]
    jitter: Option<u32>,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, help = "Print the effective configuration and exit")]
    print_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    if let Some(duration) = args.duration {
        config.scenario.duration = duration;
    }
    if let Some(loss) = args.loss_percent {
        config.link.loss_percent = loss;
    }
    if let Some(min) = args.min_latency {
        config.link.min_latency_ms = min;
    }
    if let Some(max) = args.max_latency {
        config.link.max_latency_ms = max;
    }
    if let Some(jitter) = args.jitter {
        config.link.jitter_ms = jitter;
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    log::info!(
        "running {:.1}s at {} Hz, sending at {} Hz over {:.0}% loss, {}-{} ms",
        config.scenario.duration,
        config.scenario.tick_rate,
        config.sync.send_rate,
        config.link.loss_percent,
        config.link.min_latency_ms,
        config.link.max_latency_ms
    );

    let report = scenario::run(&config, args.seed)?;

    println!("ticks:                  {}", report.ticks);
    println!(
        "link:                   {} sent, {} dropped, {} delivered",
        report.link.sent, report.link.dropped, report.link.delivered
    );
    println!(
        "records:                {} accepted, {} out of order",
        report.records_accepted, report.records_dropped
    );
    println!("discarded payloads:     {}", report.discarded);
    println!("extrapolation failures: {}", report.extrapolation_failures);
    println!("mean tracking error:    {:.4}", report.mean_error);
    println!("max tracking error:     {:.4}", report.max_error);

    Ok(())
}
