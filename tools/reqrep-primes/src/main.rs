// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Prime calculator CLI
//!
//! Runs a prime requester, a prime replier, or both in one process.
//!
//! # Usage
//!
//! ```bash
//! # Replier only
//! reqrep-primes --replier
//!
//! # Requester asking for primes up to 100, 10 per reply
//! reqrep-primes --requester -n 100 -p 10
//!
//! # Both roles, stop after 30 seconds
//! reqrep-primes --requester --replier -n 1000 --timeout 30
//!
//! # Using configuration file
//! reqrep-primes --replier --config primes.toml
//! ```

use clap::{Parser, Subcommand};
use reqrep::primes::{PrimeNumberReply, PrimesReplier, PrimesRequester};
use reqrep::{Domain, Error, Reply, ReplyStatus, ServiceConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DESCRIPTION: &str = "Example Requester and Replier";

/// Streaming prime calculator
#[derive(Parser, Debug)]
#[command(name = "reqrep-primes")]
#[command(about = "Streaming prime calculator over request/reply")]
#[command(version)]
struct Args {
    /// Run the requester application
    #[arg(long)]
    requester: bool,

    /// Run the replier application
    #[arg(long)]
    replier: bool,

    /// Domain ID (overrides the configuration file)
    #[arg(short, long)]
    domain: Option<u32>,

    /// The number to calculate primes up to (only applicable with --requester)
    #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
    number: i32,

    /// Primes carried by each reply
    #[arg(short, long, default_value_t = 5, allow_hyphen_values = true)]
    primes_per_reply: i32,

    /// Seconds to wait for the application to finish (0: infinite)
    #[arg(long, default_value_t = 0)]
    timeout: u64,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "primes.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = args.command.take() {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(domain) = args.domain {
        config.domain_id = domain;
        config.validate()?;
    }

    if !args.requester && !args.replier {
        println!("{}", DESCRIPTION);
        let choice = prompt("Which one do you want to run? Enter 'requester' or 'replier' > ")?;
        if choice.to_ascii_lowercase().starts_with("req") {
            args.requester = true;
        } else {
            args.replier = true;
        }
    }
    if args.requester && args.number <= 0 {
        println!("{}", DESCRIPTION);
        args.number = prompt("Enter the number to calculate primes up to > ")?.parse()?;
    }

    let domain = Domain::new(config.domain_id)?;
    let token = CancellationToken::new();
    spawn_shutdown_triggers(&token, args.timeout);

    let replier = if args.replier {
        println!("Running PrimesReplier on domain {}", config.domain_id);
        Some(PrimesReplier::new(&domain, config.replier_params())?)
    } else {
        None
    };
    let requester = if args.requester {
        println!("Running PrimesRequester on domain {}", config.domain_id);
        Some(PrimesRequester::new(&domain, config.requester_params())?.with_max_wait(config.max_wait()))
    } else {
        None
    };

    // In a combined run the replier stops once the requester is done.
    let replier_token = token.child_token();
    let serve = async {
        match &replier {
            Some(replier) => replier.run(&replier_token).await,
            None => Ok(()),
        }
    };
    let ask = async {
        let result = match &requester {
            Some(requester) => requester
                .run(args.number, args.primes_per_reply, &token, print_reply)
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        if replier.is_some() && requester.is_some() {
            replier_token.cancel();
        }
        result
    };
    let (served, asked) = tokio::join!(serve, ask);

    domain.dispose();

    served?;
    match asked {
        // Already reported by `print_reply`.
        Err(Error::ReplierFailed(_)) | Err(Error::Cancelled) => Ok(()),
        other => Ok(other?),
    }
}

/// Cancel `token` on Ctrl+C, and after `timeout_secs` when non-zero.
fn spawn_shutdown_triggers(token: &CancellationToken, timeout_secs: u64) {
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Shutting down...");
            on_signal.cancel();
        }
    });

    if timeout_secs > 0 {
        let on_timeout = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
            tracing::info!("Timeout of {}s reached", timeout_secs);
            on_timeout.cancel();
        });
    }
}

/// One line per reply: its primes, then `DONE` or the error notice on the last one.
fn print_reply(reply: &Reply<PrimeNumberReply>) {
    let mut line = String::new();
    if let Some(data) = reply.data() {
        for prime in &data.primes {
            line.push_str(&prime.to_string());
            line.push(' ');
        }
    }
    match reply.status() {
        ReplyStatus::InProgress => {}
        ReplyStatus::Completed => line.push_str("DONE"),
        ReplyStatus::Error => line.push_str("Replier returned an error"),
    }
    println!("{}", line);
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::default();
    let content = toml::to_string_pretty(&config)?;
    std::fs::write(&output, content)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ServiceConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Service: {}", config.service_name);
            println!("Domain: {}", config.domain_id);
            match config.max_wait() {
                Some(wait) => println!("Max wait per reply: {:?}", wait),
                None => println!("Max wait per reply: infinite"),
            }
            println!("Requester QoS: {:?}", config.requester.to_qos());
            println!("Replier QoS: {:?}", config.replier.to_qos());
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            Err(e.into())
        }
    }
}
