use clap::{Parser, Subcommand};

const VERSION: &str = match option_env!("APP_VERSION") {
    Some(version) => version,
    _ => "0.1.0-dev",
};

#[derive(Parser)]
#[command(name = "batched-loader", author, version = VERSION, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Looks up users by id through a batching loader, one loader per
    /// simulated request, and logs every query sent to the user table
    Demo {
        /// User ids to look up, all requested in the same tick
        #[arg(default_values_t = [1u64, 2, 4, 5, 6, 10, 18])]
        keys: Vec<u64>,

        /// Path of a json or yml file with a `batch` section
        #[arg(short, long)]
        config: Option<String>,

        /// Milliseconds a window stays open, overrides `batch.delay`
        #[arg(long)]
        delay: Option<usize>,

        /// Keys per batch, overrides `batch.maxSize`
        #[arg(long)]
        max_batch_size: Option<usize>,

        /// Number of simulated inbound requests
        #[arg(long, default_value_t = 1)]
        requests: usize,
    },

    /// Prints the effective configuration
    Config {
        /// Path of a json or yml config file
        #[arg(short, long)]
        config: Option<String>,

        /// Output format: json or yml
        #[arg(short, long, default_value = "yml")]
        format: String,
    },
}
