use anyhow::Result;
use clap::Parser;
use futures_util::future::join_all;
use tracing::Instrument;

use super::command::{Cli, Command};
use super::users::UserStore;
use crate::core::config::{Config, Source};
use crate::core::AppContext;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Demo { keys, config, delay, max_batch_size, requests } => {
            let mut batch = read_config(config.as_deref()).await?.batch;
            if let Some(delay) = delay {
                batch = batch.delay(delay);
            }
            if let Some(max_batch_size) = max_batch_size {
                batch = batch.max_size(max_batch_size);
            }

            let app_ctx = AppContext::new(UserStore::seeded(), batch);
            for request in 1..=requests {
                serve(&app_ctx, &keys)
                    .instrument(tracing::info_span!("request", id = request))
                    .await?;
            }
            tracing::info!(
                requests,
                queries = app_ctx.loader.queries(),
                "Demo finished"
            );
            Ok(())
        }
        Command::Config { config, format } => {
            let config = read_config(config.as_deref()).await?;
            let source: Source = format.parse()?;
            println!("{}", source.encode(&config)?);
            Ok(())
        }
    }
}

async fn read_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::read(path).await?),
        None => Ok(Config::default()),
    }
}

/// One unit of work: a fresh loader, every key requested at once.
async fn serve(app_ctx: &AppContext<u64, UserStore>, keys: &[u64]) -> Result<()> {
    let loader = app_ctx.data_loader();
    let users = join_all(keys.iter().map(|id| loader.load_one(*id))).await;

    for (id, user) in keys.iter().zip(users) {
        match user? {
            Some(user) => println!("{id:>4}  {}", user.name),
            None => println!("{id:>4}  <not found>"),
        }
    }
    Ok(())
}
