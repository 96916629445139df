use batched_loader::tracing::default_tracing;

fn run_blocking() -> anyhow::Result<()> {
    // current thread runtime: the subscriber set below covers spawned batches too
    let _guard = tracing::subscriber::set_default(default_tracing());
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async { batched_loader::cli::run().await })
}

fn main() {
    if let Err(error) = run_blocking() {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
