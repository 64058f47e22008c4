use clap::Parser;
use milescout_cli::{init_tracing, run, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);
    run(args).await
}
