use anyhow::Result;
use clap::Parser;
use pmm_admin::cli::{Cli, Commands};
use pmm_admin::{Config, SummaryBuilder};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable with --json
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(cli.globals.log_level().into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config =
        Config::load(cli.globals.config.as_deref())?.with_overrides(cli.globals.config_overrides());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling requests");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Summary(args) => {
            let builder = SummaryBuilder::new(config)?;
            let result = builder.build(&cancel, &args.to_options()).await?;
            if cli.globals.json {
                println!("{}", serde_json::to_string(&result)?);
            } else {
                println!("{}", result);
            }
        }
    }

    Ok(())
}
