//! churnkit - command line entry point

use clap::Parser;
use churnkit::cli::{cmd_inspect, cmd_predict, cmd_train, cmd_vocab, show_help, Cli, Commands, TrainArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churnkit=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { data, output, models, test_ratio, seed, report, importances, config, strict_scaling }) => {
            cmd_train(TrainArgs {
                data: &data,
                output: &output,
                models: models.as_deref(),
                test_ratio,
                seed,
                report: report.as_deref(),
                importances: importances.as_deref(),
                config: config.as_deref(),
                strict_scaling,
            })?;
        }
        Some(Commands::Predict { model, record, data, output, format, fields }) => {
            cmd_predict(&model, record.as_deref(), data.as_deref(), output.as_deref(), format, &fields)?;
        }
        Some(Commands::Inspect { model }) => {
            cmd_inspect(&model)?;
        }
        Some(Commands::Vocab { model, field }) => {
            cmd_vocab(&model, field.as_deref())?;
        }
        None => {
            show_help();
        }
    }

    Ok(())
}
