#![forbid(unsafe_code)]

use std::process::ExitCode;

use streambly_demo::cli::{Action, HELP_TEXT, Opts, version_line};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let opts = match Opts::parse() {
        Ok(Action::Run(opts)) => opts,
        Ok(Action::Help) => {
            println!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(Action::Version) => {
            println!("{}", version_line());
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("{msg}\n\n{HELP_TEXT}");
            return ExitCode::from(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("streambly=debug,streambly_demo=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match streambly_demo::run(&opts) {
        Ok(summary) => {
            if opts.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("failed to encode summary: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", streambly_demo::render(&summary));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(target: "streambly_demo", %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}
