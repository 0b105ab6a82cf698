use anyhow::Context;
use shredder::{Config, Interpreter};
use std::process;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command_name = args.first().map(String::as_str).unwrap_or("shredder");
    let rest: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

    let config = match Config::from_args(command_name, &rest) {
        Ok(config) => config,
        Err(exit) => match exit.status {
            Ok(()) => {
                println!("{}", exit.output);
                return Ok(());
            }
            Err(()) => {
                eprintln!("{}", exit.output);
                process::exit(1);
            }
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
    tracing::debug!(timeout = config.timeout, "starting");

    let mut shell = Interpreter::from_config(&config).context("failed to start the shell")?;
    shell.repl().context("shell stopped")?;
    Ok(())
}
