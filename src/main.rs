use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use vendor_deploy::cli::Cli;
use vendor_deploy::report::{failure_message, progress_line, success_banner};
use vendor_deploy::{init_logging, Deployer, DeployProgress, ProductProfile, ReqwestProbe, SystemRunner};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: could not start the async runtime: {e}");
            return ExitCode::from(2);
        }
    };
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let options = cli.options();
    let _log = match init_logging(&options.paths.log_file, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}\n  Fix: {}", e.fix_suggestion());
            return ExitCode::from(2);
        }
    };

    let deployer = match setup(&cli) {
        Ok(deployer) => deployer,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    match deployer.run(print_progress).await {
        Ok(summary) => {
            print!("{}", success_banner(&summary));
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprint!("{}", failure_message(&failure));
            ExitCode::FAILURE
        }
    }
}

fn setup(cli: &Cli) -> anyhow::Result<Deployer> {
    let options = cli.options();
    let profile = match &cli.profile {
        Some(path) => ProductProfile::load(path)
            .with_context(|| format!("loading product profile {}", path.display()))?,
        None => ProductProfile::default(),
    };
    let http = ReqwestProbe::new(options.http_timeout).context("building the HTTP client")?;
    let runner = match options.command_timeout {
        Some(limit) => SystemRunner::with_timeout(limit),
        None => SystemRunner::new(),
    };

    Ok(Deployer::new(
        options,
        profile,
        Arc::new(runner),
        Arc::new(http),
        cli.license_source(),
    ))
}

fn print_progress(progress: DeployProgress) {
    if let Some(line) = progress_line(&progress) {
        println!("{line}");
    }
}
