use clap::Parser;
use mnvx::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{generate_bed, merge_mnvs},
    utils::util::{handle_error_and_exit, Result},
};
use std::time;

#[allow(unused_imports)]
use mnvx::utils::util_intern::readable_size;

#[cfg(any(target_os = "macos", target_os = "linux"))]
use mnvx::utils::util_intern::peak_memory_usage;

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    log::trace!("CLI options set: {:?}", cli);

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        &**FULL_VERSION,
        cli.command.name()
    );

    let start_timer = time::Instant::now();
    match cli.command {
        Command::GenerateBed(args) => {
            log::trace!("Generate-bed arguments: {:#?}", args);
            generate_bed(args)?
        }
        Command::MergeMnvs(args) => {
            log::trace!("Merge-mnvs arguments: {:#?}", args);
            merge_mnvs(args)?
        }
    }
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());

    #[cfg(any(target_os = "macos", target_os = "linux"))]
    {
        let (size, unit) = readable_size(peak_memory_usage()?);
        log::info!("Peak memory use: {:.2} {}", size, unit);
    }

    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
