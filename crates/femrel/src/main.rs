use clap::Parser;
use femrel::{Args, init_logging, run};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level, args.log_file.as_deref())?;

    let stdout = std::io::stdout();
    run(&args, &mut stdout.lock())?;

    tracing::debug!("femrel finished");
    Ok(())
}
