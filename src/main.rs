mod args;

use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use emu::Session;
use emu::config::Config;
use emu::cpu::hardware::lcd::{Framebuffer, LCD_HEIGHT, LCD_WIDTH};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::args::Args;

const DEFAULT_LOG_FILTER: &str = "emu=info,gbahle=info";

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = init_logging(args.log_file.as_deref());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("gbahle: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs to stderr and, when `log_file` is given, to that file as well. The
/// returned guard flushes the file writer when dropped.
fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file.map(fs::File::create) {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Some(Err(err)) => {
            eprintln!("cannot create log file: {err}");
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_slice::<Config>(&read(path)?)?,
        None => Config::default(),
    };
    if let Some(bios) = &args.bios {
        config.bios_path = Some(bios.clone());
    }

    let mut session = Session::with_config(read(&args.rom)?, config)?;

    if let Some(path) = &args.load_state {
        session.restore_state(&read(path)?)?;
    }

    for button in &args.held_buttons {
        session.set_key(*button, true);
    }

    for _ in 0..args.frames {
        session.run_frame();
    }

    tracing::info!(
        "ran {} frames, {} instructions",
        args.frames,
        session.cpu().executed_instructions()
    );

    if let Some(path) = &args.screenshot {
        write_ppm(path, session.framebuffer())?;
        tracing::info!("screenshot written to {}", path.display());
    }

    if let Some(path) = &args.save_state {
        fs::write(path, session.save_state()?)
            .map_err(|err| format!("cannot write {}: {err}", path.display()))?;
    }

    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|err| format!("cannot read {}: {err}", path.display()))
}

/// Binary PPM (P6), 8 bits per channel.
fn write_ppm(path: &Path, frame: &Framebuffer) -> Result<(), Box<dyn Error>> {
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    write!(file, "P6\n{LCD_WIDTH} {LCD_HEIGHT}\n255\n")?;
    file.write_all(&frame.to_rgb_bytes())?;
    file.flush()?;

    Ok(())
}
