use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{LevelFilter, error, info, warn};
use tandem_emu_core::debug::LogSink;
use tandem_emu_core::platform::DirectoryPlatform;
use tandem_emu_core::system::CPU_FREQUENCY;
use tandem_emu_core::{R65c02, System};

mod config;

#[derive(Parser)]
#[command(name = "tandem-emu", version, about = "Run a cartridge on the reference machine")]
struct Args {
    /// Directory holding manifest.toml and the cartridge's backing files
    dir: PathBuf,

    /// Boot image overlaid on the low ROM window until 0xFF50 is written
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Stop after this many CPU turns
    #[arg(long, conflicts_with = "seconds")]
    instructions: Option<u64>,

    /// Stop after this many emulated seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Log every executed instruction at trace level
    #[arg(long)]
    trace: bool,

    /// Only trace instructions in START:END (hex physical addresses)
    #[arg(long, value_parser = parse_range)]
    trace_range: Option<RangeInclusive<u32>>,

    /// Log every serviced interrupt at trace level
    #[arg(long)]
    trace_interrupts: bool,

    /// Do not write non-volatile memory back on exit
    #[arg(long)]
    no_save: bool,

    /// Restore this save state after power-on
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a save state here when the run ends
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Runner settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raise the default log level to debug
    #[arg(short, long)]
    verbose: bool,
}

fn parse_range(text: &str) -> Result<RangeInclusive<u32>, String> {
    let (start, end) = text
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{text}'"))?;
    let parse = |s: &str| {
        u32::from_str_radix(s.trim_start_matches("0x"), 16)
            .map_err(|e| format!("bad address '{s}': {e}"))
    };
    Ok(parse(start)?..=parse(end)?)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    } else if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
    }
    if args.trace || args.trace_interrupts {
        logger.filter_module("tandem::cpu", LevelFilter::Trace);
    }
    logger.init();

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let mut platform = DirectoryPlatform::new();
    let path = platform.register(&args.dir);

    let mut system = match System::load(&mut platform, path, R65c02::new()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load cartridge from {}: {e}", args.dir.display());
            return ExitCode::FAILURE;
        }
    };

    if let Some(boot) = args.boot_rom.as_ref().or(cfg.boot_rom.as_ref()) {
        match std::fs::read(boot) {
            Ok(data) => system.attach_boot_rom(data),
            Err(e) => warn!("Failed to load boot ROM {}: {e}", boot.display()),
        }
    }

    let trace = args.trace || cfg.trace;
    let trace_interrupts = args.trace_interrupts || cfg.trace_interrupts;
    if trace || trace_interrupts {
        let debugger = system.debugger_mut();
        debugger.attach(Box::new(LogSink));
        debugger.set_instruction_enabled(trace);
        debugger.set_interrupt_enabled(trace_interrupts);
        debugger.set_address_filter(
            args.trace_range
                .clone()
                .or(cfg.trace_range.map(|[start, end]| start..=end)),
        );
    }

    system.power();

    if let Some(state) = &args.load_state {
        let restored = std::fs::read(state)
            .map_err(|e| e.to_string())
            .and_then(|data| system.unserialize(&data).map_err(|e| e.to_string()));
        if let Err(e) = restored {
            error!("Failed to restore {}: {e}", state.display());
            return ExitCode::FAILURE;
        }
        info!("Restored state from {}", state.display());
    }

    match args.instructions {
        Some(limit) => {
            for _ in 0..limit {
                system.run_instruction();
            }
        }
        None => {
            let seconds = args.seconds.unwrap_or(cfg.seconds);
            system.run(seconds * CPU_FREQUENCY as u64);
        }
    }

    let clocks = system.scheduler().time(system.cpu_domain())
        / system.scheduler().thread(system.cpu_domain()).scalar();
    println!(
        "instructions: {}  interrupts: {}  clocks: {}  frames: {}",
        system.cpu.instructions,
        system.cpu.interrupts_taken,
        clocks,
        system.video().frames
    );

    if let Some(state) = &args.save_state {
        if let Err(e) = std::fs::write(state, system.serialize()) {
            error!("Failed to write {}: {e}", state.display());
            return ExitCode::FAILURE;
        }
        info!("Wrote state to {}", state.display());
    }

    if args.no_save || !cfg.save_on_exit {
        info!("Skipping save");
        return ExitCode::SUCCESS;
    }
    if let Err(e) = system.save(&mut platform) {
        error!("Failed to save cartridge memory: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ranges_parse_as_hex() {
        assert_eq!(parse_range("0x4000:7fff"), Ok(0x4000..=0x7FFF));
        assert!(parse_range("4000").is_err());
        assert!(parse_range("zz:10").is_err());
    }

    #[test]
    fn args_accept_a_cartridge_directory() {
        let args = Args::try_parse_from(["tandem-emu", "game", "--instructions", "10", "--no-save"])
            .unwrap();
        assert_eq!(args.dir, PathBuf::from("game"));
        assert_eq!(args.instructions, Some(10));
        assert!(args.no_save);
        assert!(args.save_state.is_none());

        let args =
            Args::try_parse_from(["tandem-emu", "game", "--save-state", "a.tss", "--load-state", "b.tss"])
                .unwrap();
        assert_eq!(args.save_state, Some(PathBuf::from("a.tss")));
        assert_eq!(args.load_state, Some(PathBuf::from("b.tss")));
        assert!(
            Args::try_parse_from(["tandem-emu", "game", "--instructions", "1", "--seconds", "1"])
                .is_err()
        );
    }
}
