use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::info;
use simplelog::*;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use handheld_input::osdev::{EvdevSource, UinputOutput};
use handheld_input::powerbutton::{SteamHost, Watchdog};
use handheld_input::uinput::VirtualDevice;
use handheld_input::{daemon, default_cfg, product_name};
use handheld_input_parser::cfg::{self, Cfg};

#[derive(Parser, Debug)]
#[command(author, version, verbatim_doc_comment)]
/// handheld-input: power button and virtual gamepad daemon for handheld PCs
///
/// While Steam runs in game mode, the power button is taken over and its
/// presses are forwarded to Steam as short and long presses. Optionally a
/// virtual gamepad is created whose rumble requests are reported.
struct Args {
    /// Configuration file to use. If not specified, defaults to
    /// handheld-input.toml in the current working directory and
    /// '$XDG_CONFIG_HOME/handheld-input/config.toml'. Built-in defaults are
    /// used when neither exists.
    #[arg(short, long, verbatim_doc_comment)]
    cfg: Option<PathBuf>,

    /// DMI product name to look up in the power button table instead of the
    /// one reported by the firmware.
    #[arg(long, verbatim_doc_comment)]
    device: Option<String>,

    /// Create the virtual gamepad as well.
    #[arg(long)]
    virtual_gamepad: bool,

    /// List the input devices with their physical paths and exit.
    #[arg(short, long)]
    list: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging; implies --debug as well.
    #[arg(short, long)]
    trace: bool,

    /// Validate configuration file and exit
    #[arg(long, verbatim_doc_comment)]
    check: bool,
}

struct ValidatedArgs {
    cfg: Cfg,
    product: Option<String>,
    virtual_gamepad: bool,
}

fn list_devices() {
    println!("Available input devices:");
    println!("========================");
    let devices = EvdevSource::list();
    if devices.is_empty() {
        println!("No input devices found. Are you running as root or in the `input` group?");
        return;
    }
    for (path, device) in devices.iter() {
        println!("  \"{}\"", device.name().unwrap_or("Unknown"));
        println!("     phys: {}", device.physical_path().unwrap_or("-"));
        println!("     path: {}", path.display());
        println!();
    }
}

/// Parse CLI arguments and initialize logging.
fn cli_init() -> Result<ValidatedArgs> {
    let args = Args::parse();

    let log_lvl = match (args.debug, args.trace) {
        (_, true) => LevelFilter::Trace,
        (true, false) => LevelFilter::Debug,
        (false, false) => LevelFilter::Info,
    };

    let mut log_cfg = ConfigBuilder::new();
    if let Err(e) = log_cfg.set_time_offset_to_local() {
        eprintln!("WARNING: could not set log TZ to local: {e:?}");
    };
    log_cfg.set_time_format_rfc3339();
    CombinedLogger::init(vec![TermLogger::new(
        log_lvl,
        log_cfg.build(),
        TerminalMode::Mixed,
        ColorChoice::AlwaysAnsi,
    )])
    .expect("logger can init");
    log::info!("handheld-input v{} starting", env!("CARGO_PKG_VERSION"));

    if args.list {
        list_devices();
        std::process::exit(0);
    }

    let cfg_path = args.cfg.or_else(|| default_cfg().into_iter().next());
    let cfg = match &cfg_path {
        Some(path) => {
            if !path.exists() {
                bail!(
                    "Could not find the config file ({})\nFor more info, pass the `-h` or `--help` flags.",
                    path.display()
                )
            }
            log::info!("Using config {}", path.display());
            cfg::new_from_file(path)
        }
        None => {
            log::info!("No config file found, using built-in defaults");
            Ok(Cfg::default())
        }
    };

    if args.check {
        log::info!("validating config only and exiting");
        let status = match cfg {
            Ok(_) => 0,
            Err(e) => {
                log::error!("{e:?}");
                1
            }
        };
        std::process::exit(status);
    }

    let cfg = match cfg {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e:?}");
            bail!("failed to parse file");
        }
    };

    Ok(ValidatedArgs {
        cfg,
        product: args.device.or_else(product_name),
        virtual_gamepad: args.virtual_gamepad,
    })
}

fn main_impl() -> Result<()> {
    let args = cli_init()?;
    let cfg = args.cfg;

    let cancel = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, cancel.clone())
            .with_context(|| format!("failed to register handler for signal {sig}"))?;
    }

    let power_button = match &args.product {
        Some(product) => {
            info!("Device: '{product}'");
            cfg.power_button_for(product).cloned()
        }
        None => None,
    };
    if power_button.is_none() {
        log::warn!("No power button configured for this device");
        if !args.virtual_gamepad {
            bail!("nothing to do: no power button for this device and --virtual-gamepad not given");
        }
    }

    let watchdog = match power_button {
        Some(pb) => {
            let host = SteamHost::from_cfg(&cfg.host);
            let timing = cfg.timing;
            let cancel = cancel.clone();
            let handle = std::thread::Builder::new()
                .name("powerbutton".into())
                .spawn(move || Watchdog::new(pb, timing, EvdevSource, host, cancel).run())
                .context("failed to spawn the power button thread")?;
            Some(handle)
        }
        None => None,
    };

    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    if args.virtual_gamepad {
        let mut dev: VirtualDevice<UinputOutput> = VirtualDevice::new(cfg.gamepad.clone());
        let tick = cfg.timing.gate_poll.max(Duration::from_millis(100));
        if let Err(e) = daemon::run_virtual_gamepad(&mut dev, tick, &cancel, daemon::log_event) {
            log::error!("Virtual gamepad disabled: {e:#}");
        }
    }

    if let Some(handle) = watchdog {
        handle
            .join()
            .map_err(|_| anyhow!("power button thread panicked"))??;
    }

    Ok(())
}

fn main() -> Result<()> {
    let ret = main_impl();
    if let Err(ref e) = ret {
        log::error!("{e}\n");
    }
    ret
}
