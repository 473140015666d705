use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use quickplay::scanner::{ScanSessionController, ScriptedCamera};
use quickplay::{ConfigError, HomeScreen, QuickPlayConfig, ScreenAction, ScreenState, ScreenView};

const DEFAULT_CONFIG_PATH: &str = "quickplay.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);

    match matches.subcommand() {
        Some(("scan", sub_m)) => {
            let config = load_config(config_path.as_deref())?;
            init_logging(&config);
            let frames = sub_m
                .get_one::<String>("frames")
                .context("--frames is required")?;
            run_scan(&config, Path::new(frames)).await?;
        }
        Some(("resolve", sub_m)) => {
            let config = load_config(config_path.as_deref())?;
            init_logging(&config);
            let payload = sub_m
                .get_one::<String>("payload")
                .context("payload is required")?;
            run_resolve(&config, payload).await?;
        }
        // Never loads the configuration: these commands must work on a broken file.
        Some(("config", sub_m)) => {
            init_logging(&QuickPlayConfig::default());
            run_config(sub_m, config_path.as_deref())?;
        }
        _ => {
            build_cli().print_help()?;
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    Command::new("quickplay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scan a QR code or barcode and play the video it points to")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (defaults to ./quickplay.toml when present)"),
        )
        .subcommand(
            Command::new("scan")
                .about("Open the home screen and scan a scripted camera feed")
                .long_about(
                    "Run the home screen against a camera that replays decoded frames from \
                     a JSON file. Type s to scan, c to close the camera, o to acknowledge \
                     an alert, d to dismiss the player and q to quit.",
                )
                .arg(
                    Arg::new("frames")
                        .short('f')
                        .long("frames")
                        .value_name("FILE")
                        .required(true)
                        .help("JSON array of decoded frames"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Check whether a payload resolves to playable media")
                .arg(
                    Arg::new("payload")
                        .value_name("PAYLOAD")
                        .required(true)
                        .help("Scanned code value"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand_required(true)
                .subcommand(Command::new("sample").about("Print a sample configuration"))
                .subcommand(
                    Command::new("init")
                        .about("Write the default configuration to --config or ./quickplay.toml")
                        .arg(
                            Arg::new("force")
                                .long("force")
                                .action(ArgAction::SetTrue)
                                .help("Overwrite an existing file"),
                        ),
                )
                .subcommand(
                    Command::new("validate")
                        .about("Validate a configuration file")
                        .arg(
                            Arg::new("path")
                                .value_name("PATH")
                                .help("File to validate (defaults to --config or ./quickplay.toml)"),
                        ),
                ),
        )
}

fn init_logging(config: &QuickPlayConfig) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();
}

fn load_config(path: Option<&Path>) -> Result<QuickPlayConfig> {
    match path {
        Some(path) => QuickPlayConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            QuickPlayConfig::load_from_file(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("failed to load configuration from {}", DEFAULT_CONFIG_PATH))
        }
        None => Ok(QuickPlayConfig::default()),
    }
}

async fn run_scan(config: &QuickPlayConfig, frames: &Path) -> Result<()> {
    let script = std::fs::read_to_string(frames)
        .with_context(|| format!("failed to read frames from {}", frames.display()))?;
    let camera = ScriptedCamera::from_json(&script, config.frame_interval())
        .with_context(|| format!("invalid frame script {}", frames.display()))?;

    let controller =
        ScanSessionController::with_symbologies(Box::new(camera), config.symbologies());
    let mut screen = HomeScreen::new(controller, config.playback_handoff());

    let mut views = screen.subscribe();
    render(&views.borrow_and_update());
    let renderer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            render(&view);
        }
    });

    let (actions_tx, actions_rx) = mpsc::unbounded_channel();
    actions_tx.send(ScreenAction::ScanPressed)?;
    spawn_input_reader(actions_tx);

    screen.run(actions_rx).await;
    drop(screen);
    renderer.await?;
    Ok(())
}

/// Stdin is read on a plain thread so that quitting never waits for a
/// pending line.
fn spawn_input_reader(actions: mpsc::UnboundedSender<ScreenAction>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let action = match line.trim() {
                "s" => ScreenAction::ScanPressed,
                "c" => ScreenAction::ClosePressed,
                "o" => ScreenAction::AlertAcknowledged,
                "d" => ScreenAction::PlayerDismissed,
                "q" => return,
                "" => continue,
                other => {
                    println!("Unknown input '{}' (s, c, o, d, q)", other);
                    continue;
                }
            };
            if actions.send(action).is_err() {
                return;
            }
        }
        // Input closed; keep the screen up until the process is interrupted.
        loop {
            std::thread::park();
        }
    });
}

fn render(view: &ScreenView) {
    match &view.state {
        ScreenState::Idle => {
            if let Some(label) = view.primary_action {
                println!("[{}] {}", view.title, label);
            }
        }
        ScreenState::Scanning => println!("[{}] scanning - close: c", view.title),
        ScreenState::Resolving => match view.overlay {
            Some(bounds) => println!(
                "[{}] resolving code at {:.0},{:.0} {:.0}x{:.0}...",
                view.title, bounds.x, bounds.y, bounds.width, bounds.height
            ),
            None => println!("[{}] resolving scanned code...", view.title),
        },
        ScreenState::Playing { url } => match &view.now_playing {
            Some(_) => println!("[{}] playing {} - dismiss: d", view.title, url),
            None => println!("[{}] opening player for {}...", view.title, url),
        },
        ScreenState::Alert(alert) => {
            println!("[{}] {}: {} ({}: o)", view.title, alert.title, alert.message, alert.action)
        }
    }
}

async fn run_resolve(config: &QuickPlayConfig, payload: &str) -> Result<()> {
    let handoff = config.playback_handoff();
    match handoff.resolve(payload).await {
        Ok(request) => {
            let seconds = request.duration.map(|d| d.as_secs_f64()).unwrap_or_default();
            println!("{} is playable ({:.1}s)", request.source_url, seconds);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", e),
    }
}

fn run_config(matches: &ArgMatches, config_path: Option<&Path>) -> Result<()> {
    let default_path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
    match matches.subcommand() {
        Some(("sample", _)) => {
            println!("{}", QuickPlayConfig::generate_sample());
        }
        Some(("init", sub_m)) => {
            match QuickPlayConfig::write_default(default_path, sub_m.get_flag("force")) {
                Err(ConfigError::AlreadyExists(path)) => anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ),
                result => result?,
            }
            println!("Wrote {}", default_path.display());
        }
        Some(("validate", sub_m)) => {
            let path = sub_m
                .get_one::<String>("path")
                .map(Path::new)
                .unwrap_or(default_path);
            QuickPlayConfig::load_from_file(path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!("{} is valid", path.display());
        }
        _ => {}
    }
    Ok(())
}
