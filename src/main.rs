//! DevNest - local development stack manager.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use devnest::config::AppConfig;
use devnest::lifecycle::ServiceManager;
use devnest::settings::SettingsManager;
use devnest::vhost::VirtualHostManager;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

const DEFAULT_CONFIG: &str = "devnest.toml";

type BoxError = Box<dyn std::error::Error>;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);
    let command = positional_args(&args);
    if command.is_empty() {
        print_help();
        return ExitCode::FAILURE;
    }

    let config = match AppConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Stack root: {}", config.paths.root.display());

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(async_main(config, command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Async main function.
async fn async_main(config: AppConfig, command: Vec<String>) -> Result<(), BoxError> {
    let settings = Arc::new(SettingsManager::from_config(&config));
    let model = settings.load(false).await;

    let words: Vec<&str> = command.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["services"] => {
            let manager = ServiceManager::new(Arc::clone(&settings), config.timings.stop_grace());
            manager.refresh_services().await;
            print_services(&manager);
        }
        ["catalog"] => {
            for def in settings.catalog().await {
                println!(
                    "{:<12} {:<16} {}",
                    def.service_type.as_str(),
                    def.name,
                    def.url
                );
            }
        }
        ["settings"] => {
            println!("{}", serde_json::to_string_pretty(&model.without_transient())?);
        }
        ["start", name] => {
            let manager = Arc::new(ServiceManager::new(
                Arc::clone(&settings),
                config.timings.stop_grace(),
            ));
            manager.refresh_services().await;
            for failure in settings.regenerate_configs(&model).await {
                warn!(error = %failure, "Configuration generation failed");
            }
            if !manager.toggle(name).await? {
                return Err(format!("{} could not be started", name).into());
            }
            println!("{} started, press Ctrl+C to stop", name);
            shutdown_signal().await;
            manager.stop_all().await;
        }
        ["vhost", "add", site] => {
            VirtualHostManager::new(Arc::clone(&settings))
                .create_virtual_host(site)
                .await?;
            println!("Virtual host {} created", devnest::vhost::site_domain(site));
        }
        ["vhost", "remove", site] => {
            VirtualHostManager::new(Arc::clone(&settings))
                .remove_virtual_host(site)
                .await?;
            println!("Virtual host {} removed", devnest::vhost::site_domain(site));
        }
        ["run"] => run(config, settings).await?,
        _ => {
            print_help();
            return Err(format!("unknown command: {}", command.join(" ")).into());
        }
    }

    Ok(())
}

/// Supervise the stack until Ctrl+C, reading console commands from stdin.
async fn run(config: AppConfig, settings: Arc<SettingsManager>) -> Result<(), BoxError> {
    let auto_save = settings.start_auto_save();
    let manager = Arc::new(ServiceManager::new(
        Arc::clone(&settings),
        config.timings.stop_grace(),
    ));

    manager.refresh_services().await;
    let mode_follower = manager.follow_mode_changes();
    let failures = settings.regenerate_configs(&settings.store().snapshot()).await;
    if !failures.is_empty() {
        warn!(count = failures.len(), "Some configuration files could not be generated");
    }

    if settings.store().read().general.auto_virtual_hosts {
        let vhosts = VirtualHostManager::new(Arc::clone(&settings));
        match vhosts.regenerate_all().await {
            Ok(count) => info!(count = count, "Virtual hosts ready"),
            Err(e) => warn!(error = %e, "Virtual host generation failed"),
        }
    }

    let started = manager.start_autostart().await;
    info!(started = ?started, "Auto-start complete");
    println!("DevNest running. Commands: status, start <name>, stop <name>, toggle <name>, wsl on|off, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // stdin closed; keep supervising until a signal arrives.
                        shutdown_signal().await;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read console input");
                        shutdown_signal().await;
                        break;
                    }
                };
                if !console_command(&manager, &settings, line.trim()).await {
                    break;
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    mode_follower.abort();
    let stopped = manager.stop_all().await;
    info!(count = stopped.len(), "Services stopped");

    if let Err(e) = settings.save_current().await {
        error!(error = %e, "Final settings save failed");
    }
    settings.store().unsubscribe();
    let _ = auto_save.await;

    info!("DevNest stopped");
    Ok(())
}

/// Handle one console line. Returns false to quit.
async fn console_command(
    manager: &Arc<ServiceManager>,
    settings: &Arc<SettingsManager>,
    line: &str,
) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    let outcome = match words.as_slice() {
        [] => return true,
        ["quit"] | ["exit"] => return false,
        ["status"] => {
            manager.refresh_status().await;
            print_services(manager);
            return true;
        }
        ["refresh"] => {
            manager.refresh_services().await;
            print_services(manager);
            return true;
        }
        ["start", name] => match manager.resolve(name) {
            Ok(key) => manager.start(&key).await,
            Err(e) => Err(e),
        },
        ["stop", name] => match manager.resolve(name) {
            Ok(key) => manager.stop(&key).await,
            Err(e) => Err(e),
        },
        ["toggle", name] => manager.toggle(name).await,
        ["wsl", flag @ ("on" | "off")] => {
            settings.store().set_use_wsl(*flag == "on");
            println!("Execution mode change requested");
            return true;
        }
        _ => {
            println!("Unknown command: {}", line);
            return true;
        }
    };

    match outcome {
        Ok(true) => println!("ok"),
        Ok(false) => println!("nothing to do"),
        Err(e) => println!("error: {}", e),
    }
    true
}

fn print_services(manager: &ServiceManager) {
    for instance in manager.services() {
        let marker = if instance.is_selected { "*" } else { " " };
        let command = instance
            .command
            .as_ref()
            .map(|c| c.command_line())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:<24} {:<9} {}",
            marker, instance.key(), instance.status, command
        );
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Local development stack manager.

USAGE:
    {} [OPTIONS] <COMMAND>

COMMANDS:
    services               List installed service versions and their commands
    catalog                List installable packages from services.ini
    settings               Print the persisted settings as JSON
    start <name>           Start one service and supervise it until Ctrl+C
    vhost add <site>       Create the vhost and hosts entry for a site
    vhost remove <site>    Remove the vhost and hosts entry for a site
    run                    Start auto-start services and supervise the stack;
                           reads status/start/stop/toggle/wsl/quit from stdin

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG
    );
}

/// Get configuration file path from command line arguments.
fn get_config_path(args: &[String]) -> String {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG.to_string()
}

/// Arguments that are neither options nor option values.
fn positional_args(args: &[String]) -> Vec<String> {
    let mut positional = Vec::new();
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--config" || arg == "-c" {
            skip_next = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        positional.push(arg.clone());
    }
    positional
}

/// Initialize logging based on configuration.
fn init_logging(config: &AppConfig) -> Result<(), BoxError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
