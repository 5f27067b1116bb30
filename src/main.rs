//! Entry point for the **waysome** daemon.
//!
//! Spawns the Unix-socket listener on a background thread and runs the
//! engine on the main thread until a transaction calls `exit` or every
//! message source is gone.

use log::{error, info};
use std::path::PathBuf;
use std::sync::mpsc;
use waysome::config::Config;
use waysome::engine::Engine;
use waysome::ipc::listener::UnixSocketListener;
use waysome::traits::{MessageSource, Request};

/// `$XDG_RUNTIME_DIR`, or `/tmp` outside a session.
fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| "/tmp".into())
        .into()
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/waysome`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("waysome")
}

/// Try to load the config from `$XDG_CONFIG_HOME/waysome/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

fn main() {
    env_logger::init();

    let config = load_config();
    let mut engine = match Engine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let socket = config.socket_path(&runtime_dir());
    let (tx, rx) = mpsc::channel::<Request>();
    spawn_message_sources(socket.clone(), tx);

    engine.serve(rx);

    if let Err(e) = std::fs::remove_file(&socket) {
        info!("could not remove {}: {}", socket.display(), e);
    }
    info!("waysome exiting");
}

fn spawn_message_sources(socket: PathBuf, tx: mpsc::Sender<Request>) {
    std::thread::spawn(move || {
        let mut source = UnixSocketListener::new(&socket);
        if let Err(e) = source.run(tx) {
            error!("socket listener error: {}", e);
        }
    });
}
