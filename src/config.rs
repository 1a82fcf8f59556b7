//! Server configuration and default locations.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How long an invocation waits for the client's standard input by default.
pub const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// SQLite database for action data; in-memory when absent.
    pub db_path: Option<PathBuf>,
    pub input_timeout: Duration,
}

impl ServerConfig {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            db_path: None,
            input_timeout: DEFAULT_INPUT_TIMEOUT,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

/// `$XDG_RUNTIME_DIR/clipserve.sock`, or a per-user socket in the temp directory.
pub fn default_socket_path() -> PathBuf {
    match env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("clipserve.sock"),
        _ => {
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            env::temp_dir().join(format!("clipserve-{uid}.sock"))
        }
    }
}
