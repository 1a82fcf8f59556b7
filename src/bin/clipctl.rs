use std::ffi::OsString;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clipserve::{Message, StatusCode, default_socket_path, init_logging, run_command};

#[derive(Parser, Debug)]
#[command(name = "clipctl", about = "Run a command on the clipserve server")]
struct Args {
    /// Server socket
    #[arg(long, env = "CLIPSERVE_SOCKET", value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Action the command runs for
    #[arg(long = "action-id", env = "CLIPSERVE_ACTION_ID", value_name = "ID")]
    action_id: Option<i64>,

    /// Name of that action
    #[arg(long = "action-name", env = "CLIPSERVE_ACTION_NAME", value_name = "NAME")]
    action_name: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Command chain; `-` reads standard input, `--` passes every later token verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<OsString>,
}

/// Options that take a value, as `--opt VALUE` or `--opt=VALUE`.
const VALUE_OPTIONS: [&str; 4] = ["--socket", "--action-id", "--action-name", "--log-level"];

/// Split argv into the options clap parses and the command tail, which is sent untouched.
///
/// The tail starts at the first token that is not a known option, so a leading `--` or `-`
/// reaches the server instead of being consumed as an end-of-options marker.
fn split_command(argv: Vec<OsString>) -> (Vec<OsString>, Vec<OsString>) {
    let mut argv = argv.into_iter();
    let mut options: Vec<OsString> = argv.next().into_iter().collect();
    while let Some(arg) = argv.next() {
        let text = arg.to_str().unwrap_or_default();
        if VALUE_OPTIONS.contains(&text) {
            options.push(arg);
            options.extend(argv.next());
        } else if text == "-h"
            || text == "--help"
            || VALUE_OPTIONS
                .iter()
                .any(|opt| text.strip_prefix(opt).is_some_and(|rest| rest.starts_with('=')))
        {
            options.push(arg);
        } else {
            let mut command = vec![arg];
            command.extend(argv);
            return (options, command);
        }
    }
    (options, Vec::new())
}

fn parse_args<I>(argv: I) -> Args
where
    I: IntoIterator<Item = OsString>,
{
    let (options, command) = split_command(argv.into_iter().collect());
    let mut args = Args::parse_from(options);
    args.command = command;
    args
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let args = parse_args(std::env::args_os());
    init_logging(&args.log_level, false);

    let socket = args.socket.unwrap_or_else(default_socket_path);
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let rest = args
        .command
        .iter()
        .map(|arg| arg.as_bytes().to_vec())
        .collect();
    let message = Message::new(
        std::process::id(),
        &cwd.to_string_lossy(),
        args.action_id,
        args.action_name.as_deref(),
        rest,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let response = runtime.block_on(async {
        let mut stdin = tokio::io::stdin();
        run_command(&socket, &message, &mut stdin).await
    })?;

    if response.status == StatusCode::Finished {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&response.payload)?;
        stdout.flush()?;
    } else {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(&response.payload)?;
        if !response.payload.is_empty() && !response.payload.ends_with(b"\n") {
            stderr.write_all(b"\n")?;
        }
    }
    Ok(response.status.code())
}
