//! Send JSON messages to a running waysome daemon and print the replies.
//!
//! Messages come from the command line (one per argument) or, with no
//! arguments, from standard input.  The socket is `$WAYSOME_SOCKET`, or
//! `$XDG_RUNTIME_DIR/waysome.sock`.
//!
//! ```text
//! waysome-msg '{"UID":1,"TYPE":"transaction","FLAGS":["EXEC"],"CMDS":[{"push":[1,2]},{"push":[1,3]},{"add":[]}]}'
//! {"UID":1,"VALUE":{"int":5}}
//! ```

use log::{debug, error};
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

fn socket_path() -> PathBuf {
    if let Some(path) = std::env::var_os("WAYSOME_SOCKET") {
        return path.into();
    }
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(runtime).join("waysome.sock")
}

fn run() -> std::io::Result<usize> {
    let path = socket_path();
    debug!("connecting to {}", path.display());
    let mut stream = UnixStream::connect(&path)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        let mut input = Vec::new();
        std::io::stdin().read_to_end(&mut input)?;
        stream.write_all(&input)?;
    } else {
        for message in &args {
            writeln!(stream, "{}", message)?;
        }
    }
    stream.shutdown(std::net::Shutdown::Write)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut errors = 0;
    for line in BufReader::new(stream).lines() {
        let line = line?;
        let failed = serde_json::from_str::<serde_json::Value>(&line)
            .map(|reply| reply.get("ERROR").is_some())
            .unwrap_or(true);
        if failed {
            errors += 1;
        }
        writeln!(out, "{}", line)?;
    }
    Ok(errors)
}

fn main() {
    env_logger::init();
    match run() {
        Ok(0) => {}
        Ok(n) => {
            debug!("{} message(s) failed", n);
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}: {}", socket_path().display(), e);
            std::process::exit(2);
        }
    }
}
