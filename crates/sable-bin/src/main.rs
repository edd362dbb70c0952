//! sable entrypoint: a command-line driver for the editing core. Loads
//! an optional file into a buffer, reads edit commands from stdin, and
//! writes print/where output to stdout.

use std::fs::File;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use core_edit::{Editor, parse_edit};
use core_runes::Buffer;

mod config;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "sable", version, about = "Structural text editor core driver")]
struct Args {
    /// Optional UTF-8 file loaded into the buffer at startup.
    pub path: Option<std::path::PathBuf>,
    /// Optional configuration file path (overrides discovery of `sable.toml`).
    #[arg(long = "config")]
    pub config: Option<std::path::PathBuf>,
    /// Write the final buffer contents to stdout before exiting.
    #[arg(long = "dump")]
    pub dump: bool,
}

fn main() -> Result<()> {
    // File logging to sable.log; stdout stays clean for command output.
    let file_appender = tracing_appender::rolling::never(".", "sable.log");
    let (nb_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .init();

    info!(target: "runtime", "startup");

    let args = Args::parse();
    let cfg = config::load_from(args.config.clone())?;

    let mut ed = Editor::with_buffer(Buffer::new(cfg.effective_block_size()));
    if let Some(path) = &args.path {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let n = ed
            .load(io::BufReader::new(f), 0)
            .with_context(|| format!("load {}", path.display()))?;
        info!(target: "io", file = %path.display(), runes = n, "file loaded");
    }

    let mut script = String::new();
    io::stdin()
        .read_to_string(&mut script)
        .context("read stdin")?;
    run_script(&mut ed, &script)?;

    if args.dump {
        let contents = ed.contents()?;
        io::stdout().write_all(contents.as_bytes())?;
    }
    ed.close()?;
    info!(target: "runtime", "shutdown");
    Ok(())
}

/// Apply a script of edit commands. Each command's output is written to
/// stdout, newline-terminated; a failed command is reported on stderr
/// and the rest of the script continues, as an interactive shell would.
fn run_script(ed: &mut Editor, script: &str) -> Result<()> {
    let mut rest = script;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }
        match parse_edit(rest) {
            Ok((edit, tail)) => {
                rest = tail;
                let mut out = Vec::new();
                match ed.apply(&edit, &mut out) {
                    Ok(()) => {
                        debug!(target: "edit.apply", edit = %edit, bytes = out.len(), "applied");
                        if !out.is_empty() {
                            if *out.last().expect("non-empty") != b'\n' {
                                out.push(b'\n');
                            }
                            io::stdout().write_all(&out)?;
                        }
                    }
                    Err(e) => {
                        error!(target: "edit.apply", edit = %edit, error = %e, "edit failed");
                        eprintln!("?{e}");
                    }
                }
            }
            Err(e) => {
                error!(target: "edit.apply", error = %e, "parse failed");
                eprintln!("?{e}");
                // Skip the offending line and resume with the next.
                rest = match rest.find('\n') {
                    Some(i) => &rest[i + 1..],
                    None => "",
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runes::MemStore;

    fn editor() -> Editor {
        Editor::with_buffer(Buffer::with_store(16, MemStore::new()))
    }

    #[test]
    fn script_applies_in_order() {
        let mut ed = editor();
        run_script(&mut ed, "a/hello/\n,s/hello/world/\n").unwrap();
        assert_eq!(ed.contents().unwrap(), "world");
    }

    #[test]
    fn multi_line_body_spans_lines() {
        let mut ed = editor();
        run_script(&mut ed, "0,$c\nalpha\nbeta\n.\n").unwrap();
        assert_eq!(ed.contents().unwrap(), "alpha\nbeta\n");
    }

    #[test]
    fn failed_command_does_not_stop_the_script() {
        let mut ed = editor();
        run_script(&mut ed, "a/abc/\n#9d\n,s/abc/xyz/\n").unwrap();
        assert_eq!(ed.contents().unwrap(), "xyz");
    }
}
