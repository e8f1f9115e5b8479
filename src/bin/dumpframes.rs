//! Dump every frame of a tshark JSON export to stdout.
//!
//! Usage: `dumpframes <file> [max-token-size]`

use std::io::Write;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use sharkjson::{ExportOptions, ExportReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("give the name of the file to read");
    };

    let mut options = ExportOptions::default();
    if let Some(size) = args.next() {
        options.max_token_size =
            size.parse().with_context(|| format!("invalid max token size: {size}"))?;
    }

    let mut reader = ExportReader::open_with(&path, options).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    while reader.advance().await {
        if let Some(frame) = reader.current() {
            writeln!(out, "Got frame:")?;
            frame.dump(&mut out)?;
            writeln!(out)?;
        }
    }

    if let Some(err) = reader.last_error() {
        // Render the whole source chain; the Arc around the latched error
        // keeps it from converting into anyhow::Error directly.
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err.as_ref());
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }
        bail!(message);
    }

    Ok(())
}
