use anyhow::{Context, Result};
use std::io::Write;
use tracing_subscriber::EnvFilter;

use enhanced_statusline::cli::{Args, StatuslineConfig};
use enhanced_statusline::diagnostics::{TerminalEnv, token_self_check};
use enhanced_statusline::statusline::{StatusAssembler, run_detached};
use enhanced_statusline::utils::read_stdin;

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("enhanced_statusline=debug")
    } else {
        EnvFilter::try_from_env("STATUSLINE_LOG").unwrap_or_else(|_| EnvFilter::new("off"))
    };
    // stdout belongs to the host UI
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse_lenient();
    setup_logging(args.debug);

    if args.test {
        println!("{}", token_self_check());
        return Ok(());
    }
    if args.debug_env {
        println!("{}", serde_json::to_string_pretty(&TerminalEnv::capture())?);
        return Ok(());
    }

    let config = StatuslineConfig::from_args(&args);
    let stdin = read_stdin().unwrap_or_else(|err| {
        tracing::warn!("stdin unreadable: {}", err);
        Vec::new()
    });

    run_detached(async {
        let assembler = StatusAssembler::from_config(&config);
        let rendered = assembler.render(&stdin).await;

        let mut out = std::io::stdout().lock();
        for line in &rendered.lines {
            if let Err(err) = writeln!(out, "{line}") {
                tracing::debug!("stdout closed: {}", err);
                return;
            }
        }
        let _ = out.flush();
        drop(out);

        tracing::debug!(
            mode = ?rendered.mode,
            pending = rendered.pending_jobs(),
            "status emitted"
        );
        rendered.finish_background(config.deadlines.background_grace).await;
    })
    .context("build tokio runtime")?;

    Ok(())
}
