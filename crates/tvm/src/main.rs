//! tvm binary entry point

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::io;
use tvm::cli::{self, EXIT_OK, exit_code_for, render_error};
use tvm::commands;
use tvm::tracing::{TracingConfig, init_tracing};

fn main() {
    // Tracing may be unusable while panicking, so write straight to stderr.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format,
        level: cli.log_level().into(),
        filter: None,
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    std::process::exit(run_with_tokio(cli));
}

fn run_with_tokio(cli: cli::Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async {
        let mut stdout = io::stdout();
        match commands::run(cli, &mut stdout).await {
            Ok(()) => EXIT_OK,
            Err(e) => {
                render_error(&e);
                exit_code_for(&e)
            }
        }
    })
}
