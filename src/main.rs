use certificado::output::{diagnostic, emit_stdout};
use certificado::{CertificateRenderer, Cli, Invocation, Result};
use clap::Parser;
use log::info;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", diagnostic(&e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for the document
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let invocation = Invocation::decode(&cli.inputs)?;
    info!(
        "Assets: {}, template: {}",
        cli.assets.display(),
        cli.template
    );

    let renderer = CertificateRenderer::from_assets(&cli.assets, &cli.template)?;
    let result = renderer.render(&invocation.request)?;
    emit_stdout(&result)?;

    Ok(())
}
