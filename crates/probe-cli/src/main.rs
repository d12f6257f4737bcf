//! probec - command-line probe compiler
//!
//! Compiles probe sources in memory, verifies them against the restricted
//! policy unless `--trusted` is given, and writes one artifact per type
//! below the output directory.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use probe_compiler::{
    Compiler, CompilerConfig, CompilerOptions, MessageCatalog, RestrictedPolicy, RuleTable,
    Verifier,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::{write_artifacts, Report, ReportFormat};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

/// probec CLI
#[derive(Parser, Debug)]
#[command(name = "probec")]
#[command(about = "Compile probe sources with safety verification", long_about = None)]
#[command(version)]
struct Cli {
    /// Class path for compiled dependencies
    #[arg(long = "classpath", visible_alias = "cp", default_value = ".")]
    classpath: String,

    /// Output directory
    #[arg(short = 'd', default_value = ".")]
    output_dir: PathBuf,

    /// Include path for preprocessing
    #[arg(short = 'I')]
    include_path: Option<String>,

    /// Skip the safety verifier
    #[arg(long, visible_alias = "unsafe")]
    trusted: bool,

    /// Write plain artifacts instead of packs
    #[arg(long)]
    nopack: bool,

    /// Extension of written packs
    #[arg(long)]
    packext: Option<String>,

    /// Configuration file path
    #[arg(long, env = "PROBEC_CONFIG")]
    config: Option<String>,

    /// YAML rule table replacing the baseline policy
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Print a report of written artifacts
    #[arg(long, value_enum)]
    report: Option<ReportFormat>,

    /// Log level
    #[arg(long, env = "PROBEC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PROBEC_LOG_JSON")]
    log_json: bool,

    /// Source files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// Accept the single-dash long options of the classic compiler
/// (`-cp`, `-classpath`, `-nopack`, `-packext`, `-trusted`, `-unsafe`).
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    const LEGACY: [&str; 6] = ["-cp", "-classpath", "-nopack", "-packext", "-trusted", "-unsafe"];
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if LEGACY.contains(&s) => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn usage(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("probec: {message}");
    ExitCode::from(EXIT_USAGE)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let config = match CompilerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return usage(format_args!("invalid configuration: {e}")),
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, cli.log_json || config.logging.json);

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("probec: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: Cli, config: CompilerConfig) -> anyhow::Result<ExitCode> {
    if cli.nopack && cli.packext.is_some() {
        return Ok(usage(
            "Can not specify pack extension if not using packs (--nopack)",
        ));
    }
    if let Some(missing) = cli.files.iter().find(|f| !f.exists()) {
        return Ok(usage(format_args!("File not found: {}", missing.display())));
    }

    let options = CompilerOptions {
        include_path: cli.include_path.clone().or(config.include_path.clone()),
        generate_pack: config.generate_pack && !cli.nopack,
        pack_extension: cli.packext.clone().unwrap_or(config.pack_extension.clone()),
    };
    debug!(?options, "Compiler options");

    let mut compiler = Compiler::new(options);
    let verifier = if cli.trusted || !config.verify {
        info!("Verifier disabled");
        None
    } else {
        let policy: Arc<dyn RestrictedPolicy> = match cli.policy.as_ref().or(config.policy.as_ref()) {
            Some(path) => Arc::new(RuleTable::load(path)?),
            None => Arc::new(RuleTable::baseline()),
        };
        let messages = match &config.messages {
            Some(path) => MessageCatalog::load(path)?,
            None => MessageCatalog::builtin(),
        };
        let verifier = Arc::new(Verifier::new(policy, Arc::new(messages)));
        compiler = compiler.with_plugin(verifier.clone());
        Some(verifier)
    };

    let mut stderr = io::stderr().lock();
    let artifacts = compiler
        .compile_files(&cli.files, &mut stderr, Some("."), Some(&cli.classpath))
        .context("compilation aborted")?;
    drop(stderr);

    let verified_classes = verifier.map(|v| v.class_names()).unwrap_or_default();
    let (success, written) = match artifacts {
        Some(artifacts) => {
            let written =
                write_artifacts(&artifacts, &cli.output_dir, compiler.pack_extension())?;
            info!(artifacts = written.len(), out = %cli.output_dir.display(), "Artifacts written");
            (true, written)
        }
        None => (false, Vec::new()),
    };

    if let Some(format) = cli.report {
        let report = Report {
            success,
            artifacts: written,
            verified_classes,
        };
        report.print(format, &mut io::stdout().lock())?;
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(normalize_args(args.iter().map(OsString::from)))
    }

    #[test]
    fn test_legacy_single_dash_options() {
        let cli = parse(&["probec", "-cp", "lib", "-nopack", "-unsafe", "A.probe"]).unwrap();
        assert_eq!(cli.classpath, "lib");
        assert!(cli.nopack);
        assert!(cli.trusted);
        assert_eq!(cli.files, vec![PathBuf::from("A.probe")]);

        let cli = parse(&["probec", "-classpath", "x", "-packext", "btrace", "A.probe"]).unwrap();
        assert_eq!(cli.classpath, "x");
        assert_eq!(cli.packext.as_deref(), Some("btrace"));
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["probec", "A.probe", "B.probe"]).unwrap();
        assert_eq!(cli.classpath, ".");
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(!cli.trusted);
        assert!(cli.report.is_none());
        assert_eq!(cli.files.len(), 2);
    }

    #[test]
    fn test_short_options() {
        let cli = parse(&["probec", "-d", "out", "-I", "inc", "--report", "json", "A.probe"]).unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert_eq!(cli.include_path.as_deref(), Some("inc"));
        assert_eq!(cli.report, Some(ReportFormat::Json));
    }

    #[test]
    fn test_usage_errors() {
        assert!(parse(&["probec"]).is_err());
        assert!(parse(&["probec", "-d", "a", "-d", "b", "A.probe"]).is_err());
        assert!(parse(&["probec", "--report", "xml", "A.probe"]).is_err());
    }

    #[test]
    fn test_non_option_arguments_are_untouched() {
        let args = normalize_args(["probec", "-cp", "-nopack.probe"].map(OsString::from));
        assert_eq!(args, ["probec", "--cp", "-nopack.probe"].map(OsString::from));
    }
}
