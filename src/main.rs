use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use locale_sync::diff::{MissingReport, missing_report, shape_status, structural_status};
use locale_sync::mt::{FailurePolicy, LibreTranslateProvider, MachineTranslator, MockMode, MockTranslator};
use locale_sync::{
    ConcurrencyScheduler, JsonDirStore, KeyTree, LanguageSynchronizer, LocaleStore, SyncConfig,
    SyncError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("locale-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fill missing keys in JSON locale files with machine translation")
        .subcommand(
            Command::new("sync").about("Translate missing keys and write the locale files (default)"),
        )
        .subcommand(Command::new("missing").about("List keys each language is missing"))
        .subcommand(
            Command::new("outdated")
                .about("Compare each language with the source locale")
                .arg(
                    Arg::new("shape-only")
                        .long("shape-only")
                        .help("Compare key structure only, ignoring values")
                        .action(ArgAction::SetTrue),
                ),
        )
        .arg(
            Arg::new("locale-dir")
                .long("locale-dir")
                .short('d')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding <lang>.json files [env: LOCALE_DIR]"),
        )
        .arg(
            Arg::new("source")
                .long("source")
                .short('s')
                .global(true)
                .help("Source language code [env: SOURCE_LANG]"),
        )
        .arg(
            Arg::new("languages")
                .long("languages")
                .short('l')
                .global(true)
                .help("Comma separated target languages [env: LANGUAGES]"),
        )
        .arg(
            Arg::new("cache-file")
                .long("cache-file")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Translation cache file [env: CACHE_FILE]"),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .global(true)
                .help("LibreTranslate translate endpoint [env: LT_URL]"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .global(true)
                .help("LibreTranslate API key [env: LT_API_KEY]"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .short('c')
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Languages translated at the same time [env: CONCURRENCY]"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Phrases per request [env: BATCH_SIZE]"),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Attempts per request [env: RETRIES]"),
        )
        .arg(
            Arg::new("keep-source")
                .long("keep-source")
                .global(true)
                .help("Fill untranslatable keys with the source text instead of failing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .global(true)
                .help("Dry run with the mock translator; nothing is written")
                .action(ArgAction::SetTrue),
        )
}

/// Environment first, then whatever the command line sets
fn load_config(matches: &ArgMatches) -> Result<SyncConfig, SyncError> {
    let mut config = SyncConfig::from_env()?;

    if let Some(dir) = matches.get_one::<PathBuf>("locale-dir") {
        config.locale_dir = dir.clone();
    }
    if let Some(source) = matches.get_one::<String>("source") {
        config.source_lang = source.trim().to_string();
    }
    if let Some(languages) = matches.get_one::<String>("languages") {
        config.target_langs = SyncConfig::parse_languages(languages);
    }
    if let Some(cache_file) = matches.get_one::<PathBuf>("cache-file") {
        config.cache_file = cache_file.clone();
    }
    if let Some(url) = matches.get_one::<String>("url") {
        config.backend_url = url.trim().to_string();
    }
    if let Some(key) = matches.get_one::<String>("api-key") {
        config.api_key = Some(key.clone());
    }
    if let Some(&concurrency) = matches.get_one::<usize>("concurrency") {
        config.concurrency = concurrency;
    }
    if let Some(&batch_size) = matches.get_one::<usize>("batch-size") {
        config.batch_size = batch_size;
    }
    if let Some(&retries) = matches.get_one::<usize>("retries") {
        config.retries = retries;
    }
    if matches.get_flag("keep-source") {
        config.on_failure = FailurePolicy::KeepSource;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match matches.subcommand() {
        Some(("missing", _)) => report_missing(&config),
        Some(("outdated", sub)) => report_outdated(&config, sub.get_flag("shape-only")),
        _ => run_sync(&config, matches.get_flag("mock")).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_sync(config: &SyncConfig, use_mock: bool) -> Result<ExitCode, SyncError> {
    let provider: Arc<dyn MachineTranslator> = if use_mock {
        Arc::new(MockTranslator::new(MockMode::Suffix))
    } else {
        let provider = LibreTranslateProvider::with_options(
            &config.backend_url,
            config.api_key.clone(),
            config.request_timeout,
        )
        .map_err(|e| SyncError::Config(e.to_string()))?;
        provider.prewarm().await;
        Arc::new(provider)
    };

    info!(
        "Syncing {} from {} via {}",
        config.target_langs.join(", "),
        config.source_lang,
        provider.provider_name()
    );

    let synchronizer = if use_mock {
        info!("Mock run: locale files and the translation cache are left untouched");
        LanguageSynchronizer::dry_run(config, provider)
    } else {
        LanguageSynchronizer::from_config(config, provider)
    };
    let report = ConcurrencyScheduler::new(synchronizer)
        .run(&config.target_langs, config.concurrency)
        .await?;

    for result in &report.results {
        match &result.outcome {
            Ok(stats) if stats.missing == 0 => println!("{}: up to date", result.lang),
            Ok(stats) => println!(
                "{}: {} filled ({} cached, {} translated, {} copied, {} kept source, {} unresolved, {} conflicts)",
                result.lang,
                stats.filled(),
                stats.cached,
                stats.translated,
                stats.copied,
                stats.kept_source,
                stats.unresolved,
                stats.conflicts
            ),
            Err(e) => println!("{}: failed: {}", result.lang, e),
        }
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} language(s) failed", report.failures().count());
        Ok(ExitCode::FAILURE)
    }
}

/// Source tree plus the target languages to inspect, source language excluded
fn diagnostic_inputs(config: &SyncConfig) -> Result<(JsonDirStore, KeyTree, Vec<&str>), SyncError> {
    let store = JsonDirStore::new(&config.locale_dir);
    let source = store
        .load(&config.source_lang)?
        .ok_or_else(|| SyncError::SourceMissing(store.location(&config.source_lang)))?;
    let targets = config
        .target_langs
        .iter()
        .map(String::as_str)
        .filter(|lang| *lang != config.source_lang)
        .collect();
    Ok((store, source, targets))
}

fn report_missing(config: &SyncConfig) -> Result<ExitCode, SyncError> {
    let (store, source, targets) = diagnostic_inputs(config)?;

    for lang in targets {
        let target = match store.load(lang) {
            Ok(target) => target,
            Err(e) => {
                println!("{}: unreadable: {}", lang, e);
                continue;
            }
        };
        match missing_report(&source, target.as_ref()) {
            MissingReport::Complete => println!("{}: complete", lang),
            MissingReport::MissingFile => println!("{}: missing file", lang),
            MissingReport::Missing(keys) => {
                println!("{}: {} missing", lang, keys.len());
                for key in keys {
                    println!("  - {}", key);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_outdated(config: &SyncConfig, shape_only: bool) -> Result<ExitCode, SyncError> {
    let (store, source, targets) = diagnostic_inputs(config)?;

    for lang in targets {
        let target = match store.load(lang) {
            Ok(target) => target,
            Err(e) => {
                println!("{}: unreadable: {}", lang, e);
                continue;
            }
        };
        let status = if shape_only {
            shape_status(&source, target.as_ref())
        } else {
            structural_status(&source, target.as_ref())
        };
        println!("{}: {}", lang, status);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_environment() {
        let matches = cli()
            .try_get_matches_from([
                "locale-sync",
                "--languages",
                "de, it",
                "--batch-size",
                "10",
                "--keep-source",
                "sync",
            ])
            .unwrap();
        assert_eq!(matches.get_one::<String>("languages").map(String::as_str), Some("de, it"));
        assert_eq!(matches.get_one::<usize>("batch-size"), Some(&10));
        assert!(matches.get_flag("keep-source"));
        assert_eq!(matches.subcommand_name(), Some("sync"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["locale-sync", "outdated", "--shape-only", "--source", "fr"])
            .unwrap();
        let Some(("outdated", sub)) = matches.subcommand() else {
            panic!("Expected outdated subcommand");
        };
        assert!(sub.get_flag("shape-only"));
        assert_eq!(sub.get_one::<String>("source").map(String::as_str), Some("fr"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
