use clap::{Arg, ArgAction, Command};
use inbox_triage::classifier::ClassificationMap;
use inbox_triage::gmail::{GmailClient, MessageFormat};
use inbox_triage::server::run_server;
use inbox_triage::{
    BatchFetcher, BodyExtractor, ClassificationOrchestrator, Config, ContentDecoder, InboxState,
    MessageNormalizer,
};
use log::LevelFilter;
use std::path::Path;
use std::process;
use std::sync::Arc;

const TOKEN_ENV: &str = "INBOX_TRIAGE_TOKEN";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[tokio::main]
async fn main() {
    let matches = Command::new("inbox-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Normalise a mail inbox and classify messages with a language model")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("inbox-triage.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and print a summary")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Run the HTTP API")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fetch")
                .long("fetch")
                .help("List and normalise messages once, printing JSON")
                .action(ArgAction::SetTrue)
                .conflicts_with("serve"),
        )
        .arg(
            Arg::new("max-results")
                .short('n')
                .long("max-results")
                .value_name("N")
                .help("Number of messages to list (clamped to the configured cap)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .help("Mail provider bearer token (defaults to $INBOX_TRIAGE_TOKEN)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("classify")
                .long("classify")
                .help("Classify fetched messages")
                .action(ArgAction::SetTrue)
                .requires("fetch"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .value_name("KEY")
                .help("Language model API key (defaults to $OPENAI_API_KEY)")
                .action(ArgAction::Set),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("inbox-triage.yaml");

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_found = Path::new(config_path).exists();
    let config = if config_found {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e:#}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config
            .logging
            .as_ref()
            .and_then(|l| l.level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let result = if matches.get_flag("fetch") {
        let token = matches
            .get_one::<String>("token")
            .cloned()
            .or_else(|| std::env::var(TOKEN_ENV).ok());
        let api_key = if matches.get_flag("classify") {
            matches
                .get_one::<String>("api-key")
                .cloned()
                .or_else(|| std::env::var(API_KEY_ENV).ok())
                .or(Some(String::new()))
        } else {
            None
        };
        match token {
            Some(token) => {
                let max_results = matches.get_one::<String>("max-results").map(String::as_str);
                fetch_once(&config, &token, max_results, api_key.as_deref()).await
            }
            None => {
                eprintln!("A mail bearer token is required: pass --token or set {TOKEN_ENV}");
                process::exit(2);
            }
        }
    } else if matches.get_flag("serve") {
        run_server(config).await
    } else {
        eprintln!("Nothing to do: pass --serve or --fetch (see --help)");
        process::exit(2);
    };

    if let Err(e) = result {
        log::error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("Testing configuration...");
    match config.validate() {
        Ok(()) => {
            println!("Bind address: {}", config.server.bind_address);
            println!("Mail API: {}", config.mail.api_base);
            println!(
                "Result cap: default {}, max {}",
                config.mail.default_max_results, config.mail.max_results_cap
            );
            println!(
                "Model: {} at {} ({:?} schema)",
                config.classifier.model, config.classifier.api_base, config.classifier.schema
            );
            println!(
                "Limits: {} encoded chars, {} output chars, {} preview chars, {} detail chars",
                config.limits.max_encoded_length,
                config.limits.safe_output_chars,
                config.limits.preview_chars,
                config.limits.detail_output_chars
            );
            println!("✅ Configuration is valid");
        }
        Err(e) => {
            println!("❌ Configuration validation failed:");
            println!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// One listing pass from the command line. `api_key` is `Some` when
/// classification was requested.
async fn fetch_once(
    config: &Config,
    token: &str,
    max_results: Option<&str>,
    api_key: Option<&str>,
) -> anyhow::Result<()> {
    let gmail = GmailClient::new(&config.mail)?;
    let normalizer = Arc::new(MessageNormalizer::new(
        BodyExtractor::new(ContentDecoder::new(config.limits.decode_limits())),
        config.limits.preview_chars,
    ));
    let fetcher = BatchFetcher::new(normalizer);

    let mut inbox = InboxState::new();
    let fetch = inbox.begin_fetch();
    let ids = gmail
        .list_message_ids(token, config.mail.clamp_max_results(max_results))
        .await?;
    let records = fetcher
        .fetch_from_gmail(&gmail, token, &ids, MessageFormat::Full)
        .await;
    inbox.complete_fetch(fetch, records);
    log::info!("Fetched {} of {} messages", inbox.records().len(), ids.len());

    if let Some(api_key) = api_key {
        let orchestrator = ClassificationOrchestrator::new(&config.classifier)?;
        let mut classifications = ClassificationMap::new();
        let report = orchestrator
            .classify_into(inbox.records(), api_key, &mut classifications)
            .await?;
        if !report.discarded.is_empty() {
            log::warn!(
                "{} classification(s) referred to unknown messages",
                report.discarded.len()
            );
        }
        let attached = inbox.apply_classifications(&classifications);
        log::info!("Classified {attached} of {} messages", inbox.records().len());
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "emails": inbox.records() }))?
    );
    Ok(())
}
