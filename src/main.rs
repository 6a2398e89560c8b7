use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use book_pipeline::clients::{HttpConversionClient, HttpObjectStore};
use book_pipeline::config::{load_config, FilterConfig, PipelineConfig};
use book_pipeline::filters::{
    Cleaner, Decryptor, Downloader, Mover, RequestMonitor, Requester, Uploader,
};
use book_pipeline::ledger::BookLedger;
use book_pipeline::orchestrator::Orchestrator;
use book_pipeline::pipeline::{FilterDriver, MonitorDriver, Pipeline};
use book_pipeline::staging::{Secretary, Stager, TokenBag};

fn usage(program: &str) {
    eprintln!("Usage: {program} <command> --config <file> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  orchestrate                     run all configured filters until interrupted");
    eprintln!("  run-stage --name <filter>       run one filter in the foreground");
    eprintln!("  choose --count <n>              choose books from the ledger into the bag");
    eprintln!("  choose --barcode <b>            choose one specific book");
    eprintln!("  stage --bucket <name>           pour the bag into a pipeline bucket");
    eprintln!("  status                          report bucket and ledger counts");
    eprintln!("  complete --barcode <b>          mark a book completed in the ledger");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    let command = args[1].clone();
    let mut config_path: Option<PathBuf> = None;
    let mut name: Option<String> = None;
    let mut barcode: Option<String> = None;
    let mut bucket: Option<String> = None;
    let mut count: Option<usize> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--name" => {
                name = Some(args[i + 1].clone());
                i += 2;
            }
            "--barcode" => {
                barcode = Some(args[i + 1].clone());
                i += 2;
            }
            "--bucket" => {
                bucket = Some(args[i + 1].clone());
                i += 2;
            }
            "--count" => {
                count = Some(args[i + 1].parse().context("--count must be a number")?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let config_path = match config_path.or_else(|| std::env::var("PIPELINE_CONFIG").ok().map(PathBuf::from)) {
        Some(path) => path,
        None => {
            usage(&args[0]);
            bail!("--config (or PIPELINE_CONFIG) is required");
        }
    };
    let config = load_config(&config_path)?;

    match command.as_str() {
        "orchestrate" => {
            let mut orchestrator = Orchestrator::new(config, &config_path);
            orchestrator.run().await
        }
        "run-stage" => {
            let name = name.context("run-stage requires --name")?;
            run_stage(&config, &name).await
        }
        "choose" => {
            let mut secretary = open_secretary(&config)?;
            match (barcode, count) {
                (Some(barcode), None) => {
                    secretary.choose_book(&barcode)?;
                    tracing::info!("chose {barcode}");
                }
                (None, Some(count)) => {
                    let chosen = secretary.choose_books(count)?;
                    for barcode in &chosen {
                        println!("{barcode}");
                    }
                }
                _ => bail!("choose requires exactly one of --barcode or --count"),
            }
            secretary.commit()
        }
        "stage" => {
            let secretary = open_secretary(&config)?;
            let pipeline = Pipeline::from_config(&config);
            let entry = match bucket.as_deref() {
                Some(name) => pipeline.bucket(name)?,
                None => {
                    let first = config
                        .buckets
                        .first()
                        .context("no buckets configured")?;
                    pipeline.bucket(&first.name)?
                }
            };
            let mut stager = Stager::new(secretary, entry, &config.global.processing_bucket);
            let poured = stager.stage(true)?;
            println!("staged {poured} tokens");
            Ok(())
        }
        "status" => {
            let pipeline = Pipeline::from_config(&config);
            for (name, counts) in pipeline.snapshot()? {
                println!(
                    "{name}: {} waiting, {} in process, {} errored",
                    counts.waiting, counts.in_process, counts.errored
                );
            }
            let ledger = BookLedger::load(&config.global.ledger_file)?;
            println!(
                "ledger: {} unprocessed, {} chosen, {} completed",
                ledger.all_unprocessed().len(),
                ledger.all_chosen().len(),
                ledger.all_completed().len()
            );
            Ok(())
        }
        "complete" => {
            let barcode = barcode.context("complete requires --barcode")?;
            let mut secretary = open_secretary(&config)?;
            secretary.mark_book_completed(&barcode)?;
            secretary.commit()
        }
        other => {
            usage(&args[0]);
            bail!("unknown command '{other}'")
        }
    }
}

fn open_secretary(config: &PipelineConfig) -> Result<Secretary> {
    let ledger = BookLedger::load(&config.global.ledger_file)?;
    let bag = TokenBag::load(&config.global.token_bag)?;
    Ok(Secretary::new(ledger, bag))
}

/// Runs one configured filter in the foreground until killed.
async fn run_stage(config: &PipelineConfig, name: &str) -> Result<()> {
    let filter: &FilterConfig = config
        .filters
        .iter()
        .find(|f| f.name == name)
        .with_context(|| format!("no filter named '{name}' in configuration"))?;

    let pipeline = Pipeline::from_config(config);
    let pipe = pipeline.pipe(&filter.pipe.input, &filter.pipe.output)?;
    let poll_interval = Duration::from_secs(config.global.poll_interval_secs);

    tracing::info!("running filter '{}' as stage '{}'", filter.name, filter.stage);

    match filter.stage.as_str() {
        "mover" => {
            FilterDriver::new(pipe, Mover).run_forever(poll_interval).await;
        }
        "requester" => {
            let client = HttpConversionClient::new(&config.global.conversion_service_url);
            FilterDriver::new(pipe, Requester::new(client))
                .run_forever(poll_interval)
                .await;
        }
        "request-monitor" => {
            let client = HttpConversionClient::new(&config.global.conversion_service_url);
            MonitorDriver::new(pipe, RequestMonitor::new(client))
                .run_forever(poll_interval)
                .await;
        }
        "downloader" => {
            let client = HttpConversionClient::new(&config.global.conversion_service_url);
            FilterDriver::new(pipe, Downloader::new(client))
                .run_forever(poll_interval)
                .await;
        }
        "decryptor" => {
            let passphrase = std::env::var("DECRYPTION_PASSPHRASE")
                .context("DECRYPTION_PASSPHRASE not set in environment")?;
            FilterDriver::new(pipe, Decryptor::new(passphrase))
                .run_forever(poll_interval)
                .await;
        }
        "uploader" => {
            let store = HttpObjectStore::new(&config.global.object_store_url);
            FilterDriver::new(pipe, Uploader::new(store))
                .run_forever(poll_interval)
                .await;
        }
        "cleaner" => {
            FilterDriver::new(pipe, Cleaner::new(&config.global.finished_bucket))
                .run_forever(poll_interval)
                .await;
        }
        other => bail!("unknown stage kind '{other}'"),
    }

    Ok(())
}
