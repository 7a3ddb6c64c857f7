//! Headless analysis runner: same pipeline as the web page, no server.

use clap::Parser;
use std::path::PathBuf;

use insight_lens::config::Config;
use insight_lens::corpus;
use insight_lens::insights::{InsightRequester, create_completion_client};
use insight_lens::sections::{SECTION_KEYS, parse_sections, render_sections};

#[derive(Parser, Debug)]
#[command(name = "analyze", about = "Analyze a feedback CSV from the command line")]
struct Args {
    /// Path to a CSV file with a 'feedback' column
    csv: PathBuf,

    /// Print the raw model output instead of parsed sections
    #[arg(long)]
    raw: bool,

    /// Emit the full analysis as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    insight_lens::load_env();
    let args = Args::parse();

    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LENS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("insight_lens=warn")),
        )
        .with_ansi(false)
        .init();

    let data = std::fs::read_to_string(&args.csv)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", args.csv.display(), e))?;
    let batch = corpus::parse_feedback_csv(&data, config.runtime.preview_rows)?;
    eprintln!("Analyzing {} feedback records...", batch.record_count);

    let client = create_completion_client(&config)?;
    let requester = InsightRequester::from_config(&config, client);
    let insight = requester.request(&corpus::build_corpus(&batch.feedback)).await;

    if args.json {
        let parsed = parse_sections(&insight.text, &SECTION_KEYS);
        let sections: Vec<_> = SECTION_KEYS
            .iter()
            .map(|key| {
                serde_json::json!({
                    "key": key,
                    "body": parsed.get(*key).cloned().unwrap_or_default(),
                })
            })
            .collect();
        let out = serde_json::json!({
            "record_count": batch.record_count,
            "model_used": insight.model_used,
            "fallback_used": insight.fallback_used,
            "sections": sections,
            "raw": insight.text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if args.raw {
        println!("{}", insight.text);
        return Ok(());
    }

    let parsed = parse_sections(&insight.text, &SECTION_KEYS);
    let any_body = SECTION_KEYS
        .iter()
        .any(|key| parsed.get(*key).is_some_and(|b| !b.trim().is_empty()));
    if any_body {
        println!("{}", render_sections(&parsed, &SECTION_KEYS));
    } else {
        // No recognized headings (or a notice message): show as-is.
        println!("{}", insight.text);
    }

    if let Some(model) = &insight.model_used {
        eprintln!(
            "(model: {}{})",
            model,
            if insight.fallback_used { ", fallback used" } else { "" }
        );
    }
    Ok(())
}
