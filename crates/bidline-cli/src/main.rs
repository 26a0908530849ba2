//! Bidline - header-bidding line item setup CLI
//!
//! ## Commands
//!
//! - `buckets`: print the price labels of one span
//! - `expand`: print the per-line-item buckets of a price CSV
//! - `plan`: validate settings, confirm, and run the setup against the
//!   in-memory ad server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use adserver_state::fakes::{MemoryInventoryService, MemoryLineItemService, MemoryTargetingService};
use bidline_core::{
    expand_ranges, load_price_csv, partition, plan_line_items, submit_plan, unique_prefix,
    Granularity, LineItemPlan, PriceBucket, SetupReport, Settings, ValidatedSettings,
    LINE_ITEMS_LIMIT,
};

#[derive(Parser)]
#[command(name = "bidline")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Header-bidding line item setup", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the price labels targeted for one price span
    Buckets {
        #[arg(long)]
        start: f64,

        #[arg(long)]
        end: f64,

        /// Step between buckets; -1 covers the whole span in one bucket
        #[arg(long, allow_hyphen_values = true)]
        granularity: f64,
    },

    /// Print the line item buckets and rates of a price CSV
    Expand {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long, default_value_t = 1.0)]
        exchange_rate: f64,
    },

    /// Validate settings, confirm, and plan the order's line items (dry run)
    Plan {
        /// Settings file (TOML)
        #[arg(short, long)]
        settings: PathBuf,

        /// Price CSV, overriding `bucket_csv` from the settings
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Order id to create line items under
        #[arg(long, default_value_t = 1)]
        order_id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Write the line item descriptors to this file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    bidline_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Buckets {
            start,
            end,
            granularity,
        } => cmd_buckets(start, end, granularity),
        Commands::Expand { csv, exchange_rate } => cmd_expand(&csv, exchange_rate),
        Commands::Plan {
            settings,
            csv,
            order_id,
            yes,
            output,
        } => {
            let stdin = std::io::stdin();
            cmd_plan(
                &settings,
                csv,
                order_id,
                yes,
                output.as_deref(),
                &mut stdin.lock(),
            )
        }
    }
}

/// Print the labels of one span, one per line
fn cmd_buckets(start: f64, end: f64, granularity: f64) -> Result<()> {
    let labels = partition(start, end, Granularity::from_raw(granularity))
        .context("Failed to partition price span")?;
    for label in &labels {
        println!("{}", label);
    }
    println!("{} labels", labels.len());
    Ok(())
}

fn load_buckets(csv: &Path, exchange_rate: f64) -> Result<Vec<PriceBucket>> {
    let ranges =
        load_price_csv(csv).with_context(|| format!("Failed to load price CSV {:?}", csv))?;
    expand_ranges(&ranges, exchange_rate).context("Failed to expand price ranges")
}

/// Print every line item bucket of a price CSV
fn cmd_expand(csv: &Path, exchange_rate: f64) -> Result<()> {
    let buckets = load_buckets(csv, exchange_rate)?;
    println!("{:>10} {:>10} {:>8} {:>8}", "start", "end", "step", "rate");
    for b in &buckets {
        println!(
            "{:>10.2} {:>10.2} {:>8.2} {:>8.3}",
            b.start, b.end, b.granularity, b.rate
        );
    }
    println!("{} line items", buckets.len());
    Ok(())
}

fn or_none<T: std::fmt::Debug>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => "None".to_string(),
    }
}

/// The summary shown before asking for confirmation.
fn render_summary(settings: &ValidatedSettings, buckets: &[PriceBucket]) -> String {
    let rates: Vec<f64> = buckets.iter().map(|b| b.rate).collect();
    let custom: Vec<String> = settings
        .custom_targeting
        .iter()
        .map(|c| format!("{} {} {:?}", c.key, c.operator.as_str(), c.values))
        .collect();
    let placements = if settings.placements.is_empty() {
        "run of network".to_string()
    } else {
        settings.placements.join(", ")
    };
    let prefix = settings.line_item_prefix.as_deref().unwrap_or("(generated)");

    let lines = [
        format!("\nGoing to create {} new line items.", buckets.len()),
        format!("  Order: {}", settings.order_name),
        format!("  Advertiser: {}", settings.advertiser_name),
        format!("  Advertiser Type: {:?}", settings.advertiser_type),
        format!("  LineItem Type: {}", settings.line_item_type.as_str()),
        format!("  LineItem Prefix: {}", prefix),
        "\nLine items will have targeting:".to_string(),
        format!("  rates = {:?}", rates),
        format!("  bidders = {}", settings.bidder_display()),
        format!("  placements = {}", placements),
        format!("  creative type = {}", settings.creative_type),
        format!("  custom targeting = {:?}", custom),
        format!("  same advertiser exception = {}", settings.same_adv_exception),
        format!("  device categories = {}", or_none(&settings.device_categories)),
        format!("  device capabilities = {}", or_none(&settings.device_capabilities)),
        format!("  roadblock type = {:?}", settings.roadblock_type),
    ];
    lines.join("\n") + "\n"
}

/// Ask "Is this correct?"; only a plain `y` confirms.
fn confirm(input: &mut dyn BufRead) -> Result<bool> {
    println!("Is this correct? (y/n)");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim() == "y")
}

/// Plan and submit against the in-memory ad server.
fn dry_run(
    settings: &ValidatedSettings,
    buckets: &[PriceBucket],
    order_id: i64,
) -> Result<(LineItemPlan, SetupReport)> {
    let targeting = MemoryTargetingService::new();
    let inventory = MemoryInventoryService::new().with_placements(&settings.placements);
    let line_items = MemoryLineItemService::new();

    let plan = plan_line_items(settings, buckets, order_id, &targeting, &inventory)
        .context("Failed to plan line items")?;
    let report = submit_plan(&plan, &line_items).context("Failed to create line items")?;
    Ok((plan, report))
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    plan: &'a LineItemPlan,
    report: &'a SetupReport,
}

/// Validate settings, confirm, and dry-run the setup
fn cmd_plan(
    settings_path: &Path,
    csv: Option<PathBuf>,
    order_id: i64,
    yes: bool,
    output: Option<&Path>,
    input: &mut dyn BufRead,
) -> Result<()> {
    let mut raw = Settings::load(settings_path)
        .with_context(|| format!("Failed to load settings {:?}", settings_path))?;
    if let Some(csv) = csv {
        raw = raw.with_bucket_csv(csv);
    }
    let mut settings = raw.validate().context("Invalid settings")?;

    let buckets = load_buckets(&settings.bucket_csv, settings.exchange_rate)?;
    if buckets.len() > LINE_ITEMS_LIMIT {
        anyhow::bail!(
            "{} line items exceed the limit of {} per order; split the price CSV",
            buckets.len(),
            LINE_ITEMS_LIMIT
        );
    }

    // Fix the prefix now so the summary shows the names that will be used.
    if settings.line_item_prefix.is_none() {
        settings.line_item_prefix = Some(unique_prefix(settings.creative_type));
    }

    println!("{}", render_summary(&settings, &buckets));
    if !yes && !confirm(input)? {
        info!("Exiting.");
        return Ok(());
    }

    let (plan, report) = dry_run(&settings, &buckets, order_id)?;

    println!(
        "Created {} line items under order {}",
        report.line_item_ids.len(),
        report.order_id
    );
    println!("Plan digest: {}", report.plan_digest);
    println!(
        "Targeting: {} keys and {} values created, {} cache hits",
        report.resolver_stats.keys_created,
        report.resolver_stats.values_created,
        report.resolver_stats.cache_hits
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&PlanOutput {
            plan: &plan,
            report: &report,
        })?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write plan to {:?}", path))?;
        println!("Wrote plan to {:?}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SETTINGS: &str = r#"
order_name = "Prebid Display"
user_email = "ops@example.com"
advertiser_name = "PubMatic"
line_item_type = "PRICE_PRIORITY"
placements = ["top_leaderboard"]
sizes = [{ width = 728, height = 90 }]
bidder_code = ["pubmatic", "appnexus"]
bucket_csv = "missing.csv"
line_item_prefix = "PM"
"#;

    const PRICES: &str = "order,advertiser,start,end,granularity,rate\nO,A,1.00,3.00,1.00,1\n";

    fn fixtures() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join("settings.toml");
        let csv = dir.path().join("prices.csv");
        std::fs::write(&settings, SETTINGS).unwrap();
        std::fs::write(&csv, PRICES).unwrap();
        (dir, settings, csv)
    }

    #[test]
    fn test_cli_parses_whole_range_granularity() {
        let cli = Cli::try_parse_from([
            "bidline", "buckets", "--start", "1", "--end", "2", "--granularity", "-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Buckets { granularity, .. } => assert_eq!(granularity, -1.0),
            _ => panic!("expected buckets command"),
        }
    }

    #[test]
    fn test_cmd_buckets_rejects_inverted_span() {
        assert!(cmd_buckets(0.5, 0.1, 0.1).is_err());
        assert!(cmd_buckets(0.1, 0.5, 0.1).is_ok());
    }

    #[test]
    fn test_confirm_accepts_only_y() {
        assert!(confirm(&mut Cursor::new("y\n")).unwrap());
        assert!(!confirm(&mut Cursor::new("yes\n")).unwrap());
        assert!(!confirm(&mut Cursor::new("n\n")).unwrap());
        assert!(!confirm(&mut Cursor::new("")).unwrap());
    }

    #[test]
    fn test_summary_lists_rates_and_bidders() {
        let (_dir, settings_path, csv) = fixtures();
        let settings = Settings::load(&settings_path)
            .unwrap()
            .with_bucket_csv(csv.clone())
            .validate()
            .unwrap();
        let buckets = load_buckets(&csv, 1.0).unwrap();
        let summary = render_summary(&settings, &buckets);
        assert!(summary.contains("Going to create 2 new line items."));
        assert!(summary.contains("rates = [1.5, 2.5]"));
        assert!(summary.contains("bidders = pubmatic_appnexus"));
        assert!(summary.contains("placements = top_leaderboard"));
    }

    #[test]
    fn test_cmd_plan_declined_writes_nothing() {
        let (dir, settings_path, csv) = fixtures();
        let output = dir.path().join("plan.json");
        cmd_plan(
            &settings_path,
            Some(csv),
            7,
            false,
            Some(&output),
            &mut Cursor::new("n\n"),
        )
        .unwrap();
        assert!(!output.exists());
    }

    #[test]
    fn test_cmd_plan_writes_descriptors() {
        let (dir, settings_path, csv) = fixtures();
        let output = dir.path().join("plan.json");
        cmd_plan(
            &settings_path,
            Some(csv),
            7,
            true,
            Some(&output),
            &mut Cursor::new(""),
        )
        .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let descriptors = written["plan"]["descriptors"].as_array().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0]["name"], "PM_1.50");
        assert_eq!(descriptors[0]["orderId"], 7);
        assert_eq!(written["report"]["line_item_ids"].as_array().unwrap().len(), 2);
        assert_eq!(written["report"]["plan_digest"], written["plan"]["digest"]);
    }

    #[test]
    fn test_cmd_plan_missing_csv_fails_with_context() {
        let (_dir, settings_path, _csv) = fixtures();
        let err = cmd_plan(&settings_path, None, 1, true, None, &mut Cursor::new("")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load price CSV"));
    }
}
