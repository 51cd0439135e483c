//! CLI command definitions, routing, and tracing setup.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docketrace_core::{
    BatchDataClient, JobRegistry, JobScheduler, RegionEnrichmentResult, RegionPipeline,
    SkipTracer,
};
use docketrace_crawler::CaseExtractor;
use docketrace_regions::RegionRegistry;
use docketrace_shared::{AppConfig, Environment, JobStatus, init_config, load_config};
use docketrace_storage::{CaseReport, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// How often `batch` polls job state while the progress bar is shown.
const BATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docketrace: foreclosure case scraping and skip-trace enrichment.
#[derive(Parser)]
#[command(
    name = "docketrace",
    version,
    about = "Scrape foreclosure cases by region and enrich defendants with phone numbers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Record store database (overrides `defaults.db_path`).
    #[arg(long, global = true, env = "DOCKETRACE_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Inspect the region registry.
    Regions {
        #[command(subcommand)]
        action: RegionsAction,
    },

    /// Split a free-text address into street, city, state and postal code.
    Normalize {
        /// Address text, e.g. "12 Oak St, Durham CT 06422".
        text: String,

        /// City used when the text does not carry one.
        #[arg(long, default_value = "")]
        hint: String,
    },

    /// Scrape one region and store the cases not seen before.
    Scrape {
        /// Region name (case-insensitive).
        region: String,
    },

    /// Look up phone numbers for stored defendants.
    Enrich {
        #[command(subcommand)]
        action: EnrichAction,
    },

    /// Show lookup costs from the ledger.
    Costs {
        /// Restrict to one environment (sandbox or production).
        #[arg(long)]
        env: Option<Environment>,

        /// Restrict to the cases of one region (case-insensitive).
        #[arg(long)]
        region: Option<String>,
    },

    /// Show a stored case with its defendants and phones per environment.
    Report {
        docket: String,
    },

    /// Show how many of a region's cases are traced.
    Stats {
        /// Region name (case-insensitive).
        region: String,

        /// Environment to report on (defaults to `defaults.environment`).
        #[arg(long)]
        env: Option<Environment>,
    },

    /// Scrape many regions as background jobs and wait for them.
    Batch {
        /// Parent area to include (repeatable). Defaults to every region.
        #[arg(long)]
        area: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Region subcommands.
#[derive(Subcommand)]
pub(crate) enum RegionsAction {
    /// List known regions grouped by parent area.
    List {
        /// Only this parent area.
        #[arg(long)]
        area: Option<String>,
    },
    /// Check a region name and print its canonical form.
    Check {
        name: String,
    },
}

/// Enrichment subcommands.
#[derive(Subcommand)]
pub(crate) enum EnrichAction {
    /// Enrich one case by docket number.
    Case {
        docket: String,

        #[arg(long)]
        env: Option<Environment>,

        /// Look up again even if the case is already traced.
        #[arg(long)]
        force: bool,
    },
    /// Enrich every stored case in a region.
    Region {
        region: String,

        #[arg(long)]
        env: Option<Environment>,

        /// Process at most this many cases.
        #[arg(long)]
        limit: Option<usize>,

        /// Look up again even if a case is already traced.
        #[arg(long)]
        force: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docketrace=info",
        1 => "docketrace=debug",
        _ => "docketrace=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        };
    }

    let app = App::new(load_config()?, cli.db);

    match cli.command {
        Command::Regions { action } => match action {
            RegionsAction::List { area } => cmd_regions_list(&app, area.as_deref()).await,
            RegionsAction::Check { name } => cmd_regions_check(&app, &name).await,
        },
        Command::Normalize { text, hint } => cmd_normalize(&text, &hint),
        Command::Scrape { region } => cmd_scrape(&app, &region).await,
        Command::Enrich { action } => match action {
            EnrichAction::Case { docket, env, force } => {
                cmd_enrich_case(&app, &docket, app.environment(env), force).await
            }
            EnrichAction::Region {
                region,
                env,
                limit,
                force,
            } => cmd_enrich_region(&app, &region, app.environment(env), limit, force).await,
        },
        Command::Costs { env, region } => cmd_costs(&app, env, region.as_deref()).await,
        Command::Report { docket } => cmd_report(&app, &docket).await,
        Command::Stats { region, env } => cmd_stats(&app, &region, app.environment(env)).await,
        Command::Batch { area } => cmd_batch(&app, &area).await,
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Resolved configuration plus constructors for the long-lived components.
struct App {
    config: AppConfig,
    db_path: PathBuf,
}

impl App {
    fn new(config: AppConfig, db: Option<PathBuf>) -> Self {
        let db_path = db.unwrap_or_else(|| PathBuf::from(&config.defaults.db_path));
        Self { config, db_path }
    }

    fn environment(&self, flag: Option<Environment>) -> Environment {
        flag.unwrap_or(self.config.defaults.environment)
    }

    async fn storage(&self) -> Result<Arc<Storage>> {
        info!(path = %self.db_path.display(), "opening record store");
        Ok(Arc::new(Storage::open(&self.db_path).await?))
    }

    async fn regions(&self) -> Arc<RegionRegistry> {
        Arc::new(RegionRegistry::load(&self.config.regions).await)
    }

    fn tracer(&self, storage: Arc<Storage>, regions: Arc<RegionRegistry>) -> Result<SkipTracer> {
        let lookup = BatchDataClient::from_config(&self.config.lookup)?;
        Ok(SkipTracer::new(storage, Arc::new(lookup), regions))
    }

    fn pipeline(&self, storage: Arc<Storage>, regions: Arc<RegionRegistry>) -> Result<RegionPipeline> {
        let extractor = CaseExtractor::with_webdriver(&self.config.search)?;
        let pipeline = RegionPipeline::new(extractor, storage.clone());
        if !self.config.scheduler.enrich_after_scrape {
            return Ok(pipeline);
        }
        let tracer = Arc::new(self.tracer(storage, regions)?);
        Ok(pipeline.with_enrichment(tracer, self.config.scheduler.enrich_environment))
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_regions_list(app: &App, area: Option<&str>) -> Result<()> {
    let registry = app.regions().await;

    let areas = match area {
        Some(a) => vec![a.to_string()],
        None => registry.parent_areas(),
    };

    let mut listed = 0;
    for area in &areas {
        let regions = registry.regions_in_area(area);
        if regions.is_empty() {
            continue;
        }
        listed += regions.len();
        let names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        println!("{} ({})", regions[0].parent_area, regions.len());
        println!("  {}", names.join(", "));
    }

    if listed == 0 {
        return Err(eyre!(
            "no regions found for area '{}'",
            area.unwrap_or_default()
        ));
    }
    println!();
    println!("  {listed} regions (source: {})", registry.source());
    Ok(())
}

async fn cmd_regions_check(app: &App, name: &str) -> Result<()> {
    let registry = app.regions().await;
    let region = registry.require(name)?;
    println!("{} (area: {})", region.name, region.parent_area);
    Ok(())
}

fn cmd_normalize(text: &str, hint: &str) -> Result<()> {
    let address = docketrace_address::normalize(text, hint);
    println!("  Street: {}", address.street);
    println!("  City:   {}", address.city);
    println!("  State:  {}", address.state);
    println!("  Zip:    {}", address.postal_code);
    if address.is_degraded() {
        println!();
        println!("  (could not split address; kept as street)");
    }
    Ok(())
}

async fn cmd_scrape(app: &App, region: &str) -> Result<()> {
    let regions = app.regions().await;
    let region = regions.require(region)?.name.clone();
    let storage = app.storage().await?;
    let pipeline = app.pipeline(storage, regions)?;

    let spinner = spinner(format!("Searching {region}..."))?;
    let result = pipeline.scrape_and_store(&region).await;
    spinner.finish_and_clear();
    let stats = result?;

    println!();
    println!("  Region:    {}", stats.region);
    println!("  Found:     {}", stats.cases_found);
    println!("  New:       {}", stats.cases_inserted);
    println!("  Existing:  {}", stats.cases_existing);
    println!("  Defendants:{:>3}", stats.defendants_inserted);
    println!("  Time:      {:.1}s", stats.elapsed.as_secs_f64());
    if let Some(enrichment) = &stats.enrichment {
        println!();
        print_region_enrichment(enrichment);
    }
    print_errors(&stats.errors);
    Ok(())
}

async fn cmd_enrich_case(app: &App, docket: &str, env: Environment, force: bool) -> Result<()> {
    let storage = app.storage().await?;
    let tracer = app.tracer(storage, app.regions().await)?;
    let result = tracer.enrich_case(docket, env, force).await?;

    println!();
    if result.skipped {
        println!("  {docket} is already traced in {env} (use --force to look up again)");
        return Ok(());
    }
    println!("  Docket:     {}", result.docket_number);
    println!("  Defendants: {}", result.defendants_processed);
    println!("  Addresses:  {}", result.addresses_processed);
    println!("  Phones:     {}", result.phones_found);
    println!("  Stored:     {}", result.records_stored);
    println!("  Billed:     {} lookup(s) in {env}", result.lookups_billed);
    print_errors(&result.errors);
    Ok(())
}

async fn cmd_enrich_region(
    app: &App,
    region: &str,
    env: Environment,
    limit: Option<usize>,
    force: bool,
) -> Result<()> {
    let storage = app.storage().await?;
    let tracer = app.tracer(storage, app.regions().await)?;

    let spinner = spinner(format!("Enriching {region} ({env})..."))?;
    let result = tracer.enrich_region(region, env, limit, force).await;
    spinner.finish_and_clear();
    let result = result?;

    println!();
    print_region_enrichment(&result);
    print_errors(&result.errors);
    Ok(())
}

async fn cmd_costs(app: &App, env: Option<Environment>, region: Option<&str>) -> Result<()> {
    let region = match region {
        Some(name) => Some(app.regions().await.require(name)?.name.clone()),
        None => None,
    };
    let storage = app.storage().await?;
    let summary = storage.cost_summary(env, region.as_deref()).await?;

    let mut scope = env.map_or_else(|| "all environments".to_string(), |e| e.to_string());
    if let Some(region) = &region {
        scope = format!("{region}, {scope}");
    }
    println!();
    println!("  Costs ({scope})");
    println!("  Cases:    {}", summary.total_cases);
    println!("  Lookups:  {}", summary.total_lookups);
    println!("  Per case: {:.2}", summary.average_lookups_per_case());
    println!("  Total:    ${:.2}", summary.total_cost);
    println!();
    Ok(())
}

async fn cmd_report(app: &App, docket: &str) -> Result<()> {
    let storage = app.storage().await?;
    let report = storage
        .case_report(docket)
        .await?
        .ok_or_else(|| eyre!("no stored case with docket number '{docket}'"))?;
    println!();
    print!("{}", format_case_report(&report));
    println!();
    Ok(())
}

async fn cmd_stats(app: &App, region: &str, env: Environment) -> Result<()> {
    let regions = app.regions().await;
    let region = regions.require(region)?.name.clone();
    let storage = app.storage().await?;
    let stats = storage.region_trace_stats(&region, env).await?;

    println!();
    println!("  {region} ({env})");
    println!("  Cases:    {}", stats.total_cases);
    println!("  Traced:   {}", stats.traced_cases);
    println!("  Untraced: {}", stats.untraced_cases());
    println!();
    Ok(())
}

async fn cmd_batch(app: &App, areas: &[String]) -> Result<()> {
    let regions = app.regions().await;
    let storage = app.storage().await?;
    let pipeline = app.pipeline(storage, regions.clone())?;

    let scheduler = JobScheduler::new(
        Arc::new(JobRegistry::new()),
        regions,
        Arc::new(pipeline),
        &app.config.scheduler,
    );
    let ids = scheduler.submit_all(areas).await?;
    info!(jobs = ids.len(), "batch submitted");

    let bar = ProgressBar::new(ids.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let jobs = loop {
        let mut jobs = Vec::with_capacity(ids.len());
        for id in &ids {
            jobs.push(scheduler.status(*id).await?);
        }
        let done = jobs.iter().filter(|j| j.status.is_terminal()).count();
        let running = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count();
        bar.set_position(done as u64);
        bar.set_message(format!("{running} running"));
        if done == jobs.len() {
            break jobs;
        }
        tokio::time::sleep(BATCH_POLL_INTERVAL).await;
    };
    bar.finish_and_clear();

    let completed: Vec<_> = jobs
        .iter()
        .filter(|j| j.status == JobStatus::Completed)
        .collect();
    let cases: usize = completed.iter().filter_map(|j| j.cases_found).sum();

    println!();
    println!("  Jobs:      {}", jobs.len());
    println!("  Completed: {}", completed.len());
    println!("  Failed:    {}", jobs.len() - completed.len());
    println!("  Cases:     {cases}");
    for job in jobs.iter().filter(|j| j.status == JobStatus::Failed) {
        println!(
            "  - {}: {}",
            job.region,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message);
    Ok(spinner)
}

fn print_region_enrichment(result: &RegionEnrichmentResult) {
    println!("  Enriched:   {}", result.region);
    println!("  Cases:      {}", result.cases_processed);
    println!("  Skipped:    {}", result.cases_skipped);
    println!("  Defendants: {}", result.total_defendants);
    println!("  Addresses:  {}", result.total_addresses);
    println!("  Phones:     {}", result.total_phones);
    println!("  Stored:     {}", result.total_records);
    println!("  Lookups:    {}", result.total_lookups);
}

fn format_case_report(report: &CaseReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {}", report.case.case_name);
    let _ = writeln!(out, "  Docket: {}", report.case.docket_number);
    let _ = writeln!(out, "  Region: {}", report.case.region);

    if report.defendants.is_empty() {
        let _ = writeln!(out, "  (no defendants)");
    }
    for defendant in &report.defendants {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}", defendant.name);
        let _ = writeln!(
            out,
            "    Address: {}",
            defendant.address.as_deref().unwrap_or("-")
        );
    }

    for env in [Environment::Production, Environment::Sandbox] {
        let phones = report.phones(env);
        let _ = writeln!(out);
        let _ = writeln!(out, "  Phones ({env}): {}", phones.len());
        for record in phones {
            let _ = writeln!(
                out,
                "    {} ({})",
                record.phone_number,
                record.phone_type.as_str()
            );
        }
    }
    out
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        println!();
        return;
    }
    println!();
    println!("  {} error(s):", errors.len());
    for e in errors {
        println!("  - {e}");
    }
    println!();
}
