use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engagement_pulse::catalog::{load_catalog, DEFAULT_CATALOG_PATH};
use engagement_pulse::config::{Config, DEFAULT_CONFIG_FILE};
use engagement_pulse::export::{self, AnalysisDigest};
use engagement_pulse::org::OrgFilter;
use engagement_pulse::periods::{self, Comparison, PeriodResponses, Population};
use engagement_pulse::{db, report, Engine};

#[derive(Parser)]
#[command(name = "engagement-pulse")]
#[command(about = "Aggregates Likert engagement surveys into scores, signals and reports", long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to the question catalog
    #[arg(long, global = true, default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Postgres connection string
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with every default spelled out
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that work against the Postgres store.
#[derive(Subcommand)]
enum StoreCommand {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo stores, respondents and two survey periods
    Seed,
    /// Import or update respondents from a CSV file
    ImportRespondents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import survey answers from a CSV file
    ImportResponses {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List stored survey periods, newest first
    Surveys,
    /// Print a summary of one period against the two before it
    Summary {
        #[arg(long)]
        survey: Option<String>,
        /// Respondent attribute to break results down by
        #[arg(long)]
        segment: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Also write the full comparison as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        survey: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export raw answers, the full summary or the analysis digest
    Export {
        #[arg(long, value_enum)]
        kind: ExportKind,
        #[arg(long)]
        survey: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct ScopeArgs {
    #[arg(long)]
    hq: Option<String>,
    #[arg(long)]
    dept: Option<String>,
    #[arg(long)]
    area: Option<String>,
    #[arg(long)]
    office: Option<String>,
}

impl From<ScopeArgs> for OrgFilter {
    fn from(scope: ScopeArgs) -> Self {
        OrgFilter {
            hq: scope.hq,
            dept: scope.dept,
            area: scope.area,
            office: scope.office,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportKind {
    Csv,
    Json,
    Digest,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("engagement_pulse=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// The requested survey, else the newest stored one, else the current month.
fn resolve_survey(requested: Option<String>, ids: &[String]) -> String {
    requested
        .or_else(|| ids.first().cloned())
        .unwrap_or_else(periods::current_survey_id)
}

struct Workspace {
    config: Config,
    engine: Engine,
    catalog_path: PathBuf,
}

impl Workspace {
    fn load(config_path: &Path, catalog_path: &Path) -> anyhow::Result<Self> {
        let config = Config::load(config_path)?;
        let engine = config.engine()?;
        Ok(Self {
            config,
            engine,
            catalog_path: catalog_path.to_path_buf(),
        })
    }

    async fn compare(
        &self,
        pool: &PgPool,
        survey: Option<String>,
        filter: &OrgFilter,
        segment_by: &str,
    ) -> anyhow::Result<Comparison> {
        let catalog = load_catalog(&self.catalog_path, &self.engine.stages)?;
        let (respondents, org_units, ids) = tokio::try_join!(
            db::fetch_respondents(pool),
            db::fetch_org_units(pool),
            db::list_survey_ids(pool),
        )?;
        let as_of = resolve_survey(survey, &ids);
        if !ids.contains(&as_of) {
            bail!("no stored responses for survey {as_of}");
        }

        let mut loaded = Vec::with_capacity(ids.len());
        for survey_id in &ids {
            let responses = db::fetch_responses(pool, survey_id).await?;
            loaded.push(PeriodResponses {
                survey_id: survey_id.clone(),
                responses,
            });
        }
        info!(periods = loaded.len(), as_of = %as_of, "loaded survey periods");

        let population = Population {
            respondents: &respondents,
            org_units: &org_units,
            catalog: &catalog,
        };
        let comparison = periods::compare_periods(
            &self.engine,
            &as_of,
            &loaded,
            population,
            filter,
            segment_by,
            chrono::Utc::now(),
        )
        .with_context(|| format!("failed to summarize survey {as_of}"))?;
        Ok(comparison)
    }
}

fn print_summary(comparison: &Comparison, min_n: usize) {
    let summary = &comparison.current.summary;
    let score = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));

    println!(
        "Survey {} ({} respondents): overall {} [{}]",
        summary.survey_id,
        summary.n,
        score(summary.overall_score),
        summary.signals.overall.label
    );
    for (label, period) in [("prev1", &comparison.prev1), ("prev2", &comparison.prev2)] {
        if let Some(p) = period {
            println!(
                "  {label} {}: overall {}",
                p.summary.survey_id,
                score(p.summary.overall_score)
            );
        }
    }
    if let Some(baseline) = &comparison.overall_avg {
        println!("  all periods: overall {}", score(baseline.summary.overall_score));
    }
    println!(
        "Response rate: {:.1}% of people, {:.1}% of questions",
        summary.response_rate.by_respondent.rate * 100.0,
        summary.response_rate.by_question.rate * 100.0
    );

    for category in &summary.category_scores {
        println!("  {} {}", category.category_name, score(category.mean));
    }
    println!();
    println!("{}", export::preview_table(export::factor_rows(summary)));

    if !summary.strengths.is_empty() {
        println!();
        println!("Strengths:");
        for s in &summary.strengths {
            println!("  {}. {} ({:.2})", s.rank, s.element_name, s.mean);
        }
        println!("Weaknesses:");
        for w in &summary.weaknesses {
            println!("  {}. {} ({:.2})", w.rank, w.element_name, w.mean);
        }
    }

    if !comparison.current.segments.is_empty() {
        println!();
        println!("Segments:");
        for segment in &comparison.current.segments {
            println!(
                "  {} (n={}): {}",
                segment.segment_name,
                segment.n,
                report::mask_if_small_n(score(segment.overall_score), segment.n, min_n)
            );
        }
    }
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Config written to {}.", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitConfig { force } => init_config(&cli.config, force),
        Commands::Store(command) => {
            let workspace = Workspace::load(&cli.config, &cli.catalog)?;
            let pool = connect(cli.database_url.as_deref()).await?;
            run(command, &workspace, &pool).await
        }
    }
}

async fn run(command: StoreCommand, workspace: &Workspace, pool: &PgPool) -> anyhow::Result<()> {
    match command {
        StoreCommand::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        StoreCommand::Seed => {
            db::seed(pool).await?;
            println!("Seed data inserted.");
        }
        StoreCommand::ImportRespondents { csv } => {
            let stats = db::import_respondents_csv(pool, &csv).await?;
            println!(
                "Imported {} respondents from {} ({} skipped).",
                stats.inserted,
                csv.display(),
                stats.skipped
            );
        }
        StoreCommand::ImportResponses { csv } => {
            let stats = db::import_responses_csv(pool, &csv).await?;
            println!(
                "Imported {} responses from {} ({} skipped).",
                stats.inserted,
                csv.display(),
                stats.skipped
            );
        }
        StoreCommand::Surveys => {
            let ids = db::list_survey_ids(pool).await?;
            if ids.is_empty() {
                println!("No surveys stored yet.");
            }
            for id in ids {
                println!("{id}");
            }
        }
        StoreCommand::Summary {
            survey,
            segment,
            scope,
            json,
        } => {
            let segment_by = segment.unwrap_or_else(|| workspace.config.report.segment_by.clone());
            let comparison = workspace
                .compare(pool, survey, &scope.into(), &segment_by)
                .await?;
            print_summary(&comparison, workspace.config.report.min_n_to_show);
            if let Some(path) = json {
                export::write_json(&path, &comparison)?;
                println!("Comparison written to {}.", path.display());
            }
        }
        StoreCommand::Report { survey, scope, out } => {
            let settings = &workspace.config.report;
            let comparison = workspace
                .compare(pool, survey, &scope.into(), &settings.segment_by)
                .await?;
            std::fs::write(&out, report::build_report(&comparison, settings.min_n_to_show))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        StoreCommand::Export { kind, survey, out } => match kind {
            ExportKind::Csv => {
                let catalog = load_catalog(&workspace.catalog_path, &workspace.engine.stages)?;
                let ids = db::list_survey_ids(pool).await?;
                let survey_id = resolve_survey(survey, &ids);
                let (responses, respondents) = tokio::try_join!(
                    db::fetch_responses(pool, &survey_id),
                    db::fetch_respondents(pool),
                )?;
                if responses.is_empty() {
                    warn!(survey_id = %survey_id, "exporting a survey with no responses");
                }
                let bytes = export::raw_data_csv(&responses, &respondents, &catalog.questions)?;
                std::fs::write(&out, bytes)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Raw answers for {survey_id} written to {}.", out.display());
            }
            ExportKind::Json | ExportKind::Digest => {
                let segment_by = workspace.config.report.segment_by.clone();
                let comparison = workspace
                    .compare(pool, survey, &OrgFilter::default(), &segment_by)
                    .await?;
                let summary = &comparison.current.summary;
                if matches!(kind, ExportKind::Json) {
                    export::write_json(&out, summary)?;
                } else {
                    export::write_json(&out, &AnalysisDigest::from(summary))?;
                }
                println!("Export written to {}.", out.display());
            }
        },
    }

    Ok(())
}
