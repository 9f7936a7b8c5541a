//! Playbook CLI - turn call transcripts into reusable knowledge

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use playbook_core::batch::partition_results;
use playbook_core::collision::{CollisionDetector, ScheduledPost};
use playbook_core::config::Config;
use playbook_core::extraction::{
    ExtractionResult, KnowledgeExtractor, KnowledgePipeline, SpeakerMap, TopicNormalizer,
    Transcript, TranscriptType,
};
use playbook_core::knowledge::{KnowledgeEntry, KnowledgeType};
use playbook_core::llm::{CompletionProvider, DisabledProvider, EmbeddingProvider, LlmClient};
use playbook_core::playbook::{SopAction, SopClassifier, SopEditGenerator};
use playbook_core::prompts::PromptRegistry;
use playbook_core::retrieval::{
    BriefOptions, BriefingRetriever, ContentGoal, ReadinessAssessor, TemplateMatcher,
    TemplateOptions, build_template_guidance,
};
use playbook_core::store::{KnowledgeStore, SqliteKnowledgeStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "playbook")]
#[command(author, version, about = "Turn call transcripts into reusable knowledge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TranscriptKind {
    Coaching,
    Sales,
}

impl From<TranscriptKind> for TranscriptType {
    fn from(kind: TranscriptKind) -> Self {
        match kind {
            TranscriptKind::Coaching => TranscriptType::Coaching,
            TranscriptKind::Sales => TranscriptType::Sales,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract knowledge from one transcript
    Extract {
        /// Transcript file
        file: PathBuf,
        /// Transcript type
        #[arg(short = 't', long = "type", default_value = "coaching")]
        kind: TranscriptKind,
        /// Owner the knowledge belongs to
        #[arg(short, long, default_value = "local")]
        owner: String,
        /// JSON speaker map ({"Name": {"role": "host|client|guest"}})
        #[arg(long)]
        speakers: Option<PathBuf>,
        /// Tag, embed and store the entries
        #[arg(long)]
        store: bool,
    },

    /// Extract knowledge from every transcript in a directory
    ExtractBatch {
        /// Directory of .txt or .md transcripts
        dir: PathBuf,
        #[arg(short = 't', long = "type", default_value = "coaching")]
        kind: TranscriptKind,
        #[arg(short, long, default_value = "local")]
        owner: String,
        #[arg(long)]
        store: bool,
    },

    /// Build a content brief for a topic
    Brief {
        topic: String,
        #[arg(short, long, default_value = "local")]
        owner: String,
        /// Maximum entries in the brief
        #[arg(short, long)]
        max_entries: Option<usize>,
        /// Author voice notes for angle suggestions
        #[arg(long)]
        voice: Option<String>,
    },

    /// Check whether a topic is ready for a content goal
    Readiness {
        topic: String,
        /// lead_magnet, blog_post, course, sop or content_week
        #[arg(short, long)]
        goal: String,
        #[arg(short, long, default_value = "local")]
        owner: String,
    },

    /// Match post templates to a topic
    Templates {
        topic: String,
        #[arg(short, long, default_value = "local")]
        owner: String,
        /// Number of templates
        #[arg(short, long)]
        count: Option<usize>,
        /// Only the single best template, with guidance
        #[arg(long)]
        best: bool,
    },

    /// Check scheduled posts for same-day topic collisions
    Collisions {
        /// JSON array of {id, author, content, scheduled_date}
        posts: PathBuf,
    },

    /// Classify a knowledge entry against an SOP document
    Classify {
        /// JSON entry ({knowledge_type, content, context})
        entry: PathBuf,
        /// SOP markdown document
        doc: PathBuf,
        /// Document title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
        /// Write the merged edit into the document when the entry enriches it
        #[arg(long)]
        apply: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Providers and prompts resolved from configuration
struct Services {
    config: Config,
    prompts: Arc<PromptRegistry>,
    provider: Arc<dyn CompletionProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Services {
    fn load() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let prompts = Arc::new(PromptRegistry::from_config(&config)?);

        let provider: Arc<dyn CompletionProvider>;
        let embedder: Arc<dyn EmbeddingProvider>;
        match LlmClient::from_config(&config)? {
            Some(client) => {
                let client = Arc::new(client);
                provider = client.clone();
                embedder = client;
            }
            None => {
                warn!("No API key configured, model-backed features are disabled");
                provider = Arc::new(DisabledProvider);
                embedder = Arc::new(DisabledProvider);
            }
        }

        Ok(Self {
            config,
            prompts,
            provider,
            embedder,
        })
    }

    async fn store(&self) -> anyhow::Result<Arc<dyn KnowledgeStore>> {
        let path = self.config.database_path()?;
        let store = SqliteKnowledgeStore::connect(&path).await?;
        Ok(Arc::new(store))
    }

    fn extractor(&self) -> KnowledgeExtractor {
        KnowledgeExtractor::new(self.provider.clone(), self.prompts.clone())
            .with_max_chars(self.config.retrieval.transcript_max_chars)
    }

    async fn pipeline(&self) -> anyhow::Result<KnowledgePipeline> {
        let store = self.store().await?;
        Ok(KnowledgePipeline::new(
            self.extractor(),
            TopicNormalizer::new(self.provider.clone(), store.clone(), self.prompts.clone()),
            self.embedder.clone(),
            store,
        )
        .with_batch_size(self.config.batch.batch_size))
    }
}

#[derive(Deserialize)]
struct EntryFile {
    knowledge_type: String,
    content: String,
    #[serde(default)]
    context: String,
}

#[derive(Serialize)]
struct BatchReport<T: Serialize> {
    succeeded: BTreeMap<String, T>,
    failed: BTreeMap<String, String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("playbook=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Extract {
            file,
            kind,
            owner,
            speakers,
            store,
        } => cmd_extract(&file, kind.into(), &owner, speakers.as_deref(), store, format, quiet).await,

        Commands::ExtractBatch {
            dir,
            kind,
            owner,
            store,
        } => cmd_extract_batch(&dir, kind.into(), &owner, store, format, quiet).await,

        Commands::Brief {
            topic,
            owner,
            max_entries,
            voice,
        } => cmd_brief(&topic, &owner, max_entries, voice, format).await,

        Commands::Readiness { topic, goal, owner } => cmd_readiness(&topic, &goal, &owner, format).await,

        Commands::Templates {
            topic,
            owner,
            count,
            best,
        } => cmd_templates(&topic, &owner, count, best, format).await,

        Commands::Collisions { posts } => cmd_collisions(&posts, format).await,

        Commands::Classify {
            entry,
            doc,
            title,
            apply,
        } => cmd_classify(&entry, &doc, title, apply, format, quiet).await,

        Commands::Config { action } => cmd_config(action, quiet),

        Commands::Doctor => cmd_doctor(quiet).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Embeddings are noise in terminal output
fn strip_embeddings(entries: &mut [KnowledgeEntry]) {
    for entry in entries {
        entry.embedding = None;
    }
}

fn print_entries(entries: &[KnowledgeEntry]) {
    for entry in entries {
        println!(
            "[{}] q{} {}",
            entry.knowledge_type, entry.quality_score, entry.content
        );
        if !entry.topics.is_empty() {
            println!("      topics: {}", entry.topics.join(", "));
        }
    }
}

/// Transcript id: the file name, extension included, so `call.txt` and `call.md` stay distinct
fn transcript_id(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("Transcript path has no file name: {}", path.display()))
}

fn read_transcript(
    path: &Path,
    transcript_type: TranscriptType,
    owner: &str,
) -> anyhow::Result<Transcript> {
    let id = transcript_id(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    Ok(Transcript::new(id, owner, transcript_type, text))
}

async fn cmd_extract(
    file: &Path,
    transcript_type: TranscriptType,
    owner: &str,
    speakers: Option<&Path>,
    store: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let services = Services::load()?;
    let mut transcript = read_transcript(file, transcript_type, owner)?;
    if let Some(path) = speakers {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read speaker map: {}", path.display()))?;
        let map: SpeakerMap = serde_json::from_str(&contents).context("Invalid speaker map")?;
        transcript = transcript.with_speakers(map);
    }

    if !quiet && format == OutputFormat::Text {
        println!("Extracting knowledge from '{}'...", transcript.id);
    }

    let mut entries = if store {
        services.pipeline().await?.ingest_transcript(&transcript).await?
    } else {
        let result = services.extractor().extract(&transcript).await?;
        if result.truncated && !quiet {
            eprintln!("Warning: transcript was truncated before extraction");
        }
        result.entries
    };

    match format {
        OutputFormat::Json => {
            strip_embeddings(&mut entries);
            print_json(&entries)?;
        }
        OutputFormat::Text => {
            print_entries(&entries);
            if !quiet {
                println!();
                println!(
                    "{} entries {}",
                    entries.len(),
                    if store { "stored" } else { "extracted" }
                );
            }
        }
    }
    Ok(())
}

async fn cmd_extract_batch(
    dir: &Path,
    transcript_type: TranscriptType,
    owner: &str,
    store: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let services = Services::load()?;

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "txt" || e == "md")
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("No .txt or .md transcripts found in {}", dir.display());
    }

    if !quiet && format == OutputFormat::Text {
        println!("Processing {} transcripts...", paths.len());
    }

    let mut transcripts = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for path in &paths {
        match read_transcript(path, transcript_type, owner) {
            Ok(transcript) => transcripts.push(transcript),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable transcript");
                let id = transcript_id(path).unwrap_or_else(|_| path.display().to_string());
                unreadable.push((id, format!("{:#}", e)));
            }
        }
    }

    let results: HashMap<String, playbook_core::Result<Vec<KnowledgeEntry>>> = if transcripts.is_empty() {
        HashMap::new()
    } else if store {
        services.pipeline().await?.ingest_batch(&transcripts).await
    } else {
        services
            .extractor()
            .batch_extract(&transcripts, services.config.batch.batch_size)
            .await
            .into_iter()
            .map(|(id, r)| (id, r.map(|ExtractionResult { entries, .. }| entries)))
            .collect()
    };

    let (succeeded, failed) = partition_results(results);
    let report = BatchReport {
        succeeded: succeeded
            .into_iter()
            .map(|(id, mut entries)| {
                strip_embeddings(&mut entries);
                (id, entries)
            })
            .collect(),
        failed: failed
            .into_iter()
            .map(|(id, e)| (id, e.to_string()))
            .chain(unreadable)
            .collect(),
    };
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Batch extraction finished"
    );

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            for (id, entries) in &report.succeeded {
                println!("[OK] {}: {} entries", id, entries.len());
            }
            for (id, error) in &report.failed {
                println!("[!!] {}: {}", id, error);
            }
        }
    }

    if !report.failed.is_empty() && report.succeeded.is_empty() {
        bail!("Every transcript failed");
    }
    Ok(())
}

async fn cmd_brief(
    topic: &str,
    owner: &str,
    max_entries: Option<usize>,
    voice: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let services = Services::load()?;
    let retriever = BriefingRetriever::new(
        services.store().await?,
        services.embedder.clone(),
        services.provider.clone(),
        services.prompts.clone(),
    )
    .with_config(services.config.retrieval.clone());

    let options = BriefOptions {
        max_entries,
        voice_style: voice,
        ..BriefOptions::default()
    };
    let mut brief = retriever.build_content_brief(owner, topic, &options).await?;

    match format {
        OutputFormat::Json => {
            strip_embeddings(&mut brief.entries);
            strip_embeddings(&mut brief.insights);
            strip_embeddings(&mut brief.questions);
            strip_embeddings(&mut brief.product_intel);
            for entries in brief.by_type.values_mut() {
                strip_embeddings(entries);
            }
            print_json(&brief)?;
        }
        OutputFormat::Text => {
            println!("Topic: {}", brief.topic);
            println!(
                "Entries: {}  Readiness: {:.0}%",
                brief.entry_count(),
                brief.topic_readiness * 100.0
            );
            if !brief.top_knowledge_types.is_empty() {
                let types: Vec<&str> = brief.top_knowledge_types.iter().map(KnowledgeType::as_str).collect();
                println!("Strongest types: {}", types.join(", "));
            }
            println!();
            println!("{}", brief.compiled_context);
            if !brief.suggested_angles.is_empty() {
                println!("Suggested angles:");
                for angle in &brief.suggested_angles {
                    println!("  - {}", angle);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_readiness(topic: &str, goal: &str, owner: &str, format: OutputFormat) -> anyhow::Result<()> {
    let goal = ContentGoal::parse(goal).ok_or_else(|| {
        anyhow!(
            "Unknown goal '{}'. Expected one of: {}",
            goal,
            ContentGoal::ALL.map(|g| g.as_str()).join(", ")
        )
    })?;

    let services = Services::load()?;
    let assessor = ReadinessAssessor::new(
        services.store().await?,
        services.embedder.clone(),
        services.provider.clone(),
        services.prompts.clone(),
    )
    .with_config(services.config.retrieval.clone());
    let assessment = assessor.assess_readiness(owner, topic, goal).await?;

    match format {
        OutputFormat::Json => print_json(&assessment)?,
        OutputFormat::Text => {
            println!(
                "{} for {}: {} (confidence {:.0}%)",
                topic,
                goal,
                if assessment.ready { "READY" } else { "NOT READY" },
                assessment.confidence * 100.0
            );
            println!("{}", assessment.reasoning);
            if !assessment.gaps_that_would_improve.is_empty() {
                println!("Gaps:");
                for gap in &assessment.gaps_that_would_improve {
                    println!("  - {}", gap);
                }
            }
            if !assessment.topic_coverage.is_empty() {
                println!("Coverage:");
                for (knowledge_type, count) in &assessment.topic_coverage {
                    println!("  {}: {}", knowledge_type, count);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_templates(
    topic: &str,
    owner: &str,
    count: Option<usize>,
    best: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let services = Services::load()?;
    let matcher = TemplateMatcher::new(services.store().await?, services.embedder.clone());

    if best {
        let Some(found) = matcher.find_best_template(topic, owner).await else {
            println!("No matching template");
            return Ok(());
        };
        match format {
            OutputFormat::Json => print_json(&found)?,
            OutputFormat::Text => println!("{}", build_template_guidance(&found.template)),
        }
        return Ok(());
    }

    let mut options = TemplateOptions::from(&services.config.retrieval);
    if let Some(count) = count {
        options.count = count;
    }
    let mut matches = matcher.match_templates(topic, owner, &options).await;

    match format {
        OutputFormat::Json => {
            for m in &mut matches {
                m.template.embedding = None;
            }
            print_json(&matches)?;
        }
        OutputFormat::Text => {
            if matches.is_empty() {
                println!("No matching templates");
            }
            for m in &matches {
                println!("{:.2}  {} ({})", m.similarity, m.template.name, m.template.category);
            }
        }
    }
    Ok(())
}

async fn cmd_collisions(posts: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(posts)
        .with_context(|| format!("Failed to read posts: {}", posts.display()))?;
    let posts: Vec<ScheduledPost> = serde_json::from_str(&contents).context("Invalid posts file")?;

    let services = Services::load()?;
    let report = CollisionDetector::new(services.provider.clone(), services.prompts.clone())
        .detect_collisions(&posts)
        .await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            if !report.has_collision {
                println!("No collisions found");
            }
            for c in &report.collisions {
                println!(
                    "[{:?}] {} {} <-> {}: {}",
                    c.severity, c.scheduled_date, c.post_a_id, c.post_b_id, c.overlap_description
                );
                if !c.suggestion.is_empty() {
                    println!("      {}", c.suggestion);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_classify(
    entry: &Path,
    doc: &Path,
    title: Option<String>,
    apply: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(entry)
        .with_context(|| format!("Failed to read entry: {}", entry.display()))?;
    let input: EntryFile = serde_json::from_str(&contents).context("Invalid entry file")?;
    let knowledge_type = KnowledgeType::parse(&input.knowledge_type)
        .ok_or_else(|| anyhow!("Unknown knowledge type '{}'", input.knowledge_type))?;
    let entry = KnowledgeEntry::new("local", knowledge_type, input.content).with_context(input.context);

    let doc_text = std::fs::read_to_string(doc)
        .with_context(|| format!("Failed to read document: {}", doc.display()))?;
    let doc_title = title.unwrap_or_else(|| {
        doc.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let services = Services::load()?;
    let classification = SopClassifier::new(services.provider.clone(), services.prompts.clone())
        .classify_for_document(&entry, &doc_text, &doc_title)
        .await?;

    match format {
        OutputFormat::Json => print_json(&classification)?,
        OutputFormat::Text => {
            println!("Action: {}", classification.action);
            if let Some(section) = &classification.target_section {
                println!("Section: {}", section);
            }
            println!("Reasoning: {}", classification.reasoning);
        }
    }

    if !apply {
        return Ok(());
    }
    let (SopAction::Enrich, Some(section)) = (classification.action, classification.target_section) else {
        if !quiet {
            println!("Nothing to apply");
        }
        return Ok(());
    };

    let edit = SopEditGenerator::new(services.provider.clone(), services.prompts.clone())
        .generate_edit(std::slice::from_ref(&entry), &doc_text, &doc_title, &section)
        .await?;
    let updated = edit.apply(&doc_text, &doc_title)?;
    std::fs::write(doc, updated).with_context(|| format!("Failed to write document: {}", doc.display()))?;

    if !quiet {
        println!("Applied: {}", edit.summary);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Playbook Health Check");
        println!("=====================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            match config.llm.resolved_api_key() {
                Ok(Some(_)) => {
                    if !quiet {
                        let redacted = config.llm.redacted_api_key()?.unwrap_or_default();
                        println!("[OK] API Key: Configured ({})", redacted);
                    }
                }
                Ok(None) => {
                    all_ok = false;
                    if !quiet {
                        warn!("API Key: Not configured");
                        println!("[!!] API Key: Not configured");
                        println!("     Set PLAYBOOK_API_KEY or OPENROUTER_API_KEY environment variable");
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] API Key: Error - {}", e);
                    }
                }
            }
            Some(config)
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
            None
        }
    };

    if let Some(config) = &config {
        match PromptRegistry::from_config(config) {
            Ok(_) => {
                if !quiet {
                    println!("[OK] Prompts: Loaded");
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Prompts: Error - {}", e);
                }
            }
        }

        match check_database(config).await {
            Ok(message) => {
                if !quiet {
                    println!("[OK] Database: {}", message);
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Database: Error - {}", e);
                }
            }
        }
    }

    if !quiet {
        match Config::config_path() {
            Ok(path) => {
                if path.exists() {
                    println!("[OK] Config file: {}", path.display());
                } else {
                    println!("[--] Config file: {} (using defaults)", path.display());
                }
            }
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(())
}

async fn check_database(config: &Config) -> anyhow::Result<String> {
    let path = config.database_path()?;
    let store = SqliteKnowledgeStore::connect(&path).await?;
    store.health_check().await?;
    let status = store.migration_status().await?;
    Ok(format!(
        "{} (schema v{})",
        path.display(),
        status.current_version
    ))
}
