use anyhow::{Context, Result};
use aporia_core::{AnnotationStore, TextAnchor, VisibilityMode};
use aporia_local::{
    anchor, chunk, config, expand, index, mapper, pipeline, salience, segment, textprep,
    AnchorOptions, AporiaConfig, ChatSession, ChunkConfig, ConfiguredBackend, FsStore, Session,
    VirtualDocument, Vocabulary,
};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aporia")]
#[command(about = "Critical-reading plumbing: chunk, anchor and annotate documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split text into sentences (json).
    Sentences(TextArgs),
    /// Split text into paragraphs of sentences (json).
    Paragraphs(TextArgs),
    /// Build semantic chunks with salience scores (json).
    Chunk(ChunkCmd),
    /// Score a passage's salience (json).
    Salience(TextArgs),
    /// Describe a character range of an HTML document as a text anchor (json).
    Describe(DescribeCmd),
    /// Re-locate a text anchor inside an HTML document (json).
    Reanchor(ReanchorCmd),
    /// Expand a character range to whole sentences (json).
    Expand(ExpandCmd),
    /// Analyze an HTML document with the configured backend and persist its annotations (json).
    Analyze(AnalyzeCmd),
    /// Re-anchor the saved annotations of a url against an HTML document (json).
    Restore(RestoreCmd),
    /// One Socratic chat turn about a passage (json).
    Chat(ChatCmd),
    /// Remove one saved annotation (json).
    Forget(ForgetCmd),
    /// Show (or initialize) the stored configuration (json).
    Config(ConfigCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct TextArgs {
    /// Input text file; stdin when omitted or `-`.
    input: Option<PathBuf>,
    /// JSON vocabulary file (built-in English vocabulary by default).
    #[arg(long)]
    vocabulary: Option<PathBuf>,
    /// Treat the input as HTML and use only the body text a reader can see.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    visible: bool,
}

#[derive(clap::Args, Debug)]
struct ChunkCmd {
    #[command(flatten)]
    text: TextArgs,
    #[arg(long, default_value_t = 500)]
    target: usize,
    #[arg(long, default_value_t = 200)]
    min: usize,
    #[arg(long, default_value_t = 800)]
    max: usize,
    /// Also report the chunk order by descending salience.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    prioritize: bool,
    /// Omit chunk text and sentences from the output.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    summary: bool,
}

#[derive(clap::Args, Debug)]
struct DescribeCmd {
    /// HTML document.
    html: PathBuf,
    /// Start character offset into the document's body text.
    #[arg(long)]
    start: usize,
    /// End character offset (exclusive).
    #[arg(long)]
    end: usize,
    #[arg(long, default_value_t = 32)]
    context_len: usize,
}

#[derive(clap::Args, Debug)]
struct ReanchorCmd {
    /// HTML document.
    html: PathBuf,
    /// Anchor JSON file (a bare anchor, or the output of `describe`).
    #[arg(long)]
    anchor: PathBuf,
    #[arg(long, default_value_t = 0.8)]
    fuzzy_threshold: f64,
    #[arg(long, default_value_t = 0.7)]
    context_threshold: f64,
    /// Limit the fuzzy scan to this many characters around the recorded position.
    #[arg(long)]
    fuzzy_scan_radius: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct ExpandCmd {
    #[command(flatten)]
    text: TextArgs,
    #[arg(long)]
    start: usize,
    #[arg(long)]
    end: usize,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// Store directory (default: APORIA_STORE_DIR, else the per-user cache dir).
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// HTML document.
    html: PathBuf,
    /// Url the annotations are stored under.
    #[arg(long)]
    url: String,
    #[command(flatten)]
    store: StoreArgs,
    /// Model override for this run.
    #[arg(long)]
    model: Option<String>,
    /// Analyze chunks by descending salience.
    #[arg(long)]
    prioritize: Option<bool>,
}

#[derive(clap::Args, Debug)]
struct RestoreCmd {
    /// HTML document.
    html: PathBuf,
    #[arg(long)]
    url: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct ChatCmd {
    /// The highlighted passage under discussion.
    #[arg(long)]
    passage: String,
    /// The reader's message for this turn.
    #[arg(long)]
    message: String,
    /// Session file (json) holding earlier turns; created or updated on success.
    #[arg(long)]
    session: Option<PathBuf>,
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long)]
    model: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct ChatSessionFile {
    #[serde(default)]
    history: Vec<aporia_core::ChatMessage>,
    #[serde(default)]
    scores: Vec<f64>,
}

#[derive(clap::Args, Debug)]
struct ForgetCmd {
    #[arg(long)]
    url: String,
    /// Highlight id to remove.
    #[arg(long)]
    id: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct ConfigCmd {
    #[command(flatten)]
    store: StoreArgs,
    /// Write the effective configuration back to the store.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    write: bool,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn default_store_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("aporia")
}

impl StoreArgs {
    fn dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .or_else(config::store_dir_from_env)
            .unwrap_or_else(default_store_dir)
    }

    fn open(&self) -> FsStore {
        FsStore::new(self.dir())
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))
        }
        _ => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("read stdin")?;
            Ok(s)
        }
    }
}

/// Plain input as-is; with `--visible`, the body text that survives viewport filtering.
fn read_text(args: &TextArgs) -> Result<String> {
    let raw = read_input(args.input.as_deref())?;
    if !args.visible {
        return Ok(raw);
    }
    let doc = VirtualDocument::from_html(&raw);
    Ok(index::linearize(&doc, doc.body(), VisibilityMode::Viewport).text)
}

fn load_vocabulary(path: Option<&Path>) -> Result<Vocabulary> {
    Ok(match path {
        Some(p) => Vocabulary::from_json_file(p)?,
        None => Vocabulary::english(),
    })
}

fn load_html(path: &Path) -> Result<VirtualDocument> {
    let html = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(VirtualDocument::from_html(&html))
}

fn emit(kind: &str, body: serde_json::Value) {
    let mut v = serde_json::json!({
        "schema_version": 1,
        "kind": kind,
        "ok": true,
    });
    if let (Some(out), serde_json::Value::Object(body)) = (v.as_object_mut(), body) {
        out.extend(body);
    }
    println!("{v}");
}

/// Accepts a bare `TextAnchor` or any object carrying one under `anchor`.
fn parse_anchor(raw: &str) -> Result<TextAnchor> {
    let v: serde_json::Value = serde_json::from_str(raw).context("parse anchor json")?;
    let v = match v.get("anchor") {
        Some(inner) if inner.is_object() => inner.clone(),
        _ => v,
    };
    serde_json::from_value(v).context("anchor json must have exact/prefix/suffix/start/end")
}

fn load_env_file() {
    // Opt-in; never overrides the process env and never logs values.
    let Ok(p) = std::env::var("APORIA_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("APORIA_LOG")
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("aporia=info,aporia_local=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sentences(args) => {
            let text = read_text(&args)?;
            let vocab = load_vocabulary(args.vocabulary.as_deref())?;
            let sentences = segment::detect_sentences(&text, &vocab);
            emit(
                "sentences",
                serde_json::json!({ "count": sentences.len(), "sentences": sentences }),
            );
        }
        Commands::Paragraphs(args) => {
            let text = read_text(&args)?;
            let vocab = load_vocabulary(args.vocabulary.as_deref())?;
            let paragraphs = segment::detect_paragraphs(&text, &vocab);
            emit(
                "paragraphs",
                serde_json::json!({ "count": paragraphs.len(), "paragraphs": paragraphs }),
            );
        }
        Commands::Chunk(args) => {
            if args.min > args.max {
                anyhow::bail!("--min ({}) must not exceed --max ({})", args.min, args.max);
            }
            let text = read_text(&args.text)?;
            let vocab = load_vocabulary(args.text.vocabulary.as_deref())?;
            let cfg = ChunkConfig {
                target_words: args.target,
                min_words: args.min,
                max_words: args.max,
            };
            let chunks = chunk::create_semantic_chunks(&text, cfg, &vocab);
            let order: Vec<usize> = if args.prioritize {
                chunk::prioritize_chunks(&chunks)
            } else {
                (0..chunks.len()).collect()
            };
            let chunks_v: Vec<serde_json::Value> = chunks
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if args.summary {
                        serde_json::json!({
                            "index": i,
                            "start": c.start,
                            "end": c.end,
                            "word_count": c.word_count,
                            "sentences": c.sentences.len(),
                            "salience": c.salience,
                        })
                    } else {
                        let mut v = serde_json::to_value(c).unwrap_or_default();
                        if let Some(o) = v.as_object_mut() {
                            o.insert("index".to_string(), serde_json::json!(i));
                        }
                        v
                    }
                })
                .collect();
            emit(
                "chunks",
                serde_json::json!({
                    "config": cfg,
                    "count": chunks.len(),
                    "order": order,
                    "chunks": chunks_v,
                }),
            );
        }
        Commands::Salience(args) => {
            let text = read_text(&args)?;
            let vocab = load_vocabulary(args.vocabulary.as_deref())?;
            let s = salience::calculate_salience(&text, &vocab);
            emit(
                "salience",
                serde_json::json!({ "score": s.score, "factors": s.factors }),
            );
        }
        Commands::Describe(args) => {
            let doc = load_html(&args.html)?;
            let root = doc.body();
            let lin = index::linearize(&doc, root, VisibilityMode::Anchoring);
            let total = lin.char_len();
            if args.start >= args.end || args.end > total {
                anyhow::bail!(
                    "range {}..{} is not within the document text (0..{total})",
                    args.start,
                    args.end
                );
            }
            let range = mapper::locate(&doc, &lin.spans, args.start, args.end)
                .context("range does not map onto document text")?;
            let descriptor = anchor::describe_range(&doc, &range, root, args.context_len)
                .context("range does not lie on indexed text")?;
            emit("describe", serde_json::json!({ "anchor": descriptor }));
        }
        Commands::Reanchor(args) => {
            let doc = load_html(&args.html)?;
            let raw = std::fs::read_to_string(&args.anchor)
                .with_context(|| format!("read {}", args.anchor.display()))?;
            let descriptor = parse_anchor(&raw)?;
            let opts = AnchorOptions {
                fuzzy_threshold: args.fuzzy_threshold,
                context_threshold: args.context_threshold,
                fuzzy_scan_radius: args.fuzzy_scan_radius,
                ..AnchorOptions::default()
            };
            let root = doc.body();
            let found = anchor::anchor(&doc, &descriptor, root, &opts);
            let lin = index::linearize(&doc, root, VisibilityMode::Anchoring);
            let offsets = found
                .as_ref()
                .and_then(|r| mapper::range_to_offsets(&lin.spans, &r.range));
            emit(
                "reanchor",
                serde_json::json!({
                    "found": found.is_some(),
                    "method": found.as_ref().map(|r| r.method.as_str()),
                    "score": found.as_ref().map(|r| r.score),
                    "exact": found.as_ref().map(|r| r.exact.clone()),
                    "start": offsets.map(|o| o.0),
                    "end": offsets.map(|o| o.1),
                }),
            );
        }
        Commands::Expand(args) => {
            let text = read_text(&args.text)?;
            let vocab = load_vocabulary(args.text.vocabulary.as_deref())?;
            let (start, end) = expand::expand_to_sentence(&text, args.start, args.end, &vocab);
            let chars: Vec<char> = text.chars().collect();
            let end_c = end.min(chars.len());
            let start_c = start.min(end_c);
            emit(
                "expand",
                serde_json::json!({
                    "start": start,
                    "end": end,
                    "text": textprep::slice_chars(&chars, start_c, end_c),
                }),
            );
        }
        Commands::Analyze(args) => {
            let store = args.store.open();
            let mut cfg = AporiaConfig::load(&store).await?;
            if args.model.is_some() {
                cfg.model = args.model.clone();
            }
            if let Some(p) = args.prioritize {
                cfg.prioritize_by_salience = p;
            }
            let vocab = cfg.vocabulary()?;
            let backend = ConfiguredBackend::from_config(&cfg)?;
            tracing::info!(
                backend = cfg.backend.as_str(),
                model = backend.model(),
                "analyzing {}",
                args.html.display()
            );

            let mut doc = load_html(&args.html)?;
            let root = doc.body();
            let mut session = Session::new();
            let report = pipeline::analyze_document(
                &mut doc, root, &backend, &store, &cfg, &vocab, &mut session, &args.url,
            )
            .await?;
            emit(
                "analyze",
                serde_json::json!({
                    "report": report,
                    "highlights": session.highlights(),
                }),
            );
        }
        Commands::Restore(args) => {
            let store = args.store.open();
            let cfg = AporiaConfig::load(&store).await?;
            let mut doc = load_html(&args.html)?;
            let root = doc.body();
            let report =
                pipeline::restore_annotations(&mut doc, root, &store, &args.url, &cfg.anchor)
                    .await?;
            emit("restore", serde_json::json!({ "report": report }));
        }
        Commands::Chat(args) => {
            let store = args.store.open();
            let mut cfg = AporiaConfig::load(&store).await?;
            if args.model.is_some() {
                cfg.model = args.model.clone();
            }
            let backend = ConfiguredBackend::from_config(&cfg)?;

            let prior: ChatSessionFile = match &args.session {
                Some(p) if p.exists() => {
                    let raw = std::fs::read_to_string(p)
                        .with_context(|| format!("read {}", p.display()))?;
                    serde_json::from_str(&raw).context("parse chat session file")?
                }
                _ => ChatSessionFile::default(),
            };
            let mut chat = ChatSession::new("cli", args.passage.clone());
            chat.history = prior.history;
            chat.scores = prior.scores;

            let (response, score) = chat.ask(&backend, &args.message).await?;
            if let Some(p) = &args.session {
                let file = ChatSessionFile {
                    history: chat.history.clone(),
                    scores: chat.scores.clone(),
                };
                std::fs::write(p, serde_json::to_vec_pretty(&file)?)
                    .with_context(|| format!("write {}", p.display()))?;
            }
            emit(
                "chat",
                serde_json::json!({
                    "response": response,
                    "aporia_score": score,
                    "turns": chat.history.len() / 2,
                }),
            );
        }
        Commands::Forget(args) => {
            let store = args.store.open();
            let url = aporia_core::normalize_url(&args.url)?;
            let removed = store.delete_annotation(&url, &args.id).await?;
            emit(
                "forget",
                serde_json::json!({ "url": url, "id": args.id, "removed": removed }),
            );
        }
        Commands::Config(args) => {
            let store = args.store.open();
            let cfg = AporiaConfig::load(&store).await?;
            if args.write {
                cfg.save(&store).await?;
            }
            emit(
                "config",
                serde_json::json!({
                    "store_dir": store.root().display().to_string(),
                    "written": args.write,
                    "config": cfg,
                }),
            );
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();
            let store_dir = args.store.dir();
            let openai_configured = has_env("APORIA_OPENAI_COMPAT_BASE_URL");
            let openai_key = has_env("APORIA_OPENAI_COMPAT_API_KEY");
            let ollama_enabled = has_env("APORIA_OLLAMA_ENABLE");

            let mut checks: Vec<serde_json::Value> = Vec::new();

            let store_ok = (|| -> anyhow::Result<()> {
                std::fs::create_dir_all(&store_dir)?;
                let scratch = store_dir.join(format!(
                    "aporia-doctor-{}.tmp",
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis()
                ));
                std::fs::write(&scratch, b"ok")?;
                let _ = std::fs::remove_file(&scratch);
                Ok(())
            })()
            .is_ok();
            checks.push(serde_json::json!({
                "name": "store_dir_writable",
                "ok": store_ok,
                "message": if store_ok { "store dir is writable" } else { "store dir is not writable" },
                "hint": if store_ok { "" } else { "Set APORIA_STORE_DIR to a writable directory." },
            }));

            let store = FsStore::new(store_dir.clone());
            let cfg = AporiaConfig::load(&store).await;
            let backend_name = cfg.as_ref().map(|c| c.backend.as_str()).unwrap_or("unknown");
            checks.push(serde_json::json!({
                "name": "config_loadable",
                "ok": cfg.is_ok(),
                "error": cfg.as_ref().err().map(|e| e.to_string()),
            }));

            let backend = cfg
                .as_ref()
                .map_err(|e| e.to_string())
                .and_then(|c| ConfiguredBackend::from_config(c).map_err(|e| e.to_string()));
            checks.push(serde_json::json!({
                "name": "backend_configured",
                "ok": backend.is_ok(),
                "model": backend.as_ref().ok().map(|b| b.model().to_string()),
                "error": backend.as_ref().err(),
                "hint": if backend.is_ok() { "" } else {
                    "Set APORIA_OPENAI_COMPAT_BASE_URL (+ APORIA_OPENAI_COMPAT_MODEL), or APORIA_OLLAMA_ENABLE=1."
                },
            }));

            let ok = checks.iter().all(|c| c["ok"].as_bool() == Some(true));
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "aporia",
                "version": env!("CARGO_PKG_VERSION"),
                "elapsed_ms": t0.elapsed().as_millis(),
                "configured": {
                    "backend": backend_name,
                    "backends": {
                        "openai_compat": openai_configured,
                        "openai_compat_api_key": openai_key,
                        "ollama": ollama_enabled,
                    },
                    "store_dir": store_dir.display().to_string(),
                },
                "checks": checks,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("aporia {} ({})", env!("CARGO_PKG_VERSION"), if ok { "ok" } else { "issues found" });
                    for c in &checks {
                        println!(
                            "  [{}] {}",
                            if c["ok"].as_bool() == Some(true) { "ok" } else { "!!" },
                            c["name"].as_str().unwrap_or("")
                        );
                    }
                }
                _ => println!("{v}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "aporia",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("aporia {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }

    Ok(())
}
