use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use korq::config::{CorpusSettings, GrammarDict};
use korq::query::parser::CompiledQuery;
use korq::query::{QueryCompiler, SearchParams, SearchRequest, SentenceQueryBuilder, SortOrder};
use korq::relations::ConstraintMap;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

#[derive(Parser)]
#[command(name = "korq")]
#[command(about = "Corpus search query construction toolkit")]
struct Cli {
    /// Corpus settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grammar category dictionary file (JSON, tag -> category)
    #[arg(long)]
    categories: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one boolean query string into an engine query body
    Compile {
        /// Query string, e.g. "(cat|dog),~mouse"
        query: String,

        /// Indexed field path to query
        #[arg(short, long, default_value = "words.wf")]
        field: String,
    },
    /// Extract and normalize word relation constraints from form fields
    Constraints {
        /// Flat form fields as key=value, e.g. word_rel_1_1=2 word_to_1_1=3
        pairs: Vec<String>,
    },
    /// Build a complete sentence query body from flat form fields
    Build {
        /// Form fields as key=value: wf1=cat lex2=sit word_rel_1_1=2 ...
        pairs: Vec<String>,

        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Page size
        #[arg(long, default_value_t = 10)]
        size: usize,

        /// Random ordering seed
        #[arg(long)]
        seed: Option<u64>,

        /// Engine-native order instead of seeded random
        #[arg(long)]
        plain: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => CorpusSettings::from_file(path)
            .with_context(|| format!("reading corpus settings from {}", path.display()))?,
        None => CorpusSettings::default(),
    };
    let gram_dict = match &cli.categories {
        Some(path) => GrammarDict::from_file(path)
            .with_context(|| format!("reading grammar dictionary from {}", path.display()))?,
        None => GrammarDict::new(HashMap::new()),
    };
    let compiler = QueryCompiler::new(gram_dict);

    match cli.command {
        Commands::Compile { query, field } => {
            match compiler.compile(&query, &field) {
                CompiledQuery::Dropped => println!("{}", json!({"dropped": true})),
                CompiledQuery::Body(body) => {
                    println!("{}", serde_json::to_string_pretty(&body)?)
                }
            }
        }
        Commands::Constraints { pairs } => {
            let form = parse_form(&pairs)?;
            let constraints = ConstraintMap::from_request(&form);
            println!("{}", serde_json::to_string_pretty(&describe(&constraints))?);
        }
        Commands::Build {
            pairs,
            page,
            size,
            seed,
            plain,
        } => {
            let form = parse_form(&pairs)?;
            let constraints = ConstraintMap::from_request(&form);
            let request = request_from_form(&form);
            let params = SearchParams {
                page,
                page_size: size,
                sort: if plain { SortOrder::Plain } else { SortOrder::Random },
                random_seed: seed,
            };
            let builder = SentenceQueryBuilder::new(&compiler, &settings);
            let distances = (!constraints.is_empty()).then_some(&constraints);
            let body = builder.build(&request, distances, &params);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }
    Ok(())
}

fn parse_form(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut form = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("expected key=value, got {pair:?}"))?;
        form.insert(key.to_string(), value.to_string());
    }
    Ok(form)
}

/// Form keys like `wf1`, `lex2`, `gr1` or `gloss3`: a field name followed
/// by the slot number. Relation fields carry digits mid-key and never
/// match.
static RX_SLOT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^([a-zA-Z_]+)([0-9]+)$").unwrap());

fn request_from_form(form: &HashMap<String, String>) -> SearchRequest {
    let mut request = SearchRequest::default();
    for (key, value) in form {
        let Some(caps) = RX_SLOT_FIELD.captures(key) else {
            continue;
        };
        let Ok(slot) = caps[2].parse::<usize>() else {
            continue;
        };
        if slot == 0 {
            continue;
        }
        if request.slots.len() < slot {
            request.slots.resize_with(slot, HashMap::new);
        }
        request.slots[slot - 1].insert(caps[1].to_string(), value.clone());
    }
    if let Some(text) = form.get("text") {
        if !text.is_empty() {
            request.free_text = Some(text.clone());
        }
    }
    request.precise_text = form.get("precise").map(String::as_str) == Some("on");
    request
}

fn describe(constraints: &ConstraintMap) -> Value {
    let pairs: Vec<Value> = constraints
        .iter()
        .map(|(&(a, b), range)| {
            json!({"slots": [a, b], "from": range.from, "to": range.to})
        })
        .collect();
    json!({
        "pairs": pairs,
        "satisfiable": constraints.is_satisfiable(),
        "too_complex": constraints.too_complex(),
        "hub_slot": constraints.hub_slot(),
    })
}
