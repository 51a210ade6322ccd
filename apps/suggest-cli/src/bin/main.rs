use indicatif::{ProgressBar, ProgressStyle};
use std::{env, fs, path::PathBuf};
use suggest_core::config::{expand_path, Config};
use suggest_core::types::{EntryInput, QueryContext, SuggestRequest};
use suggest_engine::CompletionIndex;
use walkdir::WalkDir;

fn usage(bin: &str) -> ! {
    eprintln!("Usage: {} <pattern> [data_dir] [options]", bin);
    eprintln!("  --regex              match the pattern as a regex over full entries");
    eprintln!("  --fuzzy [N]          allow up to N edits (default from config, max 2)");
    eprintln!("  --size N             number of suggestions to return");
    eprintln!("  --context dim=value[:boost]   constrain/boost a dimension (repeatable)");
    eprintln!("Example: {} 'tim' ./datasets --context city=toronto:3 --size 10", bin);
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.engine();

    let argv: Vec<String> = env::args().collect();
    let bin = argv[0].clone();
    let args: Vec<String> = argv.into_iter().skip(1).collect();
    if args.is_empty() { usage(&bin); }

    let mut pattern = None; let mut data_dir = None;
    let mut regex = false; let mut fuzzy: Option<u8> = None;
    let mut size = settings.default_size; let mut contexts: Vec<(String, String, u32)> = Vec::new();
    let mut i = 0; while i < args.len() { match args[i].as_str() {
        "--regex" => regex = true,
        "--fuzzy" => { fuzzy = Some(settings.default_fuzzy_edits); if i + 1 < args.len() { if let Ok(n) = args[i + 1].parse::<u8>() { fuzzy = Some(n); i += 1; } } }
        "--size" => { if i + 1 < args.len() { if let Ok(n) = args[i + 1].parse::<usize>() { size = n; i += 1; } else { eprintln!("Error: --size requires a number"); std::process::exit(1); } } else { eprintln!("Error: --size requires a number"); std::process::exit(1); } }
        "--context" => { if i + 1 < args.len() { contexts.push(parse_context(&args[i + 1])); i += 1; } else { eprintln!("Error: --context requires dim=value[:boost]"); std::process::exit(1); } }
        _ if args[i].starts_with('-') => usage(&bin),
        _ if pattern.is_none() => pattern = Some(args[i].clone()),
        _ => data_dir = Some(PathBuf::from(&args[i])) } i += 1; }
    let Some(pattern) = pattern else { usage(&bin) };
    let data_dir = data_dir.unwrap_or_else(|| { let dir: String = config.get("data.entries_dir").unwrap_or_else(|_| "./datasets".to_string()); expand_path(dir) });

    println!("Completion Suggester\n====================");
    println!("Data directory: {}", data_dir.display());

    let dimensions = config.dimensions()?;
    if !dimensions.is_empty() { println!("Dimensions: {}", dimensions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")); }
    let mut index = CompletionIndex::new(dimensions)?;

    let files: Vec<PathBuf> = WalkDir::new(&data_dir).into_iter().filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| matches!(e.path().extension().and_then(|x| x.to_str()), Some("jsonl" | "ndjson")))
        .map(|e| e.into_path()).collect();
    if files.is_empty() { eprintln!("Error: no .jsonl/.ndjson files under {}", data_dir.display()); std::process::exit(1); }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::default_bar().template("{bar:40} {pos}/{len} {msg}").unwrap_or_else(|_| ProgressStyle::default_bar()));
    let mut accepted = 0usize; let mut rejected = 0usize; let mut malformed = 0usize;
    for file in &files {
        bar.set_message(file.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string());
        let text = fs::read_to_string(file)?;
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<EntryInput>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) => malformed += 1,
            }
        }
        let report = index.insert_all(entries)?;
        accepted += report.accepted; rejected += report.rejections.len();
        bar.inc(1);
    }
    bar.finish_and_clear();
    index.finalize()?;
    println!("📊 Indexed {} entries from {} files", accepted, files.len());
    if rejected > 0 { println!("⚠️  {} entries rejected (bad contexts or weights)", rejected); }
    if malformed > 0 { println!("⚠️  {} malformed JSON lines skipped", malformed); }

    let mut request = match fuzzy {
        Some(edits) => SuggestRequest::fuzzy(&pattern, edits, size),
        None if regex => SuggestRequest::regex(&pattern, size),
        None => SuggestRequest::prefix(&pattern, size),
    };
    for (dim, value, boost) in contexts { request = merge_context(request, dim, QueryContext::boosted(value, boost)); }

    let results = index.search(&request)?;
    println!("\n🔍 Found {} suggestions for: \"{}\"", results.len(), pattern);
    for (i, suggestion) in results.iter().enumerate() {
        println!("  {}. score={}  {}", i + 1, suggestion.score, suggestion.text);
    }
    Ok(())
}

fn parse_context(raw: &str) -> (String, String, u32) {
    let Some((dim, rest)) = raw.split_once('=') else {
        eprintln!("Error: --context expects dim=value[:boost], got '{}'", raw);
        std::process::exit(1);
    };
    let (value, boost) = match rest.rsplit_once(':') {
        Some((value, boost_str)) => match boost_str.parse::<u32>() {
            Ok(boost) => (value, boost),
            // Geo values like "43.66,-79.38" contain no boost suffix.
            Err(_) => (rest, 1),
        },
        None => (rest, 1),
    };
    (dim.to_string(), value.to_string(), boost)
}

fn merge_context(mut request: SuggestRequest, dim: String, qc: QueryContext) -> SuggestRequest {
    request.contexts.entry(dim).or_default().push(qc);
    request
}
