//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::SearchArgs;
use crate::gateway;
use geoatlas_core::cache::SystemClock;
use geoatlas_core::config::{init_workspace_config, load_config, load_config_file};
use geoatlas_core::{
    CitationRange, GeoAtlasConfig, PaperRecord, PaperSearchService, SearchError, SearchFilters,
    YearRange,
};
use geoatlas_sources::{MapLayer, Sources};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Search(args) => {
            handle_search(args, &resolve_config(workspace, config_path)?).await
        }
        Commands::Countries { region, json } => {
            handle_countries(region, json, &resolve_config(workspace, config_path)?).await
        }
        Commands::Country { code, json } => {
            handle_country(&code, json, &resolve_config(workspace, config_path)?).await
        }
        Commands::Education { code, json } => {
            handle_education(&code, json, &resolve_config(workspace, config_path)?).await
        }
        Commands::News { query, json } => {
            handle_news(query, json, &resolve_config(workspace, config_path)?).await
        }
        Commands::Layer { name } => {
            handle_layer(&name, &resolve_config(workspace, config_path)?).await
        }
        Commands::Serve { host, port } => {
            handle_serve(host, port, &resolve_config(workspace, config_path)?).await
        }
    }
}

fn resolve_config(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<GeoAtlasConfig> {
    let config = match config_path {
        Some(path) => load_config_file(path)?,
        None => load_config(Some(workspace), None)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?,
    };
    config.validate()?;
    Ok(config)
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = geoatlas_core::config::workspace_config_path(workspace);
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            let path = init_workspace_config(workspace)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = resolve_config(workspace, config_path)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// A token that fires on Ctrl-C, so a hung upstream call can be abandoned.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl SearchArgs {
    fn filters(&self) -> SearchFilters {
        let year_range = match (self.from_year, self.to_year) {
            (None, None) => None,
            (start, end) => Some(YearRange {
                start: start.unwrap_or(0),
                end: end.unwrap_or(9999),
            }),
        };
        SearchFilters {
            topics: self.topics.clone(),
            year_range,
            academic_levels: self.levels.iter().copied().collect(),
            open_access_only: self.open_access,
            citation_range: CitationRange {
                min: self.min_citations.unwrap_or(0),
                max: self.max_citations.unwrap_or(u64::MAX),
            },
            methodologies: self.methodologies.iter().copied().collect(),
            subfields: self.subfields.iter().cloned().collect(),
            geography_focus: !self.no_geography_focus,
            sort_by: self.sort,
        }
    }
}

fn format_paper(index: usize, paper: &PaperRecord) -> String {
    let year = match paper.publication_year() {
        0 => "n.d.".to_string(),
        y => y.to_string(),
    };
    let mut lines = vec![format!("{:>2}. {} ({})", index, paper.title, year)];

    let authors: Vec<&str> = paper.authors.iter().take(3).map(|a| a.name.as_str()).collect();
    let mut meta = Vec::new();
    if !authors.is_empty() {
        let more = if paper.authors.len() > 3 { " et al." } else { "" };
        meta.push(format!("{}{}", authors.join(", "), more));
    }
    if let Some(ref venue) = paper.venue {
        meta.push(venue.clone());
    }
    meta.push(format!("{} citations", paper.citation_count));
    meta.push(format!("{} access", paper.open_access));
    lines.push(format!("    {}", meta.join(" | ")));

    let mut detail = Vec::new();
    if let Some(level) = paper.academic_level {
        detail.push(format!("level: {}", level));
    }
    if let Some(ref method) = paper.methodology {
        detail.push(format!("method: {}", method));
    }
    if let Some(minutes) = paper.estimated_reading_time {
        detail.push(format!("~{} min read", minutes));
    }
    if let Some(fresh) = paper.freshness_score {
        detail.push(format!("freshness {:.2}", fresh));
    }
    if !detail.is_empty() {
        lines.push(format!("    {}", detail.join(" | ")));
    }
    if let Some(ref url) = paper.url {
        lines.push(format!("    {}", url));
    }
    lines.join("\n")
}

async fn handle_search(args: SearchArgs, config: &GeoAtlasConfig) -> anyhow::Result<()> {
    let sources = Sources::from_config(config)?;
    let service = PaperSearchService::new(sources.papers, Arc::new(SystemClock), &config.research)?;
    let query = args.query.join(" ");
    let filters = args.filters();

    let outcome = match service.search(&query, &filters, &cancel_on_ctrl_c()).await {
        Ok(outcome) => outcome,
        Err(SearchError::Cancelled) => {
            eprintln!("Search cancelled.");
            return Ok(());
        }
    };

    if args.json {
        return print_json(&outcome);
    }
    if let Some(ref issue) = outcome.error {
        println!("{}", issue.message());
    }
    for (i, paper) in outcome.results.iter().take(args.limit).enumerate() {
        println!("{}\n", format_paper(i + 1, paper));
    }
    if outcome.results.len() > args.limit {
        println!(
            "Showing {} of {} papers (use -n to see more).",
            args.limit,
            outcome.results.len()
        );
    }
    Ok(())
}

async fn handle_countries(
    region: Option<String>,
    json: bool,
    config: &GeoAtlasConfig,
) -> anyhow::Result<()> {
    let sources = Sources::from_config(config)?;
    let cancel = cancel_on_ctrl_c();
    let countries = match region {
        Some(ref region) => sources.countries.by_region(region, &cancel).await?,
        None => sources.countries.all(&cancel).await?,
    };
    if json {
        return print_json(&countries);
    }
    if countries.is_empty() {
        println!("No countries found.");
        return Ok(());
    }
    for c in &countries {
        println!(
            "{:<4} {:<40} {:<10} {:>14}",
            c.cca3, c.name, c.region, c.population
        );
    }
    println!("{} countries", countries.len());
    Ok(())
}

async fn handle_country(code: &str, json: bool, config: &GeoAtlasConfig) -> anyhow::Result<()> {
    let sources = Sources::from_config(config)?;
    let Some(country) = sources.countries.by_code(code, &cancel_on_ctrl_c()).await? else {
        anyhow::bail!("Unknown country code: {}", code);
    };
    if json {
        return print_json(&country);
    }
    println!("{} ({})", country.name, country.official_name);
    println!("  Codes:      {} / {}", country.cca2, country.cca3);
    if let Some(ref capital) = country.capital {
        println!("  Capital:    {}", capital);
    }
    match country.subregion {
        Some(ref sub) => println!("  Region:     {} / {}", country.region, sub),
        None => println!("  Region:     {}", country.region),
    }
    println!("  Population: {}", country.population);
    if let Some(area) = country.area_km2 {
        println!("  Area:       {:.0} km2", area);
    }
    if let Some(density) = country.population_density() {
        println!("  Density:    {:.1} per km2", density);
    }
    if !country.languages.is_empty() {
        println!("  Languages:  {}", country.languages.join(", "));
    }
    if !country.currencies.is_empty() {
        println!("  Currencies: {}", country.currencies.join(", "));
    }
    Ok(())
}

async fn handle_education(code: &str, json: bool, config: &GeoAtlasConfig) -> anyhow::Result<()> {
    let sources = Sources::from_config(config)?;
    let snapshot = sources
        .world_bank
        .education_snapshot(code, &cancel_on_ctrl_c())
        .await?;
    if json {
        return print_json(&snapshot);
    }
    if snapshot.is_unavailable() {
        anyhow::bail!("Education indicators for {} are unavailable right now", snapshot.country);
    }
    println!("Education indicators for {}", snapshot.country);
    for reading in &snapshot.readings {
        match (reading.value, reading.year) {
            (Some(value), Some(year)) => {
                println!("  {:<50} {:>8.1} ({})", reading.label, value, year)
            }
            _ => println!("  {:<50} {:>8}", reading.label, "n/a"),
        }
    }
    for failure in &snapshot.failures {
        println!("  {:<50} failed: {}", failure.code, failure.message);
    }
    Ok(())
}

async fn handle_news(query: Vec<String>, json: bool, config: &GeoAtlasConfig) -> anyhow::Result<()> {
    let sources = Sources::from_config(config)?;
    let query = query.join(" ");
    let articles = sources
        .news
        .search(Some(&query), &cancel_on_ctrl_c())
        .await?;
    if json {
        return print_json(&articles);
    }
    if articles.is_empty() {
        println!("No articles found.");
    }
    for article in &articles {
        let source = article.source_name.as_deref().unwrap_or("unknown source");
        println!("- {} ({})", article.title, source);
        println!("  {}", article.url);
    }
    Ok(())
}

async fn handle_layer(name: &str, config: &GeoAtlasConfig) -> anyhow::Result<()> {
    let layer: MapLayer = name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let sources = Sources::from_config(config)?;
    let collection = sources
        .layers
        .fetch_layer(layer, &cancel_on_ctrl_c())
        .await?;
    let names = collection.feature_names();
    println!(
        "{}: {} features from {}",
        layer,
        collection.features.len(),
        sources.layers.layer_url(layer)
    );
    for name in names.iter().take(20) {
        println!("  {}", name);
    }
    if names.len() > 20 {
        println!("  ... and {} more", names.len() - 20);
    }
    Ok(())
}

async fn handle_serve(
    host: Option<String>,
    port: Option<u16>,
    config: &GeoAtlasConfig,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let state = Arc::new(gateway::AppState::from_config(config)?);
    println!("GeoAtlas gateway on http://{}:{}", host, port);
    gateway::run(state, &host, port).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoatlas_core::{AcademicLevel, MethodologyCategory, SortBy};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn search_args() -> SearchArgs {
        SearchArgs {
            query: vec!["urban".into(), "heat".into()],
            from_year: None,
            to_year: None,
            levels: Vec::new(),
            open_access: false,
            min_citations: None,
            max_citations: None,
            methodologies: Vec::new(),
            subfields: Vec::new(),
            topics: Vec::new(),
            no_geography_focus: false,
            sort: SortBy::Relevance,
            limit: 10,
            json: false,
        }
    }

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).await.unwrap();

        let config_path = workspace.join(".geoatlas").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: GeoAtlasConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.research.cache_ttl_secs, 300);
        assert_eq!(parsed.server.port, 18790);
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
            None,
        )
        .await
        .unwrap();
        let config_path = workspace.join(".geoatlas").join("config.toml");
        std::fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            workspace,
            None,
        )
        .await
        .unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[server]\nport = 9000\n");
    }

    #[tokio::test]
    async fn test_config_show_with_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[research]\nresult_limit = 20\n").unwrap();
        let config = resolve_config(dir.path(), Some(&path)).unwrap();
        assert_eq!(config.research.result_limit, 20);

        handle_command(
            Commands::Config {
                action: ConfigAction::Show,
            },
            dir.path(),
            Some(&path),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(resolve_config(dir.path(), Some(&missing)).is_err());
    }

    #[test]
    fn test_invalid_config_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[http]\ntimeout_secs = 0\n").unwrap();
        assert!(resolve_config(dir.path(), Some(&path)).is_err());

        std::fs::write(&path, "[research]\ncache_ttl_secs = 100000000000000000\n").unwrap();
        assert!(resolve_config(dir.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_search_args_default_filters() {
        let filters = search_args().filters();
        assert_eq!(filters, SearchFilters::default());
    }

    #[test]
    fn test_search_args_to_filters() {
        let mut args = search_args();
        args.from_year = Some(2015);
        args.levels = vec![AcademicLevel::Graduate, AcademicLevel::Graduate];
        args.methodologies = vec![MethodologyCategory::Qualitative];
        args.open_access = true;
        args.max_citations = Some(100);
        args.no_geography_focus = true;
        args.sort = SortBy::Newest;

        let filters = args.filters();
        assert_eq!(
            filters.year_range,
            Some(YearRange {
                start: 2015,
                end: 9999
            })
        );
        assert_eq!(filters.academic_levels.len(), 1);
        assert!(filters.methodologies.contains(&MethodologyCategory::Qualitative));
        assert!(filters.open_access_only);
        assert_eq!(filters.citation_range, CitationRange { min: 0, max: 100 });
        assert!(!filters.geography_focus);
        assert_eq!(filters.sort_by, SortBy::Newest);
    }

    #[test]
    fn test_format_paper() {
        let mut paper = PaperRecord::new("openalex:W1", "Desert cities");
        paper.publication_date = "2020-05-01".into();
        paper.citation_count = 7;
        paper.methodology = Some("Case study".into());
        paper.estimated_reading_time = Some(2);
        paper.url = Some("https://doi.org/10.1/x".into());
        let text = format_paper(3, &paper);
        assert!(text.starts_with(" 3. Desert cities (2020)"));
        assert!(text.contains("7 citations | closed access"));
        assert!(text.contains("method: Case study | ~2 min read"));
        assert!(text.ends_with("https://doi.org/10.1/x"));
    }
}
