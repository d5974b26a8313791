//! `catalog search`: run the search pipeline from the command line.
//!
//! The arguments are turned into the URL a browser would have requested.
//! When that URL is not canonical the redirect target is printed and the
//! search is re-run on it, exactly as a browser following the redirect.

use anyhow::{bail, Result};
use record_catalog_core::canonical::parse_query;
use record_catalog_core::search::{SearchOutcome, SearchRequest};
use record_catalog_core::shape::ResultViewModel;
use url::form_urlencoded;

use crate::app::App;
use crate::config::Config;

pub async fn run_search(
    config: &Config,
    record_type: Option<String>,
    lang: Option<String>,
    params: Vec<(String, String)>,
) -> Result<()> {
    let app = App::build(config).await?;
    let urls = app.orchestrator().urls();

    let path = match &record_type {
        Some(t) => format!("/{}/search", t),
        None => "/search".to_string(),
    };
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.extend_pairs(params.iter());
    if let Some(lang) = &lang {
        query.append_pair("lang", lang);
    }
    let query = query.finish();
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    };

    let mut request = build_request(&app, record_type, &query, urls.absolute(&path_and_query));

    for _ in 0..2 {
        match app.orchestrator().run_search(&request).await? {
            SearchOutcome::Results(view) => {
                print_results(&view);
                return Ok(());
            }
            SearchOutcome::Redirect(target) => {
                println!("Canonical URL: {}", target);
                println!();
                let relative = target.strip_prefix(urls.base_url()).unwrap_or(&target);
                let (path, query) = relative.split_once('?').unwrap_or((relative, ""));
                let record_type = path
                    .trim_start_matches('/')
                    .strip_suffix("/search")
                    .map(String::from);
                request = build_request(&app, record_type, query, target.clone());
            }
        }
    }

    bail!("search did not settle on a canonical URL")
}

fn build_request(
    app: &App,
    record_type: Option<String>,
    query: &str,
    request_url: String,
) -> SearchRequest {
    let params = parse_query(query);
    let locale = app.locale(params.get("lang").map(String::as_str));
    SearchRequest {
        record_type,
        params,
        request_url,
        locale,
    }
}

fn print_results(view: &ResultViewModel) {
    println!("{}", view.title);
    if !view.breadcrumbs.is_empty() {
        let trail: Vec<&str> = view.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        println!("  {}", trail.join(" > "));
    }
    println!();

    if view.total == 0 {
        println!("No results.");
        return;
    }

    println!("Showing {}-{} of {}", view.start, view.end, view.total);
    println!();

    for facet in &view.facets {
        let buckets: Vec<String> = facet
            .buckets
            .iter()
            .map(|b| format!("{} ({})", b.label, b.count))
            .collect();
        print!("  {}: {}", facet.name, buckets.join(", "));
        match &facet.extra {
            Some(extra) => println!(" (+{} more)", extra.len()),
            None => println!(),
        }
    }
    if !view.facets.is_empty() {
        println!();
    }

    for (i, record) in view.records.iter().enumerate() {
        println!(
            "{}. {} / {}",
            view.start.saturating_add(i as u64),
            record.source,
            record.id
        );
        for (key, value) in &record.fields {
            let display = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            println!("    {}: {}", key, display);
        }
    }

    if let Some(prev) = &view.prev {
        println!();
        println!("prev: {}", prev);
    }
    if let Some(next) = &view.next {
        if view.prev.is_none() {
            println!();
        }
        println!("next: {}", next);
    }
}
