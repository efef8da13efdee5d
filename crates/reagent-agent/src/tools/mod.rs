//! Tool modules for the Reagent agent.
//!
//! [`builtin_registry`] wires every built-in collaborator from the `tools`
//! config section into a fresh [`ToolRegistry`].

use std::sync::Arc;

use anyhow::Context;

use reagent_core::config::schema::ToolsConfig;

pub mod base;
pub mod browser;
pub mod clock;
pub mod crawler;
pub mod html;
pub mod news;
pub mod registry;
pub mod search;

pub use base::{Arguments, Collaborator, ParamKind, ParamSpec, ToolDescriptor};
pub use registry::{RegistryError, ToolRegistry};

use browser::{http_client, BrowserCollaborator};
use clock::ClockCollaborator;
use crawler::CrawlerCollaborator;
use news::NewsCollaborator;
use search::SearchCollaborator;

/// Registry with the clock, browser, crawler, search and news collaborators.
pub fn builtin_registry(config: &ToolsConfig) -> anyhow::Result<ToolRegistry> {
    let client = http_client(&config.web);
    let clock = ClockCollaborator::from_config(&config.clock).context("tools.clock.utcOffset")?;

    let collaborators: Vec<Arc<dyn Collaborator>> = vec![
        Arc::new(clock),
        Arc::new(BrowserCollaborator::new(client.clone(), config.web.max_chars)),
        Arc::new(CrawlerCollaborator::new(client.clone(), config.crawl.max_pages)),
        Arc::new(SearchCollaborator::new(
            client.clone(),
            &config.search.api_key,
            config.search.max_results as usize,
        )),
        Arc::new(NewsCollaborator::new(client, &config.news)),
    ];

    let mut registry = ToolRegistry::new();
    for collaborator in collaborators {
        registry.install(collaborator)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::config::schema::ClockConfig;

    #[test]
    fn test_builtin_registry_tools() {
        let registry = builtin_registry(&ToolsConfig::default()).unwrap();
        let ids: Vec<&str> = registry.descriptors().iter().map(|d| d.tool_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "browse-url",
                "crawl-site",
                "extract-links",
                "format-datetime",
                "from-timestamp",
                "get-date",
                "get-day-info",
                "get-news",
                "get-time",
                "web-search",
            ]
        );
        assert_eq!(registry.resolve("browser.fetch_page").unwrap().tool_id, "browse-url");
        assert_eq!(registry.resolve("news.get_news").unwrap().tool_id, "get-news");
    }

    #[test]
    fn test_bad_clock_offset_is_reported() {
        let config = ToolsConfig {
            clock: ClockConfig {
                utc_offset: "Mars/Olympus".into(),
            },
            ..ToolsConfig::default()
        };
        let err = builtin_registry(&config).unwrap_err();
        assert!(format!("{err:#}").contains("utcOffset"));
    }
}
