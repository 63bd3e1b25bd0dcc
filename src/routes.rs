//! Hosting platform route configuration.
//!
//! Generates `staticwebapp.config.json` at the root of the distributable tree:
//!
//! ```json
//! {
//!   "trailingSlash": "never",
//!   "routes": [
//!     { "route": "/static/*", "headers": { "cache-control": "public, max-age=31536000, immutable" } },
//!     { "route": "/__config_info", "headers": { "x-build-date": "…", "x-config-owner": "…" } },
//!     { "route": "/catalogs/<id>/templates/*", "headers": { "cache-control": "public, max-age=3600" } },
//!     { "route": "/*", "headers": { "cache-control": "no-cache, no-store, must-revalidate" } }
//!   ],
//!   "navigationFallback": {
//!     "rewrite": "/index.html",
//!     "exclude": ["/assets/*.{js,css,png,jpg,gif,svg,ico}", "/static_templates/*.{html}", "/catalogs/<id>/templates/*"]
//!   }
//! }
//! ```
//!
//! The platform applies the first matching rule, so per-catalog template rules
//! sit before the catch-all `/*`. They are also excluded from navigation
//! fallback so prerendered snapshots are served as files instead of being
//! rewritten to the app shell.

use crate::config::HostingConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Catch-all route pattern. Always the last rule.
pub const CATCH_ALL_ROUTE: &str = "/*";

/// Navigation-fallback excludes that do not depend on the catalog set.
pub const STATIC_FALLBACK_EXCLUDES: &[&str] = &[
    "/assets/*.{js,css,png,jpg,gif,svg,ico}",
    "/static_templates/*.{html}",
];

#[derive(Error, Debug)]
pub enum RouteConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub trailing_slash: String,
    pub routes: Vec<RouteRule>,
    pub navigation_fallback: NavigationFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    pub route: String,
    pub headers: BTreeMap<String, String>,
}

impl RouteRule {
    fn new(route: impl Into<String>, headers: &[(&str, String)]) -> Self {
        Self {
            route: route.into(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationFallback {
    pub rewrite: String,
    pub exclude: Vec<String>,
}

/// Route pattern covering every template snapshot of one catalog.
pub fn template_route_pattern(catalog_id: &str) -> String {
    format!("/catalogs/{catalog_id}/templates/*")
}

/// Build the hosting configuration for `catalog_ids`.
///
/// Pure: the build timestamp is passed in.
pub fn generate_route_config(
    catalog_ids: &[String],
    hosting: &HostingConfig,
    build_date: DateTime<Utc>,
) -> RouteConfig {
    let catalog_patterns: Vec<String> = catalog_ids
        .iter()
        .map(|id| template_route_pattern(id))
        .collect();

    let mut routes = vec![
        RouteRule::new(
            "/static/*",
            &[(
                "cache-control",
                format!("public, max-age={}, immutable", hosting.static_max_age),
            )],
        ),
        RouteRule::new(
            hosting.info_route.as_str(),
            &[
                (
                    "x-build-date",
                    build_date.to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                ("x-config-owner", hosting.config_owner.clone()),
            ],
        ),
    ];
    routes.extend(catalog_patterns.iter().map(|pattern| {
        RouteRule::new(
            pattern.as_str(),
            &[(
                "cache-control",
                format!("public, max-age={}", hosting.template_max_age),
            )],
        )
    }));
    routes.push(RouteRule::new(
        CATCH_ALL_ROUTE,
        &[(
            "cache-control",
            "no-cache, no-store, must-revalidate".to_string(),
        )],
    ));

    let exclude = STATIC_FALLBACK_EXCLUDES
        .iter()
        .map(|s| s.to_string())
        .chain(catalog_patterns)
        .collect();

    RouteConfig {
        trailing_slash: "never".to_string(),
        routes,
        navigation_fallback: NavigationFallback {
            rewrite: hosting.fallback_document.clone(),
            exclude,
        },
    }
}

/// Write the configuration to `<dist_root>/<hosting.config_file>`.
pub fn write_route_config(
    dist_root: &Path,
    hosting: &HostingConfig,
    config: &RouteConfig,
) -> Result<PathBuf, RouteConfigError> {
    fs::create_dir_all(dist_root)?;
    let path = dist_root.join(&hosting.config_file);
    fs::write(&path, serde_json::to_string_pretty(config)?)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn build_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()
    }

    fn ids() -> Vec<String> {
        vec!["cat-a".to_string(), "cat-b".to_string()]
    }

    fn position(config: &RouteConfig, route: &str) -> usize {
        config
            .routes
            .iter()
            .position(|r| r.route == route)
            .unwrap_or_else(|| panic!("route {route} missing"))
    }

    #[test]
    fn catalog_rules_precede_catch_all() {
        let config = generate_route_config(&ids(), &HostingConfig::default(), build_date());
        let catch_all = position(&config, CATCH_ALL_ROUTE);
        assert_eq!(catch_all, config.routes.len() - 1);
        for id in ids() {
            assert!(position(&config, &template_route_pattern(&id)) < catch_all);
        }
    }

    #[test]
    fn catalog_patterns_are_excluded_from_fallback() {
        let config = generate_route_config(&ids(), &HostingConfig::default(), build_date());
        for id in ids() {
            assert!(
                config
                    .navigation_fallback
                    .exclude
                    .contains(&template_route_pattern(&id))
            );
        }
        assert_eq!(
            &config.navigation_fallback.exclude[..2],
            STATIC_FALLBACK_EXCLUDES
        );
    }

    #[test]
    fn fixed_rules_present_without_catalogs() {
        let config = generate_route_config(&[], &HostingConfig::default(), build_date());
        let routes: Vec<&str> = config.routes.iter().map(|r| r.route.as_str()).collect();
        assert_eq!(routes, vec!["/static/*", "/__config_info", "/*"]);
        assert_eq!(config.navigation_fallback.rewrite, "/index.html");
        assert_eq!(config.trailing_slash, "never");
    }

    #[test]
    fn headers_carry_cache_policy_and_build_info() {
        let config = generate_route_config(&ids(), &HostingConfig::default(), build_date());
        assert_eq!(
            config.routes[0].headers["cache-control"],
            "public, max-age=31536000, immutable"
        );
        assert_eq!(
            config.routes[1].headers["x-build-date"],
            "2026-03-01T12:30:00.000Z"
        );
        assert_eq!(config.routes[1].headers["x-config-owner"], "swa-build-demo");
        assert_eq!(config.routes[2].headers["cache-control"], "public, max-age=3600");
        assert_eq!(
            config.routes.last().unwrap().headers["cache-control"],
            "no-cache, no-store, must-revalidate"
        );
    }

    #[test]
    fn serializes_with_platform_field_names() {
        let config = generate_route_config(&ids(), &HostingConfig::default(), build_date());
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["trailingSlash"], "never");
        assert!(json["navigationFallback"]["exclude"].is_array());
        assert_eq!(json["routes"][0]["route"], "/static/*");
    }

    #[test]
    fn write_route_config_creates_file() {
        let tmp = TempDir::new().unwrap();
        let hosting = HostingConfig::default();
        let config = generate_route_config(&ids(), &hosting, build_date());

        let path = write_route_config(tmp.path(), &hosting, &config).unwrap();
        assert_eq!(path, tmp.path().join("staticwebapp.config.json"));
        let parsed: RouteConfig = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
