//! Shareable query links.
//!
//! A link carries the selected prebuilt query id (`tab`) and the raw SQL
//! (`query`) as parameters of the client-side routing fragment:
//!
//! ```text
//! #/sql-studio?tab=top-departments&query=SELECT%201
//! ```

use serde::{Deserialize, Serialize};

/// Route used when the current fragment has none.
pub const DEFAULT_ROUTE: &str = "/sql-studio";

/// The parameters of a shared query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    /// Prebuilt query id.
    pub tab: Option<String>,
    /// SQL text.
    pub query: Option<String>,
}

impl ShareLink {
    pub fn new(tab: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            tab: Some(tab.into()),
            query: Some(query.into()),
        }
    }

    /// Parse the parameters out of a fragment.
    ///
    /// Accepts `#/route?tab=..&query=..`, `?tab=..` and a bare
    /// `tab=..&query=..`. Missing or undecodable parameters are `None`.
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.trim().trim_start_matches('#');
        let params = match fragment.split_once('?') {
            Some((_, params)) => params,
            None if fragment.contains('=') => fragment,
            None => "",
        };

        let mut link = ShareLink::default();
        for pair in params.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let Some(value) = decode_component(value) else {
                continue;
            };
            match key {
                "tab" if !value.is_empty() => link.tab = Some(value),
                "query" if !value.is_empty() => link.query = Some(value),
                _ => {}
            }
        }
        link
    }

    /// Render as a fragment, keeping the route of `current` if it has one.
    pub fn to_fragment(&self, current: Option<&str>) -> String {
        let route = current.map(route_of).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_ROUTE);

        let mut params = Vec::new();
        if let Some(tab) = &self.tab {
            params.push(format!("tab={}", urlencoding::encode(tab)));
        }
        if let Some(query) = &self.query {
            params.push(format!("query={}", urlencoding::encode(query)));
        }

        if params.is_empty() {
            format!("#{}", route)
        } else {
            format!("#{}?{}", route, params.join("&"))
        }
    }

    /// Full URL: `{page_url}{fragment}`, replacing any fragment `page_url`
    /// already has.
    pub fn to_url(&self, page_url: &str) -> String {
        let (base, current) = match page_url.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (page_url, None),
        };
        format!("{}{}", base, self.to_fragment(current))
    }
}

/// The route part of a fragment, without `#` and parameters.
fn route_of(fragment: &str) -> &str {
    let fragment = fragment.trim_start_matches('#');
    fragment.split('?').next().unwrap_or("")
}

/// Form-style decoding: `+` is a space.
fn decode_component(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|v| v.into_owned())
}
