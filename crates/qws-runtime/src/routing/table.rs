use std::collections::BTreeMap;

use qws_core::Result;

use super::pattern::{split_path, Pattern};

/// Parameters extracted for a resolved route.
///
/// Path and query parameters live in separate maps, so a query key can never
/// shadow a path parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub path: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RouteParams {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<H> {
    pub pattern: String,
    pub handler: H,
    pub params: RouteParams,
}

struct Route<H> {
    pattern: Pattern,
    handler: H,
}

/// Ordered route table.
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H: Clone> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pattern: &str, handler: H) -> Result<()> {
        let pattern = Pattern::parse(pattern)?;
        self.routes.push(Route { pattern, handler });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.pattern.as_str())
    }

    /// Most specific match wins; among equals, the first registered.
    /// `query` may carry a leading `?`.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<RouteMatch<H>> {
        let segments: Vec<&str> = split_path(path).collect();

        let mut best: Option<(&Route<H>, (bool, Vec<u8>), Vec<(String, &str)>)> = None;
        for route in &self.routes {
            let Some(bound) = route.pattern.matches(&segments) else {
                continue;
            };
            let key = route.pattern.specificity();
            let better = match &best {
                None => true,
                Some((_, best_key, _)) => key > *best_key,
            };
            if better {
                best = Some((route, key, bound));
            }
        }

        let (route, _, bound) = best?;
        let path = bound
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();

        Some(RouteMatch {
            pattern: route.pattern.as_str().to_string(),
            handler: route.handler.clone(),
            params: RouteParams {
                path,
                query: parse_query(query),
            },
        })
    }
}

/// `a=1&b=x%20y` -> {a: "1", b: "x y"}; repeated keys keep the last value.
pub fn parse_query(query: Option<&str>) -> BTreeMap<String, String> {
    let Some(q) = query else {
        return BTreeMap::new();
    };
    let q = q.strip_prefix('?').unwrap_or(q);
    url::form_urlencoded::parse(q.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
