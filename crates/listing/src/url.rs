//! URL and hidden-input composition for one listing.
//!
//! Listing state travels in the query string. Keys owned by a listing
//! carry its suffix (`page-1`, `sort-1`, `f_age-1`); every other key of the
//! current URL is preserved untouched.

use listing_render::escape_html;

use crate::querydict::QueryDict;
use crate::request::Request;

/// Query-string keys owned by a listing.
pub const LISTING_QUERY_STRING_KEYS: &[&str] = &[
    "sort",
    "page",
    "per_page",
    "variation",
    "select_columns",
    "theme",
    "export",
    "editing",
    "editing_columns",
    "editing_row_pk",
    "selecting",
    "selected_rows",
    "gb_cols",
    "gb_annotate_cols",
];

/// Keys parsed as integers.
pub const INT_QUERY_STRING_KEYS: &[&str] = &["page", "per_page", "variation", "editing_row_pk"];

/// Prefix of filter input names.
pub const FILTER_QUERYSTRING_PREFIX: &str = "f_";

/// True for keys that get the listing suffix.
pub fn is_listing_key(key: &str) -> bool {
    LISTING_QUERY_STRING_KEYS.contains(&key) || key.starts_with(FILTER_QUERYSTRING_PREFIX)
}

/// The current URL of a request, seen from one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingUrl {
    path: String,
    query: QueryDict,
    suffix: String,
}

impl ListingUrl {
    pub fn new(request: &Request, suffix: &str) -> Self {
        Self {
            path: request.path().to_string(),
            query: request.query().clone(),
            suffix: suffix.to_string(),
        }
    }

    pub fn from_parts(path: &str, query: QueryDict, suffix: &str) -> Self {
        Self {
            path: path.to_string(),
            query,
            suffix: suffix.to_string(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The suffixed form of a key owned by the listing; other keys are
    /// returned unchanged.
    pub fn key(&self, key: &str) -> String {
        if is_listing_key(key) {
            format!("{}{}", key, self.suffix)
        } else {
            key.to_string()
        }
    }

    /// Query after setting `set` and dropping `without`.
    pub fn query_with(&self, set: &[(&str, String)], without: &[&str]) -> QueryDict {
        let mut query = self.query.clone();
        for key in without {
            query.remove(&self.key(key));
        }
        for (key, value) in set {
            query.set(self.key(key), value.clone());
        }
        query
    }

    /// Builds a URL relative to the current one.
    ///
    /// ```rust
    /// use listing::request::Request;
    /// use listing::url::ListingUrl;
    ///
    /// let req = Request::get("/people?page=2&sort-1=age&tab=3");
    /// let url = ListingUrl::new(&req, "-1");
    /// assert_eq!(url.get_url(&[("page", "4".into())], &["sort"], None),
    ///            "/people?page=2&tab=3&page-1=4");
    /// ```
    pub fn get_url(&self, set: &[(&str, String)], without: &[&str], anchor: Option<&str>) -> String {
        let query = self.query_with(set, without);
        let mut url = self.path.clone();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.urlencode());
        }
        if let Some(anchor) = anchor.filter(|a| !a.is_empty()) {
            url.push('#');
            url.push_str(anchor);
        }
        url
    }

    /// Hidden inputs carrying the current query state, minus `without`.
    pub fn hiddens_html(&self, without: &[&str]) -> String {
        let query = self.query_with(&[], without);
        query
            .iter()
            .map(|(k, v)| {
                format!(
                    "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                    escape_html(k),
                    escape_html(v)
                )
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Hidden inputs, additionally dropping keys matching `skip`.
    pub fn hiddens_html_filtered(&self, without: &[&str], skip: impl Fn(&str) -> bool) -> String {
        let query = self.query_with(&[], without);
        query
            .iter()
            .filter(|(k, _)| !skip(k))
            .map(|(k, v)| {
                format!(
                    "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                    escape_html(k),
                    escape_html(v)
                )
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Current value of a listing key.
    pub fn current(&self, key: &str) -> Option<&str> {
        self.query.get(&self.key(key))
    }
}
