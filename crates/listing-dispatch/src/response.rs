//! What the view adapter hands back to the host.

use listing_render::escape_html;
use serde::Serialize;
use serde_json::Value;

use crate::serialize::content_disposition;

/// Reply to an asynchronous POST. Absent members are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AsyncEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_form: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_pk: Option<Value>,
}

/// A response, independent of the host framework.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Html(String),
    Json(AsyncEnvelope),
    Redirect(String),
    Download {
        filename: String,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// The principal lacks permissions for the posted action.
    Denied { action: String, missing: Vec<String> },
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Response::Redirect(_) => 302,
            Response::Denied { .. } => 403,
            _ => 200,
        }
    }

    /// Response headers, `Content-Type` first.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            Response::Html(_) | Response::Denied { .. } => {
                vec![("Content-Type", "text/html; charset=utf-8".to_string())]
            }
            Response::Json(_) => vec![("Content-Type", "application/json".to_string())],
            Response::Redirect(url) => vec![("Location", url.clone())],
            Response::Download {
                filename, content_type, ..
            } => vec![
                ("Content-Type", content_type.to_string()),
                ("Content-Disposition", content_disposition(filename)),
            ],
        }
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers()
            .into_iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// The response body.
    pub fn body(&self) -> Vec<u8> {
        match self {
            Response::Html(html) => html.clone().into_bytes(),
            // serializing a struct of strings and a JSON value cannot fail
            Response::Json(envelope) => serde_json::to_vec(envelope).unwrap_or_default(),
            Response::Redirect(_) => Vec::new(),
            Response::Download { body, .. } => body.clone(),
            Response::Denied { action, missing } => format!(
                "<p class=\"permission-denied\">You are not allowed to {}: missing {}.</p>",
                escape_html(action),
                escape_html(&missing.join(", "))
            )
            .into_bytes(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_skips_missing_members() {
        let env = AsyncEnvelope {
            listing: Some("<div></div>".into()),
            attached_form: None,
            object_pk: Some(json!(4)),
        };
        let body = Response::Json(env).text();
        assert_eq!(body, r#"{"listing":"<div></div>","object_pk":4}"#);
    }

    #[test]
    fn test_download_headers() {
        let resp = Response::Download {
            filename: "people.csv".into(),
            content_type: "text/csv",
            body: b"a\n".to_vec(),
        };
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.header("content-type").as_deref(), Some("text/csv"));
        assert_eq!(
            resp.header("Content-Disposition").as_deref(),
            Some("attachment; filename=\"people.csv\"")
        );
    }

    #[test]
    fn test_redirect() {
        let resp = Response::Redirect("/people/?page=2".into());
        assert_eq!(resp.status(), 302);
        assert_eq!(resp.header("Location").as_deref(), Some("/people/?page=2"));
        assert!(resp.body().is_empty());
    }
}
