//! The request model the pipeline reads from.
//!
//! A [`Request`] carries the parsed query string, the form body, a few
//! headers, the authenticated principal and a shared [`Session`]. It also
//! owns the suffix registry that keeps several listings on one page apart:
//! the first listing bound to a request gets `""`, the next ones `-1`,
//! `-2`, and so on.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::message::Message;
use crate::querydict::QueryDict;

/// HTTP method, reduced to what the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// The authenticated user and the permissions it holds.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub username: String,
    permissions: HashSet<String>,
    superuser: bool,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn superuser(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            superuser: true,
            ..Default::default()
        }
    }

    pub fn with_permission(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    pub fn has_perm(&self, perm: &str) -> bool {
        self.superuser || self.permissions.contains(perm)
    }

    /// Permissions from `perms` this principal lacks.
    pub fn missing_perms(&self, perms: &[String]) -> Vec<String> {
        perms.iter().filter(|p| !self.has_perm(p)).cloned().collect()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    flash: HashMap<String, Vec<Value>>,
    messages: Vec<Message>,
}

/// Client session shared between the requests of one client.
///
/// Holds the one-shot flash sets (primary keys processed by the last action
/// of each listing) and the message queue.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the flash set for `listing_id`.
    pub fn set_flash(&self, listing_id: &str, pks: Vec<Value>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.flash.insert(listing_id.to_string(), pks);
    }

    /// Returns the flash set for `listing_id` and clears it.
    pub fn take_flash(&self, listing_id: &str) -> Vec<Value> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.flash.remove(listing_id).unwrap_or_default()
    }

    /// Returns the flash set without consuming it.
    pub fn peek_flash(&self, listing_id: &str) -> Vec<Value> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.flash.get(listing_id).cloned().unwrap_or_default()
    }

    pub fn add_message(&self, message: Message) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.messages.push(message);
    }

    pub fn take_messages(&self) -> Vec<Message> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut state.messages)
    }

    pub fn messages(&self) -> Vec<Message> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.messages.clone()
    }
}

#[derive(Debug, Default, Clone)]
struct SuffixRegistry {
    assigned: Vec<(u64, String)>,
}

impl SuffixRegistry {
    fn suffix_for(&mut self, key: u64) -> String {
        if let Some((_, suffix)) = self.assigned.iter().find(|(k, _)| *k == key) {
            return suffix.clone();
        }
        let suffix = match self.assigned.len() {
            0 => String::new(),
            n => format!("-{}", n),
        };
        debug!(listing = key, suffix = %suffix, "assigned listing suffix");
        self.assigned.push((key, suffix.clone()));
        suffix
    }

    fn force(&mut self, key: u64, suffix: &str) {
        self.assigned.retain(|(k, _)| *k != key);
        self.assigned.push((key, suffix.to_string()));
    }
}

/// An inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: QueryDict,
    post: QueryDict,
    headers: Vec<(String, String)>,
    principal: Option<Principal>,
    session: Session,
    suffixes: RefCell<SuffixRegistry>,
}

impl Request {
    /// Builds a request from a path with an optional query string.
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, QueryDict::parse(query)),
            None => (url, QueryDict::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            post: QueryDict::new(),
            headers: Vec::new(),
            principal: None,
            session: Session::new(),
            suffixes: RefCell::new(SuffixRegistry::default()),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url)
    }

    /// A POST with an urlencoded body.
    pub fn post(url: &str, body: &str) -> Self {
        let mut req = Self::new(Method::Post, url);
        req.post = QueryDict::parse(body);
        req
    }

    pub fn with_form(mut self, form: QueryDict) -> Self {
        self.post = form;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Marks the request as asynchronous.
    pub fn ajax(self) -> Self {
        self.with_header("X-Requested-With", "XMLHttpRequest")
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::Post
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &QueryDict {
        &self.query
    }

    pub fn form(&self) -> &QueryDict {
        &self.post
    }

    pub fn form_mut(&mut self) -> &mut QueryDict {
        &mut self.post
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Path plus query string, as the client sent it.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.urlencode())
        }
    }

    /// A request parameter. The form body wins over the query string.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.post.get(key).or_else(|| self.query.get(key))
    }

    /// All values of a parameter, form body first.
    pub fn param_list(&self, key: &str) -> Vec<&str> {
        let posted = self.post.get_list(key);
        if posted.is_empty() {
            self.query.get_list(key)
        } else {
            posted
        }
    }

    /// Drops the form body and turns the request into a GET.
    pub fn clear_form(&mut self) {
        self.post = QueryDict::new();
        self.method = Method::Get;
    }

    /// Suffix for the listing instance identified by `key`. Stable for the
    /// lifetime of the request.
    pub fn suffix_for(&self, key: u64) -> String {
        self.suffixes.borrow_mut().suffix_for(key)
    }

    /// Pins a suffix, used when a posted `listing_suffix` names it.
    pub fn force_suffix(&self, key: u64, suffix: &str) {
        self.suffixes.borrow_mut().force(key, suffix);
    }
}
