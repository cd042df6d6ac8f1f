//! Routes a request to the listings of a page.
//!
//! A [`ListingView`] owns the listings shown on one page. A GET binds each
//! of them in declaration order, so suffixes come out as `""`, `"-1"`, ...
//! and the rendered page concatenates their HTML. A listing whose
//! parameters ask for an export short-circuits the page and answers with a
//! download instead.
//!
//! A POST names its target through the `listing_id` and `listing_suffix`
//! hidden fields. Only the target processes the action; the response then
//! depends on the outcome and on how the request was sent:
//!
//! | request | outcome | response |
//! |---------|---------|----------|
//! | async   | any     | [`Response::Json`] envelope |
//! | sync    | success | redirect per the action's redirect policy |
//! | sync    | failure | page rendered with the form errors |

use std::sync::Arc;

use listing::actions::EDIT_MODE_KEYS;
use listing::{
    ActionOutcome, BoundListing, CleanHooks, ExportFormat, Listing, ListingError, RedirectPolicy, Request,
};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, Result};
use crate::response::{AsyncEnvelope, Response};
use crate::serialize::{Codecs, ExportCodec, HtmlCodec};

/// The listings of one page and the hooks shared by them.
#[derive(Debug, Default)]
pub struct ListingView {
    listings: Vec<Listing>,
    hooks: CleanHooks,
    codecs: Codecs,
}

impl ListingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listing. Listings render in the order they are added.
    pub fn listing(mut self, listing: Listing) -> Self {
        self.listings.push(listing);
        self
    }

    /// Clean hooks declared on the view, consulted after the listing's own.
    pub fn hooks(mut self, hooks: CleanHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Registers or replaces the codec for `format`.
    pub fn register_codec(mut self, format: ExportFormat, codec: Arc<dyn ExportCodec>) -> Self {
        self.codecs.register(format, codec);
        self
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// Answers `request`.
    pub fn handle(&self, request: &Request) -> Result<Response> {
        if self.listings.is_empty() {
            return Err(DispatchError::NoListing);
        }
        if request.is_post() {
            self.handle_post(request)
        } else {
            self.handle_get(request)
        }
    }

    fn handle_get(&self, request: &Request) -> Result<Response> {
        let mut bound = self.bind_all(request)?;
        for listing in bound.iter_mut() {
            if let Some(format) = listing.export_format()? {
                return self.export(listing, format);
            }
        }
        render_page(&mut bound)
    }

    fn handle_post(&self, request: &Request) -> Result<Response> {
        let target = self.target(request)?;
        let mut bound = self.bind_all(request)?;
        let outcome = bound[target].process_action(Some(&self.hooks));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(ListingError::Permission { action, missing }) => {
                warn!(listing = %bound[target].id(), %action, ?missing, "action denied");
                return Ok(Response::Denied { action, missing });
            }
            Err(e) => return Err(e.into()),
        };
        let Some(outcome) = outcome else {
            debug!(listing = %bound[target].id(), "post without action");
            return render_page(&mut bound);
        };
        info!(
            listing = %bound[target].id(),
            action = %outcome.action,
            success = outcome.success,
            "action processed"
        );

        if request.is_ajax() {
            return envelope(&mut bound[target], &outcome);
        }
        if !outcome.success {
            return render_page(&mut bound);
        }
        let location = match &outcome.redirect {
            RedirectPolicy::None => {
                drop(bound);
                let mut again = request.clone();
                again.clear_form();
                return self.handle_get(&again);
            }
            RedirectPolicy::SamePage => bound[target].url().get_url(&[], &[], None),
            RedirectPolicy::NoEdit => bound[target].url().get_url(&[], EDIT_MODE_KEYS, None),
            RedirectPolicy::Url(url) => url.clone(),
        };
        debug!(%location, "redirecting after action");
        Ok(Response::Redirect(location))
    }

    /// Index of the listing a POST is aimed at. Pins its posted suffix.
    fn target(&self, request: &Request) -> Result<usize> {
        // natural order first so that pinning one suffix keeps the others
        for listing in &self.listings {
            request.suffix_for(listing.key());
        }
        let form = request.form();
        let Some(posted) = form.get("listing_id").filter(|id| !id.is_empty()) else {
            return match self.listings.len() {
                1 => Ok(0),
                _ => Err(DispatchError::UnknownListing(String::new())),
            };
        };
        let wanted = posted.strip_suffix("-id").unwrap_or(posted);
        for (index, listing) in self.listings.iter().enumerate() {
            if listing.id()? == wanted {
                if let Some(suffix) = form.get("listing_suffix") {
                    request.force_suffix(listing.key(), suffix);
                }
                return Ok(index);
            }
        }
        Err(DispatchError::UnknownListing(wanted.to_string()))
    }

    fn bind_all<'r>(&self, request: &'r Request) -> Result<Vec<BoundListing<'r>>> {
        let bound = self
            .listings
            .iter()
            .map(|listing| listing.bind(request))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bound)
    }

    fn export(&self, listing: &mut BoundListing<'_>, format: ExportFormat) -> Result<Response> {
        let table = listing.export_table(format)?;
        let body = match self.codecs.get(format) {
            Some(codec) => codec.encode(&table)?,
            None if format == ExportFormat::Html => HtmlCodec::new(listing.engine().clone()).encode(&table)?,
            None => self.codecs.encode(&table)?,
        };
        info!(listing = %listing.id(), format = %format, rows = table.rows.len(), "exported");
        Ok(Response::Download {
            filename: table.filename,
            content_type: format.content_type(),
            body,
        })
    }
}

fn render_page(bound: &mut [BoundListing<'_>]) -> Result<Response> {
    let mut html = String::new();
    for listing in bound.iter_mut() {
        html.push_str(&listing.render()?);
        if let Some(form) = listing.render_attached_form()? {
            html.push_str(&form);
        }
    }
    Ok(Response::Html(html))
}

fn envelope(listing: &mut BoundListing<'_>, outcome: &ActionOutcome) -> Result<Response> {
    Ok(Response::Json(AsyncEnvelope {
        listing: Some(listing.render()?),
        attached_form: listing.render_attached_form()?,
        object_pk: outcome.object_pk.clone(),
    }))
}
