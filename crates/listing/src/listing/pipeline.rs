//! The record pipeline: filter, group, sort, paginate, materialise and
//! bind row forms.

use std::collections::HashSet;
use std::sync::Arc;

use listing_render::json_to_text;
use serde_json::{Map, Value};
use tracing::debug;

use super::BoundListing;
use crate::columns::{Column, EditOptions};
use crate::error::{ListingError, Result};
use crate::form::BoundForm;
use crate::manager::{ordering_for, resolve_relations, RecordManager, SequenceStore};
use crate::paginator::{clamp_per_page, Page, Paginator};
use crate::record::Record;
use crate::store::DataStore;

/// Name of the inline edit form of a row.
pub const ROW_FORM_NAME: &str = "row_form";

/// Result of the pipeline for the current request.
pub(crate) struct Prepared {
    /// The listing store, or the group-by projection.
    pub(crate) store: Arc<dyn DataStore>,
    pub(crate) lookups: Vec<(String, Value)>,
    pub(crate) ordering: Vec<String>,
    pub(crate) count: usize,
    pub(crate) paginator: Paginator,
    pub(crate) page: Page,
    pub(crate) records: Vec<Record>,
}

impl Prepared {
    pub(crate) fn manager(&self) -> RecordManager<'_> {
        RecordManager::new(self.store.as_ref(), self.lookups.clone(), self.ordering.clone())
    }
}

/// Replaces resolved relation objects by their key, for form initials.
fn form_initial(value: Value) -> Value {
    match value {
        Value::Object(map) if map.contains_key("pk") => map.get("pk").cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(items.into_iter().map(form_initial).collect()),
        other => other,
    }
}

impl<'r> BoundListing<'r> {
    /// Runs the record pipeline once; later calls reuse the page until an
    /// action invalidates it.
    pub fn render_init(&mut self) -> Result<()> {
        if self.prepared.is_some() {
            return Ok(());
        }
        let (store, lookups) = self.data_view()?;
        let ordering = self.ordering();
        let manager = RecordManager::new(store.as_ref(), lookups.clone(), ordering.clone());
        let count = manager.count()?;

        let per_page = clamp_per_page(self.options.per_page, self.options.per_page_max());
        let paginator = Paginator::new(
            Paginator::resolve_params(&self.layers())?,
            count,
            per_page,
            self.options.orphans(),
            self.options.allow_empty_first_page,
        );
        let page = paginator.get_page(self.params.opt_str("page").as_deref());

        let rows = manager.page_rows(&page)?;
        let mut records = manager.materialize(rows, &page, count);
        if self.group_by.is_none() && self.model.is_some() {
            resolve_relations(self.store.as_ref(), &mut records, &self.selected)?;
        }
        self.mark_selection(&mut records);
        if self.options.is_editing() {
            self.bind_row_forms(&mut records)?;
        }
        debug!(
            listing = %self.id,
            count,
            per_page,
            page = page.number,
            rows = records.len(),
            ordering = ?ordering,
            "record pipeline done"
        );
        self.prepared = Some(Prepared {
            store,
            lookups,
            ordering,
            count,
            paginator,
            page,
            records,
        });
        Ok(())
    }

    /// Number of filtered rows; runs the pipeline when needed.
    pub fn count(&mut self) -> Result<usize> {
        self.render_init()?;
        Ok(self.prepared.as_ref().map(|p| p.count).unwrap_or(0))
    }

    /// Records of the current page; runs the pipeline when needed.
    pub fn records(&mut self) -> Result<&[Record]> {
        self.render_init()?;
        Ok(self.prepared.as_ref().map(|p| p.records.as_slice()).unwrap_or(&[]))
    }

    /// The current page; runs the pipeline when needed.
    pub fn page(&mut self) -> Result<Page> {
        self.render_init()?;
        self.prepared
            .as_ref()
            .map(|p| p.page)
            .ok_or_else(|| ListingError::config("record pipeline did not run"))
    }

    pub(crate) fn take_prepared(&mut self) -> Result<Prepared> {
        self.render_init()?;
        self.prepared
            .take()
            .ok_or_else(|| ListingError::config("record pipeline did not run"))
    }

    /// Forgets the current page so the next render reads the store again.
    pub fn invalidate(&mut self) {
        self.prepared = None;
    }

    /// The store and lookups the page is read from. Grouping projects the
    /// filtered rows into a sequence first.
    fn data_view(&self) -> Result<(Arc<dyn DataStore>, Vec<(String, Value)>)> {
        let lookups = self.filters.lookups(self.spec.filter_lookups.as_ref());
        let Some(group_by) = &self.group_by else {
            return Ok((Arc::clone(&self.store), lookups));
        };
        let filtered = RecordManager::new(self.store.as_ref(), lookups, vec!["pk".to_string()]).all()?;
        let rows = group_by.project(&filtered, &self.all_columns);
        debug!(listing = %self.id, groups = rows.len(), "grouped rows");
        let store = SequenceStore::new("group_by", "id", rows)?;
        Ok((Arc::new(store), Vec::new()))
    }

    /// `force_order_by` wins over the requested sort.
    pub(super) fn ordering(&self) -> Vec<String> {
        let mut forced = self.params.list("force_order_by");
        if !forced.is_empty() {
            forced.push("pk".to_string());
            return forced;
        }
        let refs: Vec<&Column> = self.columns.iter().collect();
        ordering_for(&self.sort, &refs)
    }

    fn mark_selection(&self, records: &mut [Record]) {
        let keys: HashSet<String> = self.selected_rows().into_iter().collect();
        if keys.is_empty() {
            return;
        }
        for rec in records.iter_mut() {
            let key = rec
                .get(&self.options.selection_key)
                .map(|v| json_to_text(&v))
                .unwrap_or_else(|| rec.pk_text());
            rec.set_selected(keys.contains(&key));
        }
    }

    /// Gives each edited record its inline form; a posted form that failed
    /// validation is reused so its errors show.
    fn bind_row_forms(&mut self, records: &mut [Record]) -> Result<()> {
        let only = self.params.opt_str("editing_row_pk");
        for rec in records.iter_mut() {
            let pk = rec.pk_text();
            if only.as_deref().is_some_and(|p| p != pk) {
                continue;
            }
            let form = match self.inline_forms.remove(&pk) {
                Some(form) => form,
                None => self.row_form(rec)?,
            };
            rec.set_form(form);
        }
        Ok(())
    }

    /// Inline edit form of one row, with fields named `<col>_<pk><suffix>`.
    pub(crate) fn row_form(&self, rec: &Record) -> Result<BoundForm> {
        let opts = EditOptions {
            theme: &self.theme,
            relax_required: false,
            store: Some(self.store.as_ref()),
        };
        let mut fields = Vec::new();
        let mut initial = Map::new();
        for col in self.selected.iter().filter(|c| c.can_edit()) {
            fields.push(col.edit_field(&opts)?);
            let value = rec.get(col.data_key()).map(form_initial).unwrap_or(Value::Null);
            initial.insert(col.name().to_string(), value);
        }
        Ok(BoundForm::new(ROW_FORM_NAME, fields)
            .with_name_suffix(format!("_{}{}", rec.pk_text(), self.suffix))
            .with_initial(initial))
    }
}
