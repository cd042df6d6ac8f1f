//! The action state machine of a bound listing.

use std::sync::Arc;

use listing_render::json_to_text;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{posted_action, posted_pks, BoundListing};
use crate::actions::{
    check_permission, parse_pks, required_permissions, success_message, Action, ActionInput, ActionOutcome,
    RedirectPolicy,
};
use crate::columns::{ButtonPress, ColumnKind, RowButton};
use crate::error::{ListingError, Result};
use crate::hooks::CleanHooks;
use crate::manager::RecordManager;
use crate::record::Record;
use crate::store::StoreQuery;

/// Drops null and empty-string values: bulk writes only touch the fields
/// the user filled.
fn non_empty(changes: Map<String, Value>) -> Map<String, Value> {
    changes
        .into_iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
        .collect()
}

/// What a successful write reports back.
struct Written {
    processed: Vec<Value>,
    count: usize,
    object_label: String,
    object_pk: Option<Value>,
}

impl Written {
    fn none() -> Self {
        Self {
            processed: Vec::new(),
            count: 0,
            object_label: String::new(),
            object_pk: None,
        }
    }
}

impl<'r> BoundListing<'r> {
    /// Runs the action posted with the request, if any.
    ///
    /// Permissions are checked before anything is cleaned or written. A
    /// form that fails validation gives an unsuccessful outcome and keeps
    /// its errors for the next render. On success the affected rows are
    /// remembered for the flash highlight, a message is queued and the
    /// current page is dropped so the next render reads the new state.
    pub fn process_action(&mut self, view_hooks: Option<&CleanHooks>) -> Result<Option<ActionOutcome>> {
        let Some(action) = posted_action(self.request) else {
            return Ok(None);
        };
        let custom = match &action {
            Action::Custom(name) => Some(
                self.spec
                    .custom_actions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ListingError::config(format!("unknown action '{}'", name)))?,
            ),
            _ => None,
        };
        let required = required_permissions(&self.params, &action, self.model.as_ref(), custom.as_ref());
        check_permission(self.request.principal(), required.as_deref(), &action)?;
        debug!(listing = %self.id, action = %action, "processing action");

        let request: &'r crate::request::Request = self.request;
        let form = request.form();
        let selected_pks = posted_pks(request, &self.suffix);
        let object_pk = form.get("object_pk").and_then(|v| parse_pks([v]).into_iter().next());
        let mut outcome = ActionOutcome::failed(action.clone());
        outcome.redirect =
            RedirectPolicy::from_value(self.params.get(&format!("{}_success_redirect_url", action.name())));
        let attached_posted = self.attached_form.as_ref().is_some_and(|f| f.is_posted());

        let written = match &action {
            Action::Clear => {
                if let Some(form) = self.attached_form.as_mut() {
                    form.clear();
                }
                Written::none()
            }
            Action::Reset => Written::none(),
            Action::Update if !attached_posted => {
                match self.inline_update(&selected_pks, view_hooks)? {
                    Some(written) => written,
                    None => return Ok(Some(outcome)),
                }
            }
            Action::Insert => match self.cleaned_form(view_hooks, true) {
                Some(cleaned) => self.insert(cleaned)?,
                None => return Ok(Some(outcome)),
            },
            Action::Update => {
                let targets = self.targets(&selected_pks, object_pk.as_ref());
                match self.cleaned_form(view_hooks, true) {
                    Some(_) if targets.is_empty() => {
                        self.reject("No row selected.");
                        return Ok(Some(outcome));
                    }
                    Some(cleaned) => self.update(&targets, cleaned)?,
                    None => return Ok(Some(outcome)),
                }
            }
            Action::UpdateAll => match self.cleaned_form(view_hooks, true) {
                Some(cleaned) => self.update_all(cleaned)?,
                None => return Ok(Some(outcome)),
            },
            Action::Duplicate => {
                let targets = self.targets(&selected_pks, object_pk.as_ref());
                let [source] = targets.as_slice() else {
                    self.reject("Select exactly one row to duplicate.");
                    return Ok(Some(outcome));
                };
                match self.cleaned_form(view_hooks, false) {
                    Some(cleaned) => self.duplicate(source, cleaned)?,
                    None => return Ok(Some(outcome)),
                }
            }
            Action::Delete => {
                let targets = self.targets(&selected_pks, object_pk.as_ref());
                if targets.is_empty() {
                    self.reject("No row selected.");
                    return Ok(Some(outcome));
                }
                self.delete(StoreQuery::new().pk_in(&targets))?
            }
            Action::DeleteAll => self.delete(self.filtered_query())?,
            Action::RowButton => return self.press_row_button().map(Some),
            Action::Custom(name) => {
                let Some(cleaned) = self.cleaned_form(view_hooks, false) else {
                    return Ok(Some(outcome));
                };
                let custom = custom.ok_or_else(|| ListingError::config(format!("unknown action '{}'", name)))?;
                let store = Arc::clone(&self.store);
                let input = ActionInput {
                    action: name,
                    column: form.get("action_col"),
                    selected_pks: &selected_pks,
                    object_pk: object_pk.as_ref(),
                    cleaned: &cleaned,
                    store: store.as_ref(),
                };
                let processed = (custom.run)(&input)?;
                Written {
                    count: processed.len(),
                    object_pk: object_pk.clone(),
                    processed,
                    object_label: String::new(),
                }
            }
        };

        Ok(Some(self.conclude(outcome, written, &action)))
    }

    /// Records a successful write: message, flash and a fresh page.
    /// `message_action` picks the message template.
    fn conclude(&mut self, mut outcome: ActionOutcome, written: Written, message_action: &Action) -> ActionOutcome {
        let session = self.request.session();
        outcome.success = true;
        outcome.processed_pks = written.processed.clone();
        outcome.object_pk = written.object_pk;
        outcome.message = success_message(
            &self.params,
            message_action,
            written.count,
            &written.object_label,
            self.model.as_ref(),
        );
        if let Some(message) = &outcome.message {
            session.add_message(message.clone());
        }
        if outcome.action.mutates() {
            session.set_flash(&self.html_id, written.processed.clone());
            if let Some(form) = self.attached_form.as_mut() {
                form.clear();
            }
        }
        self.processed_pks = written.processed;
        self.invalidate();
        info!(listing = %self.id, action = %outcome.action, rows = written.count, "action processed");
        outcome
    }

    /// Runs the handler of a pressed row button.
    ///
    /// A user action registered under the button's name wins over the
    /// built-in one. Moves need the change permission, deletion the delete
    /// one; link buttons have nothing to run.
    fn press_row_button(&mut self) -> Result<ActionOutcome> {
        let request: &'r crate::request::Request = self.request;
        let press = ButtonPress::from_form(request.form());
        let column = self
            .all_columns
            .get(&press.column)
            .filter(|c| c.kind() == ColumnKind::ActionsButtons)
            .cloned()
            .ok_or_else(|| ListingError::config(format!("unknown action column '{}'", press.column)))?;
        if !column.buttons().contains(&press.button) {
            return Err(ListingError::config(format!(
                "column '{}' has no '{}' button",
                press.column, press.button
            )));
        }
        debug!(listing = %self.id, column = %press.column, button = %press.button, pk = ?press.pk, "row button pressed");

        let mut outcome = ActionOutcome::failed(Action::RowButton);
        outcome.redirect = RedirectPolicy::from_value(self.params.get("action_button_success_redirect_url"));
        let principal = request.principal();

        if let Some(custom) = self.spec.custom_actions.get(&press.button).cloned() {
            let required = required_permissions(&self.params, &Action::RowButton, self.model.as_ref(), Some(&custom));
            check_permission(principal, required.as_deref(), &Action::Custom(press.button.clone()))?;
            let store = Arc::clone(&self.store);
            let cleaned = Map::new();
            let input = ActionInput {
                action: &press.button,
                column: Some(press.column.as_str()),
                selected_pks: &[],
                object_pk: press.pk.as_ref(),
                cleaned: &cleaned,
                store: store.as_ref(),
            };
            let processed = (custom.run)(&input)?;
            let written = Written {
                count: processed.len(),
                object_pk: press.pk.clone(),
                processed,
                object_label: String::new(),
            };
            return Ok(self.conclude(outcome, written, &Action::RowButton));
        }

        let button = RowButton::parse(&press.button)
            .ok_or_else(|| ListingError::config(format!("unknown button '{}'", press.button)))?;
        let gate = match button {
            RowButton::MoveUp | RowButton::MoveDown => Action::Update,
            RowButton::DeleteObject => Action::Delete,
            RowButton::ViewObject | RowButton::EditObject => {
                debug!(listing = %self.id, button = button.name(), "link button posted, nothing to run");
                outcome.success = true;
                return Ok(outcome);
            }
        };
        let required = required_permissions(&self.params, &gate, self.model.as_ref(), None);
        check_permission(principal, required.as_deref(), &gate)?;
        let Some(pk) = press.pk.clone() else {
            return Err(ListingError::config(format!("bad object id for button '{}'", press.button)));
        };
        if button == RowButton::DeleteObject {
            let mut written = self.delete(StoreQuery::new().pk_in(std::slice::from_ref(&pk)))?;
            written.object_pk = Some(pk);
            return Ok(self.conclude(outcome, written, &gate));
        }
        // Moves queue no message.
        let written = self.move_row(&pk, &column.order_field(button), button == RowButton::MoveUp)?;
        Ok(self.conclude(outcome, written, &Action::RowButton))
    }

    /// Moves a row one step towards the first (`up`) or last row of the
    /// listing, shifting the rows in between by one.
    fn move_row(&mut self, pk: &Value, field: &str, up: bool) -> Result<Written> {
        let lookups = self.filters.lookups(self.spec.filter_lookups.as_ref());
        let manager = RecordManager::new(self.store.as_ref(), lookups.clone(), self.ordering());
        let Some(row) = manager.get(pk)? else {
            return Err(ListingError::store(format!("row {} not found", json_to_text(pk))));
        };
        let rows = manager.all()?;
        let edge = if up { rows.first() } else { rows.last() };
        let Some(edge) = edge else {
            return Ok(Written::none());
        };
        let order_of = |row: &Value| {
            row.get(field)
                .and_then(Value::as_i64)
                .ok_or_else(|| ListingError::config(format!("field \"{}\" must be an integer to order rows", field)))
        };
        let own = order_of(&row)?;
        let delta = match order_of(edge)?.cmp(&own) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Equal => return Ok(Written::none()),
        };
        if !self.saving() {
            return Ok(Written::none());
        }
        let target = own + delta;
        let mut between = StoreQuery::new();
        for (key, value) in lookups {
            between.add_filter(key, value);
        }
        let between = if delta < 0 {
            between.filter(format!("{}__gte", field), target).filter(format!("{}__lt", field), own)
        } else {
            between.filter(format!("{}__gt", field), own).filter(format!("{}__lte", field), target)
        };
        let pk_field = self.store.meta().pk.clone();
        for neighbour in self.store.fetch(&between)? {
            let Some(neighbour_pk) = neighbour.get(&pk_field) else {
                continue;
            };
            let Some(order) = neighbour.get(field).and_then(Value::as_i64) else {
                continue;
            };
            let mut changes = Map::new();
            changes.insert(field.to_string(), Value::from(order - delta));
            self.store.update(&StoreQuery::new().pk_in(std::slice::from_ref(neighbour_pk)), &changes)?;
        }
        let mut changes = Map::new();
        changes.insert(field.to_string(), Value::from(target));
        self.store.update(&StoreQuery::new().pk_in(std::slice::from_ref(pk)), &changes)?;
        debug!(listing = %self.id, pk = %json_to_text(pk), from = own, to = target, "row moved");
        Ok(Written {
            processed: vec![pk.clone()],
            count: 1,
            object_label: String::new(),
            object_pk: Some(pk.clone()),
        })
    }

    /// Posted rows, else the single `object_pk`.
    fn targets(&self, selected: &[Value], object_pk: Option<&Value>) -> Vec<Value> {
        if selected.is_empty() {
            object_pk.cloned().into_iter().collect()
        } else {
            selected.to_vec()
        }
    }

    fn reject(&mut self, msg: &str) {
        if let Some(form) = self.attached_form.as_mut() {
            form.form_mut().add_error(None, msg);
        }
        debug!(listing = %self.id, reason = msg, "action rejected");
    }

    /// Cleans the posted attached form. `None` when it is invalid, or when
    /// `required` and it was not posted.
    fn cleaned_form(&mut self, view_hooks: Option<&CleanHooks>, required: bool) -> Option<Map<String, Value>> {
        let spec = Arc::clone(&self.spec);
        let id = self.id.clone();
        let chain = crate::hooks::HookChain {
            view: view_hooks,
            listing: &spec.clean_hooks,
            listing_id: &id,
        };
        match self.attached_form.as_mut().filter(|f| f.is_posted()) {
            Some(form) => {
                if form.full_clean(&chain) {
                    Some(form.form().cleaned_data().clone())
                } else {
                    debug!(listing = %id, errors = form.form().errors().len(), "attached form invalid");
                    None
                }
            }
            None if required => {
                debug!(listing = %id, "action needs a posted attached form");
                None
            }
            None => Some(Map::new()),
        }
    }

    /// Column names of a cleaned form mapped to store fields; the primary
    /// key is dropped.
    fn to_store_fields(&self, cleaned: Map<String, Value>) -> Map<String, Value> {
        let pk_field = self.store.meta().pk.clone();
        cleaned
            .into_iter()
            .map(|(name, value)| match self.all_columns.get(&name) {
                Some(col) => (col.data_key().to_string(), value),
                None => (name, value),
            })
            .filter(|(field, _)| *field != pk_field && field != "pk")
            .collect()
    }

    fn object_label(&self, row: &Map<String, Value>, pk: &Value) -> String {
        match &self.model {
            Some(meta) => meta.object_label(&Value::Object(row.clone())),
            None => json_to_text(pk),
        }
    }

    /// The listing's filter lookups as a store query.
    fn filtered_query(&self) -> StoreQuery {
        let mut query = StoreQuery::new();
        for (key, value) in self.filters.lookups(self.spec.filter_lookups.as_ref()) {
            query.add_filter(key, value);
        }
        query
    }

    fn saving(&self) -> bool {
        self.params.bool("save_to_database")
    }

    fn insert(&mut self, cleaned: Map<String, Value>) -> Result<Written> {
        let mut row = self.to_store_fields(cleaned);
        if !self.saving() {
            return Ok(Written::none());
        }
        let pk = self.store.insert(row.clone())?;
        row.insert(self.store.meta().pk.clone(), pk.clone());
        Ok(Written {
            object_label: self.object_label(&row, &pk),
            processed: vec![pk.clone()],
            count: 1,
            object_pk: Some(pk),
        })
    }

    /// One target gets every field; a bulk update only the filled ones.
    fn update(&mut self, targets: &[Value], cleaned: Map<String, Value>) -> Result<Written> {
        let mut changes = self.to_store_fields(cleaned);
        if targets.len() > 1 {
            changes = non_empty(changes);
        }
        if !self.saving() {
            return Ok(Written::none());
        }
        let count = self.store.update(&StoreQuery::new().pk_in(targets), &changes)?;
        let (object_label, object_pk) = match targets {
            [pk] => {
                let row = match self.store.get(pk)? {
                    Some(Value::Object(row)) => row,
                    _ => Map::new(),
                };
                (self.object_label(&row, pk), Some(pk.clone()))
            }
            _ => (String::new(), None),
        };
        Ok(Written {
            processed: targets.to_vec(),
            count,
            object_label,
            object_pk,
        })
    }

    fn update_all(&mut self, cleaned: Map<String, Value>) -> Result<Written> {
        let changes = non_empty(self.to_store_fields(cleaned));
        if !self.saving() {
            return Ok(Written::none());
        }
        let query = self.filtered_query();
        let pk_field = self.store.meta().pk.clone();
        let processed: Vec<Value> = self
            .store
            .fetch(&query)?
            .iter()
            .filter_map(|row| row.get(&pk_field).cloned())
            .collect();
        let count = self.store.update(&query, &changes)?;
        Ok(Written {
            processed,
            count,
            object_label: String::new(),
            object_pk: None,
        })
    }

    /// Inserts a copy of `source` with the filled form fields applied.
    fn duplicate(&mut self, source: &Value, cleaned: Map<String, Value>) -> Result<Written> {
        let Some(Value::Object(mut row)) = self.store.get(source)? else {
            return Err(ListingError::store(format!("row {} not found", json_to_text(source))));
        };
        let pk_field = self.store.meta().pk.clone();
        row.remove(&pk_field);
        row.extend(non_empty(self.to_store_fields(cleaned)));
        if !self.saving() {
            return Ok(Written::none());
        }
        let pk = self.store.insert(row.clone())?;
        row.insert(pk_field, pk.clone());
        Ok(Written {
            object_label: self.object_label(&row, &pk),
            processed: vec![pk.clone()],
            count: 1,
            object_pk: Some(pk),
        })
    }

    fn delete(&mut self, query: StoreQuery) -> Result<Written> {
        if !self.saving() {
            return Ok(Written::none());
        }
        let count = self.store.delete(&query)?;
        Ok(Written {
            count,
            ..Written::none()
        })
    }

    /// Writes the rows edited inline. `None` when a row form is invalid;
    /// the posted forms are kept to show their errors.
    fn inline_update(&mut self, pks: &[Value], view_hooks: Option<&CleanHooks>) -> Result<Option<Written>> {
        let spec = Arc::clone(&self.spec);
        let id = self.id.clone();
        let chain = crate::hooks::HookChain {
            view: view_hooks,
            listing: &spec.clean_hooks,
            listing_id: &id,
        };
        let mut forms = Vec::new();
        let mut valid = true;
        for pk in pks {
            let Some(row) = self.store.get(pk)? else {
                continue;
            };
            let rec = Record::new(row, pk.clone(), 0, 1);
            let mut form = self.row_form(&rec)?.bind(self.request.form().clone());
            valid &= form.full_clean(&chain);
            forms.push((pk.clone(), form));
        }
        if !valid {
            debug!(listing = %id, rows = forms.len(), "inline forms invalid");
            for (pk, form) in forms {
                self.inline_forms.insert(json_to_text(&pk), form);
            }
            return Ok(None);
        }
        let save = self.saving();
        let mut processed = Vec::new();
        for (pk, form) in &forms {
            let changed: Map<String, Value> = form
                .changed_fields()
                .into_iter()
                .filter_map(|name| form.cleaned_data().get(&name).cloned().map(|v| (name, v)))
                .collect();
            let changes = self.to_store_fields(changed);
            if save && !changes.is_empty() {
                self.store.update(&StoreQuery::new().pk_in(std::slice::from_ref(pk)), &changes)?;
            }
            processed.push(pk.clone());
        }
        Ok(Some(Written {
            count: if save { processed.len() } else { 0 },
            processed,
            object_label: String::new(),
            object_pk: None,
        }))
    }
}
