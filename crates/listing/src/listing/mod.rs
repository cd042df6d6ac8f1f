//! The listing aggregate.
//!
//! A [`ListingSpec`] is the shared declaration: parameters, columns,
//! filters, hooks and custom actions. [`Listing::new`] gives it data and
//! construction parameters, and [`Listing::bind`] ties the instance to one
//! request. The resulting [`BoundListing`] runs the record pipeline,
//! renders, exports and processes actions; it never outlives its request.

mod options;
mod pipeline;
mod process;
mod render;

pub use options::{ListingOptions, DEFAULT_PER_PAGE, LISTING_PARAMS};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use listing_render::{get_theme, TemplateEngine, ThemeConfig, DEFAULT_THEME};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::actions::{parse_pks, Action, ActionInput, CustomAction, ACTION_PARAMS};
use crate::attached_form::{AttachedForm, AttachedFormBindContext, AttachedFormHooks, ATTACHED_FORM_NAME};
use crate::columns::{
    BindContext, CellRenderer, Column, ColumnKind, ColumnRegistry, ColumnSpec, Columns, GroupByLinks, RenderEnv,
};
use crate::error::{ListingError, Result};
use crate::filter::{Filter, FilterBindContext, FilterLookupsFn, FilterSpec, Filters};
use crate::form::BoundForm;
use crate::group_by::GroupBy;
use crate::hooks::{CleanHooks, HookChain};
use crate::manager::{parse_sort, SequenceStore};
use crate::params::{recognised_keys, Layers, ParamMap, Params};
use crate::record::{zip_row, Record};
use crate::request::Request;
use crate::store::{DataStore, ModelMeta, StoreQuery};
use crate::templates::default_engine;
use crate::url::{ListingUrl, FILTER_QUERYSTRING_PREFIX, INT_QUERY_STRING_KEYS, LISTING_QUERY_STRING_KEYS};
use crate::variations::Variations;

use options::{BOOL_REQUEST_KEYS, LIST_REQUEST_KEYS};
use pipeline::Prepared;

/// Prefixes of listing attributes addressed to child components.
const COMPONENT_PREFIXES: &[&str] = &["columns_", "filters_", "toolbar_", "paginator_", "attached_form_"];

static NEXT_LISTING_KEY: AtomicU64 = AtomicU64::new(1);

fn listing_keys() -> Arc<HashSet<String>> {
    recognised_keys("listing", &[LISTING_PARAMS, ACTION_PARAMS])
}

/// True for keys meant for a column, filter, toolbar item or form.
fn is_component_key(key: &str) -> bool {
    key.contains("__")
        || key.starts_with(FILTER_QUERYSTRING_PREFIX)
        || COMPONENT_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Where the rows of a listing come from.
#[derive(Clone)]
pub enum DataSource {
    /// An ordered sequence of objects or positional arrays.
    Rows(Vec<Value>),
    Store(Arc<dyn DataStore>),
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Rows(rows) => f.debug_tuple("Rows").field(&rows.len()).finish(),
            DataSource::Store(store) => f.debug_tuple("Store").field(&store.meta().model_name).finish(),
        }
    }
}

impl DataSource {
    /// A JSON array of rows; anything else is a data error.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(rows) => Ok(DataSource::Rows(rows)),
            other => Err(ListingError::data(format!("expected a sequence of rows, got {}", kind_of(&other)))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Declaration of a listing, shared by every instance and request.
#[derive(Clone, Default)]
pub struct ListingSpec {
    params: ParamMap,
    columns: Vec<ColumnSpec>,
    filters: Vec<FilterSpec>,
    stored: HashMap<String, ParamMap>,
    cell_overrides: HashMap<String, CellRenderer>,
    filter_lookups: Option<FilterLookupsFn>,
    clean_hooks: CleanHooks,
    form_hooks: AttachedFormHooks,
    custom_actions: HashMap<String, CustomAction>,
    engine: Option<Arc<dyn TemplateEngine>>,
    registry: ColumnRegistry,
    variations: Variations,
}

impl fmt::Debug for ListingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingSpec")
            .field("params", &self.params)
            .field("columns", &self.columns)
            .field("filters", &self.filters)
            .field("custom_actions", &self.custom_actions.keys().collect::<Vec<_>>())
            .field("variations", &self.variations.len())
            .finish()
    }
}

impl ListingSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self::default().param("name", name.into())
    }

    pub fn name(&self) -> &str {
        self.params.get("name").and_then(Value::as_str).unwrap_or("listing")
    }

    /// Sets a listing attribute. Scoped keys (`columns_<key>`,
    /// `<name>__<key>`) reach the child components.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn params(mut self, params: ParamMap) -> Self {
        self.params.extend(params);
        self
    }

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    pub fn columns(mut self, specs: impl IntoIterator<Item = ColumnSpec>) -> Self {
        self.columns.extend(specs);
        self
    }

    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    pub fn filters(mut self, specs: impl IntoIterator<Item = FilterSpec>) -> Self {
        self.filters.extend(specs);
        self
    }

    /// Parameters stored for one named component, as template-time
    /// helpers set them.
    pub fn stored_params(mut self, component: impl Into<String>, params: ParamMap) -> Self {
        self.stored.entry(component.into()).or_default().extend(params);
        self
    }

    /// Replaces the cell markup of one column.
    pub fn cell_renderer(
        mut self,
        column: impl Into<String>,
        f: impl Fn(&Column, &Record, &RenderEnv<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.cell_overrides.insert(column.into(), Arc::new(f));
        self
    }

    /// Overrides the store lookups of filters; returning `None` keeps the
    /// built-in lookups of that filter.
    pub fn filter_lookups(
        mut self,
        f: impl Fn(&Filter, &Value) -> Option<Vec<(String, Value)>> + Send + Sync + 'static,
    ) -> Self {
        self.filter_lookups = Some(Arc::new(f));
        self
    }

    pub fn clean_hooks(mut self, hooks: CleanHooks) -> Self {
        self.clean_hooks = hooks;
        self
    }

    pub fn form_hooks(mut self, hooks: AttachedFormHooks) -> Self {
        self.form_hooks = hooks;
        self
    }

    /// Registers a user-defined action run when `action=<name>` is posted.
    pub fn action(
        mut self,
        name: impl Into<String>,
        permissions: &[&str],
        f: impl Fn(&ActionInput<'_>) -> Result<Vec<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.custom_actions.insert(
            name.into(),
            CustomAction {
                run: Arc::new(f),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        );
        self
    }

    pub fn engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn registry(mut self, registry: ColumnRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn variations(mut self, variations: Variations) -> Self {
        self.variations = variations;
        self
    }

    /// Parses a declaration object:
    ///
    /// ```json
    /// {"name": "people", "columns": ["name", {"name": "age", "kind": "integer"}],
    ///  "filters": [...], "variations": [...], "per_page": 10}
    /// ```
    ///
    /// Every other top-level key is a listing attribute.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ListingError::config("a listing declaration must be an object"));
        };
        let mut spec = ListingSpec::default();
        for (key, value) in map {
            match key.as_str() {
                "columns" => {
                    for col in as_list(value, "columns")? {
                        spec.columns.push(ColumnSpec::from_json(col)?);
                    }
                }
                "filters" => {
                    for filter in as_list(value, "filters")? {
                        spec.filters.push(FilterSpec::from_json(filter)?);
                    }
                }
                "variations" => spec.variations = Variations::from_json(value)?,
                "stored" => match value {
                    Value::Object(stored) => {
                        for (name, params) in stored {
                            let Value::Object(params) = params else {
                                return Err(ListingError::config(format!("stored params of '{}' must be an object", name)));
                            };
                            spec.stored.insert(name.clone(), params.clone());
                        }
                    }
                    _ => return Err(ListingError::config("stored params must be an object")),
                },
                _ => {
                    spec.params.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(spec)
    }
}

fn as_list<'a>(value: &'a Value, what: &str) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ListingError::config(format!("'{}' must be a list", what))),
    }
}

fn check_unknown(layer: &ParamMap, keys: &HashSet<String>, strict: bool) -> Result<()> {
    for key in layer.keys() {
        if keys.contains(key) || is_component_key(key) {
            continue;
        }
        if strict {
            return Err(ListingError::config(format!("unknown parameter '{}' for listing", key)));
        }
        warn!(key = %key, "ignoring unknown listing parameter");
    }
    Ok(())
}

/// Listing parameters from the declaration and the construction params.
fn base_params(spec: &ListingSpec, kwargs: &ParamMap) -> Result<Params> {
    let keys = listing_keys();
    let mut params = Params::from_specs(&[LISTING_PARAMS, ACTION_PARAMS]);
    params.apply_known(&spec.params, &keys);
    params.apply_known(kwargs, &keys);
    let strict = params.bool("strict_params");
    check_unknown(&spec.params, &keys, strict)?;
    check_unknown(kwargs, &keys, strict)?;
    Ok(params)
}

/// Applies the suffixed request values of the listing's own keys.
fn apply_request(params: &mut Params, request: &Request, suffix: &str) {
    for key in LISTING_QUERY_STRING_KEYS {
        let name = format!("{}{}", key, suffix);
        let values = request.param_list(&name);
        let Some(last) = values.last().map(|v| v.trim()) else {
            continue;
        };
        if LIST_REQUEST_KEYS.contains(key) {
            params.set(key, values.join(","));
        } else if BOOL_REQUEST_KEYS.contains(key) {
            params.set(key, listing_seeker::parse_bool(last).unwrap_or(!last.is_empty()));
        } else if INT_QUERY_STRING_KEYS.contains(key) {
            match (*key, last.parse::<i64>()) {
                ("per_page", Ok(n)) if n == 0 || n < -1 => {}
                (_, Ok(n)) => params.set(key, n),
                ("page", Err(_)) if last == "last" => params.set(key, last),
                ("editing_row_pk", Err(_)) if !last.is_empty() => params.set(key, last),
                _ => debug!(key = %name, value = %last, "ignoring non-integer request value"),
            }
        } else {
            params.set(key, last);
        }
    }
}

/// The action posted with the request, `force_action` first.
fn posted_action(request: &Request) -> Option<Action> {
    if !request.is_post() {
        return None;
    }
    let form = request.form();
    form.get("force_action")
        .filter(|a| !a.trim().is_empty())
        .or_else(|| form.get("action"))
        .and_then(Action::parse)
}

/// Primary keys posted in `selected_pks` or `selected_rows<suffix>`.
fn posted_pks(request: &Request, suffix: &str) -> Vec<Value> {
    let form = request.form();
    let rows_key = format!("selected_rows{}", suffix);
    parse_pks(form.get_list("selected_pks").into_iter().chain(form.get_list(&rows_key)))
}

fn zip_positional(rows: Vec<Value>) -> Vec<Value> {
    rows.into_iter()
        .map(|row| match &row {
            Value::Array(items) => zip_row(&row, &Columns::positional_names(items.len())),
            _ => row,
        })
        .collect()
}

/// A listing instance: a declaration with its data and construction
/// parameters. Bind it to a request to render it.
pub struct Listing {
    spec: Arc<ListingSpec>,
    key: u64,
    kwargs: ParamMap,
    store: Arc<dyn DataStore>,
    model: Option<ModelMeta>,
    column_specs: Vec<ColumnSpec>,
}

impl fmt::Debug for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("name", &self.spec.name())
            .field("key", &self.key)
            .field("columns", &self.column_specs.len())
            .finish()
    }
}

impl Listing {
    /// Creates an instance. Columns not declared are inferred from the
    /// model fields or from the first row.
    pub fn new(spec: Arc<ListingSpec>, data: DataSource, kwargs: ParamMap) -> Result<Self> {
        let params = base_params(&spec, &kwargs)?;
        let options = ListingOptions::from_params(&params)?;
        let headers = match params.get("column_headers") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let (store, model, mut column_specs) = match data {
            DataSource::Rows(rows) => {
                let specs = if spec.columns.is_empty() {
                    rows.first()
                        .map(|first| Columns::specs_for_row(first, &headers))
                        .unwrap_or_default()
                } else {
                    spec.columns.clone()
                };
                let store = SequenceStore::new(&options.name, &options.primary_key, zip_positional(rows))?;
                (Arc::new(store) as Arc<dyn DataStore>, None, specs)
            }
            DataSource::Store(store) => {
                let meta = store.meta().clone();
                let specs = if !meta.fields.is_empty() {
                    Columns::specs_for_model(&meta, &spec.columns, &params.set_of("link_object_columns"))
                } else if !spec.columns.is_empty() {
                    spec.columns.clone()
                } else {
                    store
                        .fetch(&StoreQuery::new().slice(0, Some(1)))?
                        .first()
                        .map(|first| Columns::specs_for_row(first, &headers))
                        .unwrap_or_default()
                };
                (store, Some(meta), specs)
            }
        };
        if options.selectable && !column_specs.iter().any(|s| s.get_kind() == Some(ColumnKind::Selection)) {
            column_specs.insert(0, ColumnSpec::of(ColumnKind::Selection));
        }
        let key = NEXT_LISTING_KEY.fetch_add(1, Ordering::Relaxed);
        debug!(listing = %options.listing_id(), key, columns = column_specs.len(), "listing created");
        Ok(Self {
            spec,
            key,
            kwargs,
            store,
            model,
            column_specs,
        })
    }

    /// Identity of the instance, used to assign its request suffix.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn spec(&self) -> &Arc<ListingSpec> {
        &self.spec
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn model(&self) -> Option<&ModelMeta> {
        self.model.as_ref()
    }

    /// Listing id before any request value applies.
    pub fn id(&self) -> Result<String> {
        let params = base_params(&self.spec, &self.kwargs)?;
        Ok(ListingOptions::from_params(&params)?.listing_id().to_string())
    }

    /// Binds the instance to `request`: resolves parameters, binds the
    /// columns, the filters and the attached form.
    pub fn bind<'r>(&self, request: &'r Request) -> Result<BoundListing<'r>> {
        let spec = &*self.spec;
        let suffix = request.suffix_for(self.key);
        let keys = listing_keys();

        let mut params = base_params(spec, &self.kwargs)?;
        let raw_variation = request
            .param(&format!("variation{}", suffix))
            .map(|v| Value::String(v.to_string()))
            .or_else(|| params.get("variation").cloned());
        let variation = spec.variations.select(raw_variation.as_ref());
        if let Some(overrides) = spec.variations.get(variation) {
            params.apply_known(overrides, &keys);
        }
        apply_request(&mut params, request, &suffix);
        params.set("variation", variation);

        let options = ListingOptions::from_params(&params)?;
        let id = options.listing_id().to_string();
        let html_id = format!("listing-{}{}-id", id, suffix).replace('_', "-");
        let theme = get_theme(&options.theme).or_else(|err| {
            warn!(theme = %options.theme, error = %err, "unknown theme, using the default one");
            get_theme(DEFAULT_THEME)
        })?;
        let engine = match &spec.engine {
            Some(engine) => Arc::clone(engine),
            None => default_engine()?,
        };

        let layers = Layers {
            spec: &spec.params,
            stored: &spec.stored,
            instance: &self.kwargs,
            variation: spec.variations.get(variation),
            strict: options.strict_params,
        };
        let model = self.model.as_ref();
        let bind_ctx = BindContext {
            layers,
            model,
            registry: &spec.registry,
        };
        let all_columns = Columns::bind_all(&self.column_specs, &bind_ctx)?;

        let mut filters = Filters::bind(
            &spec.filters,
            &FilterBindContext {
                layers,
                model,
                store: Some(self.store.as_ref()),
                suffix: &suffix,
            },
        )?;
        filters.extract(request.query(), &HookChain::listing(&spec.clean_hooks, &id));

        let group_by = GroupBy::parse(&params.list("gb_cols"), &params.list("gb_annotate_cols"), &all_columns);
        let (mut columns, group_links) = match &group_by {
            Some(gb) => {
                let (cols, links) = gb.columns(&all_columns, &bind_ctx, &filters)?;
                (cols, Some(links))
            }
            None => (all_columns.clone(), None),
        };
        let sort = {
            let refs: Vec<&Column> = columns.iter().collect();
            parse_sort(&params.str("sort"), &refs)
        };
        let select = match &group_by {
            Some(_) => None,
            None => Some(params.list("select_columns")).filter(|l| !l.is_empty()),
        };
        let mut selected = columns.select(select.as_deref(), &params.set_of("exclude_columns"));
        if !options.is_selecting() {
            selected.retain(|c| c.kind() != ColumnKind::Selection);
        }
        // Row button forms cannot nest in the editing form.
        if options.is_editing() {
            selected.retain(|c| c.kind() != ColumnKind::ActionsButtons);
        }
        let editing_columns = params.set_of("editing_columns");
        for col in &mut selected {
            col.editing_init(options.is_editing(), &editing_columns);
        }

        let action = posted_action(request);
        let bulk = posted_pks(request, &suffix).len() > 1;
        let attached_form = AttachedForm::bind(
            ATTACHED_FORM_NAME,
            &AttachedFormBindContext {
                layers,
                columns: &all_columns,
                theme: &theme,
                store: Some(self.store.as_ref()),
                request,
                listing_id: &id,
                suffix: &suffix,
                action_button: request.form().get("action_button"),
                relax_required: action.as_ref().is_some_and(|a| a.relaxes_required(bulk)),
                hooks: &spec.form_hooks,
            },
        )?;

        debug!(
            listing = %id,
            suffix = %suffix,
            variation,
            columns = selected.len(),
            filters = filters.len(),
            group_by = group_by.is_some(),
            "listing bound to request"
        );
        Ok(BoundListing {
            spec: Arc::clone(&self.spec),
            store: Arc::clone(&self.store),
            model: self.model.clone(),
            kwargs: self.kwargs.clone(),
            request,
            key: self.key,
            url: ListingUrl::new(request, &suffix),
            suffix,
            params,
            options,
            id,
            html_id,
            theme,
            engine,
            variation,
            all_columns,
            columns,
            selected,
            filters,
            group_by,
            group_links,
            sort,
            attached_form,
            inline_forms: HashMap::new(),
            processed_pks: Vec::new(),
            prepared: None,
        })
    }
}

/// A listing bound to one request.
pub struct BoundListing<'r> {
    spec: Arc<ListingSpec>,
    store: Arc<dyn DataStore>,
    model: Option<ModelMeta>,
    kwargs: ParamMap,
    request: &'r Request,
    key: u64,
    suffix: String,
    url: ListingUrl,
    params: Params,
    options: ListingOptions,
    id: String,
    html_id: String,
    theme: Arc<ThemeConfig>,
    engine: Arc<dyn TemplateEngine>,
    variation: usize,
    /// Every declared column, before group-by and selection.
    all_columns: Columns,
    /// Columns of the current view: the group-by columns when grouping.
    columns: Columns,
    /// Displayed columns, in display order.
    selected: Vec<Column>,
    filters: Filters,
    group_by: Option<GroupBy>,
    group_links: Option<GroupByLinks>,
    sort: Vec<(String, bool)>,
    attached_form: Option<AttachedForm>,
    /// Posted inline forms that failed validation, by row pk.
    inline_forms: HashMap<String, BoundForm>,
    processed_pks: Vec<Value>,
    prepared: Option<Prepared>,
}

impl fmt::Debug for BoundListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundListing")
            .field("id", &self.id)
            .field("suffix", &self.suffix)
            .field("columns", &self.selected.iter().map(Column::name).collect::<Vec<_>>())
            .field("prepared", &self.prepared.is_some())
            .finish()
    }
}

impl<'r> BoundListing<'r> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `listing-<id><suffix>-id`, with `-` for `_`.
    pub fn html_id(&self) -> &str {
        &self.html_id
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn options(&self) -> &ListingOptions {
        &self.options
    }

    pub fn url(&self) -> &ListingUrl {
        &self.url
    }

    pub fn request(&self) -> &'r Request {
        self.request
    }

    pub fn theme(&self) -> &ThemeConfig {
        &self.theme
    }

    pub fn engine(&self) -> &Arc<dyn TemplateEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn model(&self) -> Option<&ModelMeta> {
        self.model.as_ref()
    }

    pub fn variation(&self) -> usize {
        self.variation
    }

    /// Displayed columns, in display order.
    pub fn columns(&self) -> &[Column] {
        &self.selected
    }

    pub fn all_columns(&self) -> &Columns {
        &self.all_columns
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn sort(&self) -> &[(String, bool)] {
        &self.sort
    }

    pub fn group_by(&self) -> Option<&GroupBy> {
        self.group_by.as_ref()
    }

    pub fn attached_form(&self) -> Option<&AttachedForm> {
        self.attached_form.as_ref()
    }

    pub fn attached_form_mut(&mut self) -> Option<&mut AttachedForm> {
        self.attached_form.as_mut()
    }

    /// Rows processed by the last successful action of this request.
    pub fn processed_pks(&self) -> &[Value] {
        &self.processed_pks
    }

    fn layers(&self) -> Layers<'_> {
        Layers {
            spec: &self.spec.params,
            stored: &self.spec.stored,
            instance: &self.kwargs,
            variation: self.spec.variations.get(self.variation),
            strict: self.options.strict_params,
        }
    }

    /// Selection keys from `selected_rows`, else `selection_initial`.
    pub fn selected_rows(&self) -> Vec<String> {
        let rows = self.params.list("selected_rows");
        if rows.is_empty() {
            self.params.list("selection_initial")
        } else {
            rows
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::querydict::QueryDict;

    fn map(value: Value) -> ParamMap {
        match value {
            Value::Object(m) => m,
            _ => ParamMap::new(),
        }
    }

    #[test]
    fn test_component_keys() {
        assert!(is_component_key("columns_header"));
        assert!(is_component_key("age__header"));
        assert!(is_component_key("f_age__filter_key"));
        assert!(is_component_key("attached_form_layout"));
        assert!(!is_component_key("per_pages"));
    }

    #[test]
    fn test_data_source_shape() {
        assert!(DataSource::from_json(json!([{"a": 1}])).is_ok());
        let err = DataSource::from_json(json!({"a": 1})).unwrap_err();
        assert!(matches!(err, ListingError::Data(_)));
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn test_scalar_rows_are_data_error() {
        let spec = Arc::new(ListingSpec::new("l"));
        let err = Listing::new(spec, DataSource::Rows(vec![json!(1)]), ParamMap::new()).unwrap_err();
        assert!(matches!(err, ListingError::Data(_)));
    }

    #[test]
    fn test_strict_rejects_unknown() {
        let spec = Arc::new(ListingSpec::new("l").param("strict_params", true));
        let err = Listing::new(Arc::clone(&spec), DataSource::Rows(vec![]), map(json!({"per_pages": 3}))).unwrap_err();
        assert!(matches!(err, ListingError::Config(_)));
        assert!(Listing::new(spec, DataSource::Rows(vec![]), map(json!({"columns_header": "x"}))).is_ok());
    }

    #[test]
    fn test_spec_from_json() {
        let spec = ListingSpec::from_json(&json!({
            "name": "people",
            "columns": ["name", {"name": "age", "kind": "integer"}],
            "filters": [{"name": "age1", "filter_key": "age__gte"}],
            "variations": [{"per_page": 5}],
            "per_page": 10,
        }))
        .unwrap();
        assert_eq!(spec.name(), "people");
        assert_eq!(spec.columns.len(), 2);
        assert_eq!(spec.filters.len(), 1);
        assert_eq!(spec.variations.len(), 1);
        assert_eq!(spec.params["per_page"], json!(10));
        assert!(ListingSpec::from_json(&json!([])).is_err());
    }

    #[test]
    fn test_request_values() {
        let mut params = Params::from_specs(&[LISTING_PARAMS]);
        let request = Request::get("/p?page-1=last&per_page-1=0&selected_rows-1=1&selected_rows-1=3&editing-1=1&sort-1=-age")
            .with_form(QueryDict::parse("sort-1=name"));
        apply_request(&mut params, &request, "-1");
        assert_eq!(params.str("page"), "last");
        assert_eq!(params.i64("per_page"), Some(DEFAULT_PER_PAGE));
        assert_eq!(params.list("selected_rows"), vec!["1", "3"]);
        assert!(params.bool("editing"));
        assert_eq!(params.str("sort"), "name");
    }

    #[test]
    fn test_inferred_columns_and_selection() {
        let spec = Arc::new(ListingSpec::new("l").param("selectable", true));
        let listing = Listing::new(
            spec,
            DataSource::Rows(vec![json!(["a", 1]), json!(["b", 2])]),
            ParamMap::new(),
        )
        .unwrap();
        let names: Vec<&str> = listing.column_specs.iter().map(ColumnSpec::name).collect();
        assert_eq!(names, vec!["selection", "column1", "column2"]);
    }

    #[test]
    fn test_keys_are_distinct() {
        let spec = Arc::new(ListingSpec::new("l"));
        let a = Listing::new(Arc::clone(&spec), DataSource::Rows(vec![]), ParamMap::new()).unwrap();
        let b = Listing::new(spec, DataSource::Rows(vec![]), ParamMap::new()).unwrap();
        assert_ne!(a.key(), b.key());
    }
}
