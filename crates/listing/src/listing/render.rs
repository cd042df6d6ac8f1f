//! HTML rendering and export of a bound listing.

use std::collections::HashSet;

use listing_render::{escape_html, json_to_text, HtmlAttrs, TemplateEngine};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::pipeline::Prepared;
use super::BoundListing;
use crate::aggregation::footer_context;
use crate::attached_form::AttachedFormEnv;
use crate::columns::{Column, ColumnKind, RenderEnv, SelectionState};
use crate::error::Result;
use crate::export::{ExportFormat, ExportTable};
use crate::keypath;
use crate::manager::resolve_relations;
use crate::paginator::Page;
use crate::record::Record;
use crate::toolbar::{Toolbar, ToolbarBindContext, ToolbarEnv, ToolbarPlacement};
use crate::templates::TOOLBAR_TEMPLATE;

impl<'r> BoundListing<'r> {
    /// Renders the listing fragment.
    ///
    /// Rows processed by an action are marked `flash-once`. A synchronous
    /// render consumes the session flash entry; an asynchronous one leaves
    /// it for the next full page.
    pub fn render(&mut self) -> Result<String> {
        let mut prepared = self.take_prepared()?;
        let flash = self.flash_keys();
        for rec in prepared.records.iter_mut() {
            rec.set_flashed(flash.contains(&rec.pk_text()));
        }
        let result = self.render_prepared(&prepared);
        self.prepared = Some(prepared);
        result
    }

    fn flash_keys(&self) -> HashSet<String> {
        let session = self.request.session();
        let stored = if self.request.is_ajax() {
            session.peek_flash(&self.html_id)
        } else {
            session.take_flash(&self.html_id)
        };
        stored.iter().chain(self.processed_pks.iter()).map(json_to_text).collect()
    }

    fn listing_context(&self, prepared: &Prepared) -> Value {
        json!({
            "id": self.id,
            "name": self.options.name,
            "html_id": self.html_id,
            "suffix": self.suffix,
            "editing": self.options.is_editing(),
            "selecting": self.options.is_selecting(),
            "selectable": self.options.selectable,
            "page": prepared.page.number,
            "nb_pages": prepared.paginator.num_pages(),
            "count": prepared.count,
        })
    }

    fn global_context(&self) -> Map<String, Value> {
        match self.params.get("global_context") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    fn render_env<'a>(&'a self, listing: &'a Value, global_context: &'a Map<String, Value>) -> RenderEnv<'a> {
        RenderEnv {
            listing,
            suffix: &self.suffix,
            theme: &self.theme,
            global_context,
            url: &self.url,
            sort: &self.sort,
            sortable: self.options.sortable,
            unsortable: self.options.unsortable,
            selection: SelectionState {
                multiple: self.options.selection_multiple,
                key: &self.options.selection_key,
            },
            columns: &self.selected,
            cell_overrides: &self.spec.cell_overrides,
            group_by: self.group_links.as_ref(),
            model: self.model.as_ref(),
        }
    }

    fn render_prepared(&self, prepared: &Prepared) -> Result<String> {
        let listing = self.listing_context(prepared);
        let global_context = self.global_context();
        let env = self.render_env(&listing, &global_context);
        let editing = self.options.is_editing();

        let headers: Vec<String> = self.selected.iter().map(|c| c.render_header(&env)).collect();
        let rows: Vec<Value> = prepared
            .records
            .iter()
            .map(|rec| {
                let cells: Vec<String> = self.selected.iter().map(|c| c.render_cell(rec, &env)).collect();
                json!({"attrs": self.row_attrs(rec).to_string(), "cells": cells})
            })
            .collect();
        let footers = if self.has_footer() {
            self.selected
                .iter()
                .map(|col| Ok(col.render_footer(&env, self.reduce_column(col, prepared, &env)?.as_ref())))
                .collect::<Result<Vec<String>>>()?
        } else {
            Vec::new()
        };

        let (toolbar_top, toolbar_bottom) = self.render_toolbars()?;
        let paginator = if self.options.has_paginator {
            let ctx = prepared.paginator.context(&prepared.page, &self.url, &self.theme)?;
            let template = prepared.paginator.params().str("template_name");
            self.engine.render_themed(self.theme.name(), &template, &ctx)?
        } else {
            String::new()
        };
        let filters_form = if self.options.filters_form_in_listing && !self.filters.is_empty() {
            self.render_filters_form()?
        } else {
            String::new()
        };
        let messages: Vec<Value> = if self.options.show_messages {
            self.request
                .session()
                .take_messages()
                .iter()
                .map(|m| json!({"css_class": m.level.css_class(), "text": m.text}))
                .collect()
        } else {
            Vec::new()
        };
        let editing_hiddens = if editing {
            let pks: Vec<String> = prepared
                .records
                .iter()
                .filter(|r| r.is_editing())
                .map(Record::pk_text)
                .collect();
            format!(
                "<input type=\"hidden\" name=\"listing_id\" value=\"{}-id\">\
                 <input type=\"hidden\" name=\"listing_suffix\" value=\"{}\">\
                 <input type=\"hidden\" name=\"selected_pks\" value=\"{}\">",
                escape_html(&self.id),
                escape_html(&self.suffix),
                escape_html(&pks.join(","))
            )
        } else {
            String::new()
        };

        let ctx = json!({
            "container_attrs": self.container_attrs().to_string(),
            "attrs": self.table_attrs().to_string(),
            "messages": messages,
            "filters_form": filters_form,
            "toolbar_top": toolbar_top,
            "toolbar_bottom": toolbar_bottom,
            "editing": editing,
            "form_action": self.url.get_url(&[], &[], None),
            "editing_hiddens": editing_hiddens,
            "update_button_class": self.theme.str("theme_action_button_class"),
            "update_label": self.options.update_label,
            "has_header": self.options.has_header,
            "headers": headers,
            "rows": rows,
            "nb_columns": self.selected.len().max(1),
            "empty_table_msg": self.options.empty_table_msg,
            "footers": footers,
            "paginator": paginator,
        });
        let html = self
            .engine
            .render_themed(self.theme.name(), &self.options.template_name, &ctx)?;
        debug!(listing = %self.id, rows = prepared.records.len(), bytes = html.len(), "listing rendered");
        Ok(html)
    }

    /// The filters form alone, for pages placing it outside the listing.
    pub fn render_filters_form(&self) -> Result<String> {
        let ctx = self.filters.context(&self.url, &self.theme, self.options.accept_ajax);
        Ok(self
            .engine
            .render_themed(self.theme.name(), &self.filters.template_name(), &ctx)?)
    }

    /// The attached form, or `None` when the listing has none.
    pub fn render_attached_form(&self) -> Result<Option<String>> {
        let Some(form) = &self.attached_form else {
            return Ok(None);
        };
        let selected = self.selected_rows().join(",");
        let env = AttachedFormEnv {
            listing_id: &self.id,
            listing_css_id: &self.html_id,
            suffix: &self.suffix,
            accept_ajax: self.options.accept_ajax,
            selected_pks: &selected,
            request: self.request,
        };
        form.render(&env, &self.theme, self.engine.as_ref()).map(Some)
    }

    fn container_attrs(&self) -> HtmlAttrs {
        let mut attrs = HtmlAttrs::new();
        attrs.set("id", &self.html_id);
        attrs.add("class", &self.theme.str("theme_container_class"));
        if self.options.accept_ajax {
            attrs.add("class", "django-listing-ajax");
        }
        attrs.set("data-listing-id", &self.id);
        attrs.set("data-listing-suffix", &self.suffix);
        attrs
    }

    fn table_attrs(&self) -> HtmlAttrs {
        let mut attrs = self.params.attrs("attrs");
        attrs.add("class", &self.options.css_class);
        attrs.add("class", &self.theme.str("theme_listing_class"));
        attrs.add("class", &self.theme.str("theme_class"));
        if self.options.is_selecting() {
            attrs.add("class", "selectable");
            if self.options.selection_multiple {
                attrs.add("class", "selection-multiple");
            }
        }
        if self.options.is_editing() {
            attrs.add("class", "editing");
        }
        if self.group_by.is_some() {
            attrs.add("class", "group-by");
        }
        attrs
    }

    fn row_attrs(&self, rec: &Record) -> HtmlAttrs {
        let mut attrs = self.params.attrs("row_attrs");
        attrs.add("class", &self.theme.str("theme_row_class"));
        attrs.add("class", if rec.abs_index() % 2 == 1 { "odd" } else { "even" });
        if self.options.is_selecting() {
            attrs.add("class", "row-selector");
        }
        if rec.is_selected() {
            attrs.add("class", "selected");
        }
        if rec.is_flashed() {
            attrs.add("class", "flash-once");
        }
        if rec.is_editing() {
            attrs.add("class", "editing");
        }
        attrs.set("data-pk", &rec.pk_text());
        attrs
    }

    /// Footer row shown when asked for, or when a column aggregates or has
    /// a footer value.
    fn has_footer(&self) -> bool {
        self.options.has_footer.unwrap_or_else(|| {
            self.selected
                .iter()
                .any(|c| c.aggregation().is_some() || c.params().is_set("footer"))
        })
    }

    /// Reduces an aggregating column over the page, or over the filtered
    /// rows for `global_` aggregations.
    fn reduce_column(&self, col: &Column, prepared: &Prepared, env: &RenderEnv<'_>) -> Result<Option<Map<String, Value>>> {
        let Some(agg) = col.aggregation() else {
            return Ok(None);
        };
        if !agg.global {
            let values: Vec<Value> = prepared.records.iter().map(|r| col.cell_value(r, env)).collect();
            return Ok(agg.reduce(&values));
        }
        let manager = prepared.manager();
        let query = manager.query();
        let mut results = Vec::new();
        for op in agg.ops() {
            match manager.store().aggregate(&query, col.data_key(), *op)? {
                Some(value) => results.push((*op, value)),
                None => {
                    let values: Vec<Value> = manager
                        .all()?
                        .iter()
                        .map(|row| keypath::resolve(row, col.data_key()).unwrap_or(Value::Null))
                        .collect();
                    return Ok(agg.reduce(&values));
                }
            }
        }
        Ok(Some(footer_context(&results)))
    }

    /// Top and bottom toolbars, empty when not placed there.
    fn render_toolbars(&self) -> Result<(String, String)> {
        let declaration = self.params.get("toolbar").cloned().unwrap_or(Value::Null);
        let toolbar = Toolbar::bind(
            &declaration,
            &ToolbarBindContext {
                layers: self.layers(),
                columns: &self.selected,
                nb_variations: self.spec.variations.len(),
            },
        )?;
        if toolbar.is_empty() {
            return Ok((String::new(), String::new()));
        }
        let sort = self.params.str("sort");
        let items = toolbar.render_items(
            &ToolbarEnv {
                url: &self.url,
                theme: &self.theme,
                sort: &sort,
                per_page: self.options.per_page,
                variation: self.variation,
                all_columns: &self.all_columns,
                group_by: self.group_by.as_ref(),
            },
            self.engine.as_ref(),
        )?;
        let placement = ToolbarPlacement::parse(&self.options.toolbar_placement);
        let render = |at: &str| {
            self.engine
                .render_themed(self.theme.name(), TOOLBAR_TEMPLATE, &json!({"items": items, "placement": at}))
        };
        let top = if placement.top() { render("top")? } else { String::new() };
        let bottom = if placement.bottom() { render("bottom")? } else { String::new() };
        Ok((top, bottom))
    }

    /// Format asked for with the `export` key, if any.
    pub fn export_format(&self) -> Result<Option<ExportFormat>> {
        match self.params.opt_str("export").filter(|f| !f.trim().is_empty()) {
            Some(name) => name.parse().map(Some),
            None => Ok(None),
        }
    }

    /// Every filtered row, in listing order, flattened for a codec.
    pub fn export_table(&mut self, format: ExportFormat) -> Result<ExportTable> {
        let prepared = self.take_prepared()?;
        let result = self.build_export(&prepared, format);
        self.prepared = Some(prepared);
        result
    }

    fn build_export(&self, prepared: &Prepared, format: ExportFormat) -> Result<ExportTable> {
        let manager = prepared.manager();
        let rows = manager.all()?;
        let count = rows.len();
        let mut records = manager.materialize(rows, &Page::new(1, 0, count, count), count);
        if self.group_by.is_none() && self.model.is_some() {
            resolve_relations(self.store.as_ref(), &mut records, &self.selected)?;
        }
        let listing = self.listing_context(prepared);
        let global_context = self.global_context();
        let env = self.render_env(&listing, &global_context);
        let columns: Vec<&Column> = self
            .selected
            .iter()
            .filter(|c| c.is_exportable() && !matches!(c.kind(), ColumnKind::Selection | ColumnKind::Button))
            .collect();
        let header = columns
            .iter()
            .map(|c| (c.name().to_string(), c.exported_header()))
            .collect();
        let rows = records
            .iter()
            .map(|rec| columns.iter().map(|c| c.export_value(rec, &env)).collect())
            .collect();
        debug!(listing = %self.id, format = %format, rows = count, "export table built");
        Ok(ExportTable::new(format, &self.id, header, rows))
    }
}
