//! Page slicing and the paginator's rendering context.
//!
//! Slicing follows the classic rules: trailing orphans fold into the
//! previous page, an empty source still has one (empty) first page unless
//! `allow_empty_first_page` is off, and out-of-range page numbers clamp.

use listing_render::{escape_html, render_format, RenderContext, ThemeConfig};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::params::{recognised_keys, spec, Layers, ParamDefault as D, ParamMap, ParameterSpec, Params};
use crate::url::ListingUrl;

const PAGINATOR_PARAMS: &[ParameterSpec] = &[
    spec("template_name", D::Str("paginator.html")),
    spec("has_page_info", D::Bool(true)),
    spec("has_editable_page_info", D::Bool(false)),
    spec("page_info_tpl", D::Str("Page {page_number} of {nb_pages}")),
    spec("has_row_info", D::Bool(false)),
    spec("row_info_tpl", D::Str("{row_first}-{row_last} of {nb_rows}")),
    spec("has_prev_next", D::Bool(true)),
    spec("prev_text", D::Str("Previous")),
    spec("next_text", D::Str("Next")),
    spec("has_first_last", D::Bool(false)),
    spec("first_text", D::Str("First")),
    spec("last_text", D::Str("Last")),
    spec("fast_page_step", D::Int(0)),
    spec("fast_page_prev_tpl", D::Str("-{step}")),
    spec("fast_page_next_tpl", D::Str("+{step}")),
    spec("page_scale_size", D::Int(0)),
    spec("page_scale_ellipsis", D::Int(0)),
    spec("hide_disabled_buttons", D::Bool(false)),
    spec("hide_single_page", D::Bool(false)),
    spec(
        "parts_order",
        D::Str("first,fastprev,prev,pageinfo,rowinfo,scale,next,fastnext,last"),
    ),
    spec("has_goto_page", D::Bool(false)),
    spec("goto_page_tpl", D::Str("Go to page {goto_form}")),
    spec("in_footer", D::Bool(false)),
];

/// One page of a paginated source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// 0-based offset of the first row.
    pub bottom: usize,
    /// Exclusive offset after the last row.
    pub top: usize,
    count: usize,
}

impl Page {
    pub fn new(number: usize, bottom: usize, top: usize, count: usize) -> Self {
        Self {
            number,
            bottom,
            top,
            count,
        }
    }

    /// Rows in the whole source.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.top - self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.top == self.bottom
    }

    /// 1-based index of the first row, 0 on an empty source.
    pub fn start_index(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.bottom + 1
        }
    }

    /// 1-based index of the last row.
    pub fn end_index(&self) -> usize {
        self.top
    }
}

/// Slices `count` rows into pages.
#[derive(Debug, Clone)]
pub struct Paginator {
    params: Params,
    count: usize,
    per_page: usize,
    orphans: usize,
    num_pages: usize,
    parts: Vec<Vec<String>>,
}

/// Per-page size after clamping: `-1`, `0` or anything above `max` give `max`.
pub fn clamp_per_page(per_page: i64, max: usize) -> usize {
    let max = max.max(1);
    if per_page <= 0 {
        return max;
    }
    usize::try_from(per_page).map(|p| p.min(max)).unwrap_or(max)
}

fn parse_parts(order: &str) -> Vec<Vec<String>> {
    let compact: String = order.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(';')
        .map(|row| row.split(',').filter(|p| !p.is_empty()).map(str::to_string).collect())
        .collect()
}

impl Paginator {
    /// Paginator parameters read from `paginator_<key>` listing attributes.
    pub fn resolve_params(layers: &Layers<'_>) -> Result<Params> {
        let keys = recognised_keys("paginator", &[PAGINATOR_PARAMS]);
        layers.resolve(
            Params::from_specs(&[PAGINATOR_PARAMS]),
            &keys,
            "paginator",
            "",
            &ParamMap::new(),
            "paginator",
            false,
        )
    }

    pub fn new(params: Params, count: usize, per_page: usize, orphans: usize, allow_empty_first_page: bool) -> Self {
        let per_page = per_page.max(1);
        let num_pages = if count == 0 {
            usize::from(allow_empty_first_page)
        } else {
            let hits = count.saturating_sub(orphans).max(1);
            hits.div_ceil(per_page)
        };
        let parts = parse_parts(&params.str("parts_order"));
        Self {
            params,
            count,
            per_page,
            orphans,
            num_pages,
            parts,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Page for a raw `page` parameter. `last` is the last page; anything
    /// unparsable is the first page and out-of-range numbers clamp.
    pub fn get_page(&self, raw: Option<&str>) -> Page {
        let last = self.num_pages.max(1);
        let number = match raw.map(str::trim) {
            Some("last") => last,
            Some(text) => text.parse::<i64>().ok().filter(|n| *n >= 1).map(|n| n as usize).unwrap_or(1),
            None => 1,
        }
        .min(last);
        let bottom = (number - 1) * self.per_page;
        let mut top = bottom + self.per_page;
        if top + self.orphans >= self.count {
            top = self.count;
        }
        let bottom = bottom.min(top);
        debug!(number, bottom, top, pages = self.num_pages, "page selected");
        Page {
            number,
            bottom,
            top,
            count: self.count,
        }
    }

    fn page_entry(url: &ListingUrl, number: usize, current: usize) -> Value {
        json!({
            "number": number,
            "url": url.get_url(&[("page", number.to_string())], &[], None),
            "current": number == current,
        })
    }

    /// Template data of the paginator for `page`.
    pub fn context(&self, page: &Page, url: &ListingUrl, theme: &ThemeConfig) -> Result<Value> {
        let p = &self.params;
        let n = page.number;
        let num_pages = self.num_pages.max(1);
        let step = p.usize("fast_page_step").unwrap_or(0);
        let scale_size = p.usize("page_scale_size").unwrap_or(0);
        let ellipsis = p.usize("page_scale_ellipsis").unwrap_or(0);
        let page_url = |number: usize| url.get_url(&[("page", number.to_string())], &[], None);

        let mut scale = Vec::new();
        let mut beginning = Vec::new();
        let mut beginning_display = true;
        let mut ending = Vec::new();
        let mut ending_display = true;
        if scale_size > 0 {
            let mut scale_min = n.saturating_sub(scale_size / 2).max(1);
            let scale_max = (scale_min + scale_size - 1).min(num_pages);
            if ellipsis > 0 {
                beginning = (1..(ellipsis + 1).min(scale_min))
                    .map(|i| Self::page_entry(url, i, n))
                    .collect();
                if scale_min < ellipsis + 2 {
                    beginning_display = false;
                }
                if scale_max == num_pages {
                    scale_min = num_pages.saturating_sub(scale_size).max(1);
                } else {
                    let ending_min = (scale_max + 1).max((num_pages + 1).saturating_sub(ellipsis));
                    if ending_min == scale_max + 1 {
                        ending_display = false;
                    }
                    ending = (ending_min..=num_pages).map(|i| Self::page_entry(url, i, n)).collect();
                }
            }
            scale = (scale_min..=scale_max).map(|i| Self::page_entry(url, i, n)).collect();
        }

        let goto_form = if p.bool("has_editable_page_info") || p.bool("has_goto_page") {
            format!(
                "<form class=\"goto-page\">{}<input type=\"text\" value=\"{}\" name=\"{}\"></form>",
                url.hiddens_html(&["page"]),
                n,
                escape_html(&url.key("page")),
            )
        } else {
            String::new()
        };
        let page_number = if p.bool("has_editable_page_info") {
            Value::String(goto_form.clone())
        } else {
            json!(n)
        };
        let nb_page_rows = page.len();

        let fill = |tpl: &str, value: Value| -> Result<String> {
            Ok(render_format(tpl, &RenderContext::from_json(value))?)
        };
        let page_info = fill(
            &p.str("page_info_tpl"),
            json!({"page_number": page_number, "nb_pages": num_pages}),
        )?;
        let row_info = fill(
            &p.str("row_info_tpl"),
            json!({
                "row_first": page.start_index(),
                "row_last": page.end_index(),
                "nb_rows": self.count,
                "nb_page_rows": nb_page_rows,
            }),
        )?;
        let goto_page = fill(&p.str("goto_page_tpl"), json!({"goto_form": goto_form}))?;

        let theme_keys = [
            "button_a_class",
            "button_li_class",
            "button_text_class",
            "first_icon",
            "last_icon",
            "prev_icon",
            "next_icon",
            "fast_prev_icon",
            "fast_next_icon",
        ];
        let flags = [
            "first_last_has_icon",
            "first_last_has_text",
            "fast_page_has_icon",
            "fast_page_has_text",
            "prev_next_has_icon",
            "prev_next_has_text",
        ];
        let mut theme_map = serde_json::Map::new();
        for key in theme_keys {
            theme_map.insert(key.to_string(), Value::String(theme.str(&format!("paginator_theme_{}", key))));
        }
        for key in flags {
            theme_map.insert(key.to_string(), Value::Bool(theme.flag(&format!("paginator_theme_{}", key))));
        }

        Ok(json!({
            "params": p.to_json(),
            "theme": Value::Object(theme_map),
            "parts": self.parts,
            "number": n,
            "nb_pages": num_pages,
            "has_prev": n > 1,
            "has_next": n < num_pages,
            "first_page_url": page_url(1),
            "last_page_url": page_url(num_pages),
            "prev_page_url": page_url(n.saturating_sub(1).max(1)),
            "next_page_url": page_url((n + 1).min(num_pages)),
            "fast_page_prev_url": page_url(n.saturating_sub(step).max(1)),
            "fast_page_next_url": page_url((n + step).min(num_pages)),
            "fast_page_prev_text": fill(&p.str("fast_page_prev_tpl"), json!({"step": step}))?,
            "fast_page_next_text": fill(&p.str("fast_page_next_tpl"), json!({"step": step}))?,
            "scale_pages": scale,
            "beginning_ellipsis_pages": beginning,
            "beginning_ellipsis_display": beginning_display,
            "ending_ellipsis_pages": ending,
            "ending_ellipsis_display": ending_display,
            "nb_page_rows": nb_page_rows,
            "page_info": page_info,
            "row_info": row_info,
            "goto_page": goto_page,
            "show": num_pages > 1 || !p.bool("hide_single_page"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use proptest::prelude::*;

    fn paginator(count: usize, per_page: usize, orphans: usize) -> Paginator {
        Paginator::new(Params::from_specs(&[PAGINATOR_PARAMS]), count, per_page, orphans, true)
    }

    #[test]
    fn test_page_bounds() {
        let p = paginator(23, 5, 0);
        assert_eq!(p.num_pages(), 5);
        let page = p.get_page(Some("2"));
        assert_eq!((page.bottom, page.top), (5, 10));
        assert_eq!((page.start_index(), page.end_index()), (6, 10));
        let last = p.get_page(Some("last"));
        assert_eq!((last.number, last.bottom, last.top), (5, 20, 23));
        assert_eq!(p.get_page(Some("99")).number, 5);
        assert_eq!(p.get_page(Some("x")).number, 1);
    }

    #[test]
    fn test_orphans_fold_into_last_page() {
        let p = paginator(23, 5, 3);
        assert_eq!(p.num_pages(), 4);
        let last = p.get_page(Some("4"));
        assert_eq!((last.start_index(), last.end_index()), (16, 23));
    }

    #[test]
    fn test_empty_source() {
        let p = paginator(0, 5, 0);
        assert_eq!(p.num_pages(), 1);
        let page = p.get_page(None);
        assert!(page.is_empty());
        assert_eq!(page.start_index(), 0);
        let strict = Paginator::new(Params::from_specs(&[PAGINATOR_PARAMS]), 0, 5, 0, false);
        assert_eq!(strict.num_pages(), 0);
    }

    #[test]
    fn test_clamp_per_page() {
        assert_eq!(clamp_per_page(-1, 500), 500);
        assert_eq!(clamp_per_page(0, 500), 500);
        assert_eq!(clamp_per_page(900, 500), 500);
        assert_eq!(clamp_per_page(7, 500), 7);
    }

    #[test]
    fn test_context_info_and_scale() {
        let mut params = Params::from_specs(&[PAGINATOR_PARAMS]);
        params.set("page_scale_size", 3);
        params.set("has_row_info", true);
        let p = Paginator::new(params, 23, 5, 0, true);
        let req = Request::get("/people?page=2");
        let url = ListingUrl::new(&req, "");
        let theme = listing_render::get_theme("default").unwrap();
        let ctx = p.context(&p.get_page(Some("2")), &url, &theme).unwrap();
        assert_eq!(ctx["page_info"], "Page 2 of 5");
        assert_eq!(ctx["row_info"], "6-10 of 23");
        assert_eq!(ctx["prev_page_url"], "/people?page=1");
        let numbers: Vec<u64> = ctx["scale_pages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["number"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(ctx["theme"]["button_a_class"], "page-link");
    }

    #[test]
    fn test_editable_page_info_embeds_goto_form() {
        let mut params = Params::from_specs(&[PAGINATOR_PARAMS]);
        params.set("has_editable_page_info", true);
        let p = Paginator::new(params, 30, 10, 0, true);
        let req = Request::get("/people?sort-1=age");
        let url = ListingUrl::new(&req, "-1");
        let theme = listing_render::get_theme("default").unwrap();
        let ctx = p.context(&p.get_page(None), &url, &theme).unwrap();
        let info = ctx["page_info"].as_str().unwrap();
        assert!(info.contains("name=\"page-1\""));
        assert!(info.contains("name=\"sort-1\""));
        assert!(info.ends_with("of 3"));
    }

    proptest! {
        #[test]
        fn prop_pages_cover_rows(count in 0usize..200, per_page in 1usize..30, orphans in 0usize..5) {
            let p = paginator(count, per_page, orphans);
            let mut next = 1;
            for n in 1..=p.num_pages() {
                let page = p.get_page(Some(&n.to_string()));
                if count > 0 {
                    prop_assert_eq!(page.start_index(), next);
                    prop_assert!(page.len() >= 1);
                    next = page.end_index() + 1;
                }
            }
            prop_assert_eq!(next, count + 1);
        }
    }
}
