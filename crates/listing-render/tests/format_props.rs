use listing_render::{escape_html, fill_slot, render_format, HtmlAttrs, RenderContext};
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn brace_free_text_is_unchanged(text in "[^{}]{0,40}") {
        let ctx = RenderContext::new();
        prop_assert_eq!(render_format(&text, &ctx).unwrap(), text);
    }

    #[test]
    fn grouping_only_inserts_commas(n in any::<i64>()) {
        let ctx = RenderContext::from_json(json!({"n": n}));
        let grouped = render_format("{n:,}", &ctx).unwrap();
        prop_assert_eq!(grouped.replace(',', ""), n.to_string());
    }

    #[test]
    fn fixed_precision_has_exact_decimals(x in -1.0e6f64..1.0e6, p in 0usize..6) {
        let ctx = RenderContext::from_json(json!({"x": x, "p": p}));
        let out = render_format("{x:.{p}f}", &ctx).unwrap();
        let decimals = out.split_once('.').map(|(_, d)| d.len()).unwrap_or(0);
        prop_assert_eq!(decimals, p);
    }

    #[test]
    fn width_is_a_minimum(s in "[a-z]{0,12}", w in 0usize..20) {
        let ctx = RenderContext::from_json(json!({"s": s.clone()}));
        let out = render_format(&format!("{{s:{}}}", w), &ctx).unwrap();
        prop_assert_eq!(out.chars().count(), s.len().max(w));
        prop_assert!(out.starts_with(&s));
    }

    #[test]
    fn escaped_text_has_no_markup(s in ".{0,40}") {
        let escaped = escape_html(&s);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('"'));
    }
}

#[test]
fn cell_template_composition() {
    let mut attrs = HtmlAttrs::new();
    attrs.add("class", "col-name");
    let mut ctx = RenderContext::from_json(json!({"rec": {"first": "Ann", "last": "Lee"}}));
    ctx.insert("attrs", json!(attrs.to_string()));
    let tpl = fill_slot("<td{attrs}>%s</td>", "{rec.first} {rec.last}");
    assert_eq!(
        render_format(&tpl, &ctx).unwrap(),
        r#"<td class="col-name">Ann Lee</td>"#
    );
}
