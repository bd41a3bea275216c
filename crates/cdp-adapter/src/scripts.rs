//! Page scripts evaluated by the Chromium session.

use serde_json::Value;

use crate::query::{ElementQuery, ElementState};

pub const ANCHOR_ATTR: &str = "data-testair-anchor";

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Script that finds the first element matching `query` in `state`, tags it
/// with `token` and returns `{status: 'ok', selector}` or `{status: 'not-found'}`.
pub fn locate_script(query: &ElementQuery, state: ElementState, token: &str) -> String {
    let query_json = serde_json::to_string(query).unwrap_or_else(|_| "null".to_string());
    format!(
        r#"(() => {{
            const query = {query};
            const state = {state};
            const attr = {attr};
            const token = {token};
            const normalize = (input) => (input || '').replace(/\s+/g, ' ').trim();
            const lower = (input) => normalize(input).toLowerCase();
            const contains = (haystack, needle) => lower(haystack).includes(lower(needle));
            const isVisible = (el) => {{
                if (!(el instanceof Element)) return false;
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0;
            }};
            const implicitRole = (el) => {{
                const tag = el.tagName.toLowerCase();
                const type = (el.getAttribute('type') || '').toLowerCase();
                if (tag === 'button') return 'button';
                if (tag === 'input' && ['submit', 'button', 'reset', 'image'].includes(type)) return 'button';
                if (tag === 'a' && el.hasAttribute('href')) return 'link';
                if (tag === 'input' && ['checkbox'].includes(type)) return 'checkbox';
                if (tag === 'textarea' || (tag === 'input' && ['', 'text', 'email', 'search', 'tel', 'url'].includes(type))) return 'textbox';
                return '';
            }};
            const roleOf = (el) => el.getAttribute('role') || implicitRole(el);
            const nameOf = (el) => {{
                const label = el.getAttribute('aria-label');
                if (label) return label;
                const labelledby = el.getAttribute('aria-labelledby');
                if (labelledby) {{
                    return labelledby.split(/\s+/)
                        .map(id => document.getElementById(id))
                        .map(node => node ? (node.textContent || '') : '')
                        .join(' ');
                }}
                if (el.tagName.toLowerCase() === 'input' && el.value) return el.value;
                if (el.title) return el.title;
                return el.innerText || el.textContent || '';
            }};
            const innermost = (nodes) => nodes.filter(el => !nodes.some(other => other !== el && el.contains(other)));
            const all = () => Array.from(document.querySelectorAll('body *'));
            let candidates = [];
            switch (query && query.kind) {{
                case 'css':
                    try {{
                        candidates = Array.from(document.querySelectorAll(query.selector));
                    }} catch (err) {{
                        return {{ status: 'invalid', message: String(err) }};
                    }}
                    break;
                case 'role':
                    candidates = all().filter(el => roleOf(el) === query.role && contains(nameOf(el), query.name));
                    break;
                case 'label': {{
                    const labels = Array.from(document.querySelectorAll('label')).filter(label => contains(label.innerText || label.textContent, query.text));
                    candidates = labels.map(label => label.control).filter(Boolean);
                    candidates = candidates.concat(all().filter(el => el.hasAttribute('aria-labelledby') && contains(nameOf(el), query.text)));
                    break;
                }}
                case 'placeholder':
                    candidates = Array.from(document.querySelectorAll('[placeholder]')).filter(el => contains(el.getAttribute('placeholder'), query.text));
                    break;
                case 'text':
                    candidates = innermost(all().filter(el => {{
                        const value = el.innerText || el.textContent || '';
                        if (!normalize(value)) return false;
                        return query.exact ? normalize(value) === normalize(query.content) : contains(value, query.content);
                    }}));
                    break;
                default:
                    return {{ status: 'invalid', message: 'unknown query' }};
            }}
            const match = candidates.find(el => state === 'visible' ? isVisible(el) : true);
            if (!match) {{
                return {{ status: 'not-found' }};
            }}
            match.setAttribute(attr, token);
            return {{ status: 'ok', selector: '[' + attr + '="' + token + '"]' }};
        }})()"#,
        query = query_json,
        state = js_string(state.as_str()),
        attr = js_string(ANCHOR_ATTR),
        token = js_string(token),
    )
}

pub fn inner_texts_script(selector: &str) -> String {
    format!(
        r#"(() => Array.from(document.querySelectorAll({selector})).map(el => el.innerText || ''))()"#,
        selector = js_string(selector),
    )
}

pub const CLEAR_VALUE_FN: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
    }
}"#;

#[derive(Debug, PartialEq, Eq)]
pub enum LocateOutcome {
    Found(String),
    NotFound,
    Invalid(String),
}

pub fn parse_locate_outcome(value: &Value) -> LocateOutcome {
    match value.get("status").and_then(Value::as_str) {
        Some("ok") => match value.get("selector").and_then(Value::as_str) {
            Some(selector) => LocateOutcome::Found(selector.to_string()),
            None => LocateOutcome::NotFound,
        },
        Some("invalid") => LocateOutcome::Invalid(
            value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("invalid query")
                .to_string(),
        ),
        _ => LocateOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embeds_query_as_json() {
        let script = locate_script(&ElementQuery::role("button", "Sign \"in\""), ElementState::Visible, "t-1");
        assert!(script.contains(r#""kind":"role""#));
        assert!(script.contains(r#"Sign \"in\""#));
        assert!(script.contains(r#"const state = "visible";"#));
        assert!(script.contains(ANCHOR_ATTR));
    }

    #[test]
    fn parses_outcomes() {
        assert_eq!(
            parse_locate_outcome(&json!({ "status": "ok", "selector": "[a=\"b\"]" })),
            LocateOutcome::Found("[a=\"b\"]".into())
        );
        assert_eq!(parse_locate_outcome(&json!({ "status": "not-found" })), LocateOutcome::NotFound);
        assert!(matches!(
            parse_locate_outcome(&json!({ "status": "invalid", "message": "bad" })),
            LocateOutcome::Invalid(msg) if msg == "bad"
        ));
    }
}
