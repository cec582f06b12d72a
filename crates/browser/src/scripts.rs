//! Page-side JavaScript used by the CDP driver.
//!
//! Every snippet is a function expression taking a [`Target`] as its first
//! argument. [`invoke`] wraps it with the shared resolver.
//!
//! Selectors are plain CSS plus at most one trailing text filter:
//! `:has-text('..')` keeps elements whose text contains the string,
//! `:text-is('..')` keeps elements that, or one of whose descendants, have
//! exactly that text once whitespace is collapsed.

use std::sync::LazyLock;

use {
    regex::Regex,
    serde::Serialize,
    serde_json::Value,
};

use crate::driver::CaptchaKind;

static TEXT_FILTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)^(.*?):(has-text|text-is)\((?:'(.*)'|"(.*)")\)\s*$"#).ok()
});

/// A selector split into its CSS part and text filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub css: String,
    pub text: Option<String>,
    pub exact: bool,
}

impl Target {
    pub fn parse(selector: &str) -> Self {
        let caps = TEXT_FILTER.as_ref().and_then(|re| re.captures(selector));
        let Some(caps) = caps else {
            return Self {
                css: selector.trim().to_string(),
                text: None,
                exact: false,
            };
        };
        let css = caps.get(1).map_or("", |m| m.as_str()).trim();
        let exact = caps.get(2).is_some_and(|m| m.as_str() == "text-is");
        let text = caps
            .get(3)
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        let text = if exact {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text.to_string()
        };
        Self {
            css: if css.is_empty() { "*".into() } else { css.to_string() },
            text: Some(text),
            exact,
        }
    }
}

/// Resolver argument for `selector`.
pub fn target(selector: &str) -> Value {
    serde_json::to_value(Target::parse(selector)).unwrap_or(Value::Null)
}

/// Shared helpers prepended to every snippet.
const PRELUDE_JS: &str = r#"
const textOf = (el) => (el.innerText || el.textContent || '');
const squash = (s) => s.replace(/\s+/g, ' ').trim();
const resolveAll = (target) => {
    if (!target) return [];
    const nodes = Array.from(document.querySelectorAll(target.css));
    if (target.text === null || target.text === undefined) return nodes;
    if (!target.exact) return nodes.filter((el) => textOf(el).includes(target.text));
    const isExact = (el) => squash(textOf(el)) === target.text;
    return nodes.filter(
        (el) => isExact(el) || Array.from(el.querySelectorAll('*')).some(isExact),
    );
};
const resolve = (selector) => resolveAll(selector)[0] || null;
const isVisible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    return (
        rect.width > 0 &&
        rect.height > 0 &&
        style.visibility !== 'hidden' &&
        style.display !== 'none' &&
        parseFloat(style.opacity) > 0
    );
};
"#;

pub const PROBE_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return { attached: false, visible: false, enabled: false };
    return {
        attached: true,
        visible: isVisible(el),
        enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
    };
}"#;

pub const SCROLL_INTO_VIEW_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return false;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    return true;
}"#;

/// Center of the element plus whether a pointer event there would land on it.
pub const CLICK_POINT_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return null;
    const rect = el.getBoundingClientRect();
    const x = rect.x + rect.width / 2;
    const y = rect.y + rect.height / 2;
    const hit = document.elementFromPoint(x, y);
    return { x, y, hit: !!hit && (hit === el || el.contains(hit)) };
}"#;

pub const DISPATCH_CLICK_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return false;
    el.click();
    return true;
}"#;

pub const FOCUS_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return false;
    el.focus();
    return true;
}"#;

/// Focus the element and select its whole content, for inputs and
/// content-editable regions alike.
pub const SELECT_ALL_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return false;
    el.focus();
    if (typeof el.select === 'function') {
        el.select();
    } else {
        const range = document.createRange();
        range.selectNodeContents(el);
        const selection = window.getSelection();
        selection.removeAllRanges();
        selection.addRange(range);
    }
    return true;
}"#;

pub const INPUT_VALUE_JS: &str = r#"(selector) => {
    const el = resolve(selector);
    if (!el) return null;
    if ('value' in el && typeof el.value === 'string') return el.value;
    return el.innerText || '';
}"#;

pub const INNER_TEXTS_JS: &str = r#"(selector) => {
    return resolveAll(selector).map((el) => el.innerText || el.textContent || '');
}"#;

pub const ATTRIBUTE_JS: &str = r#"(selector, name) => {
    const el = resolve(selector);
    return el ? el.getAttribute(name) : null;
}"#;

/// Selector whose presence marks a captcha of the given family.
pub fn captcha_marker(kind: CaptchaKind) -> &'static str {
    match kind {
        CaptchaKind::HCaptcha => "iframe[src*='hcaptcha.com']",
        CaptchaKind::ReCaptcha => "iframe[src*='recaptcha']",
        CaptchaKind::GeeTest => "[class*='geetest']",
    }
}

/// Build an immediately-invoked expression calling `function` with `args`.
pub fn invoke(function: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("(() => {{{PRELUDE_JS}\nreturn ({function})({args});\n}})()")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_css_has_no_filter() {
        let t = Target::parse(" .task-row-container a ");
        assert_eq!(t.css, ".task-row-container a");
        assert_eq!(t.text, None);
        assert!(!t.exact);
    }

    #[test]
    fn has_text_is_a_substring_filter() {
        let t = Target::parse("button:has-text('Use this')");
        assert_eq!(t.css, "button");
        assert_eq!(t.text.as_deref(), Some("Use this"));
        assert!(!t.exact);
    }

    #[test]
    fn text_is_keeps_nested_pseudo_classes_in_the_css() {
        let t = Target::parse("button:has(p.text-token-text-primary):text-is('widget')");
        assert_eq!(t.css, "button:has(p.text-token-text-primary)");
        assert_eq!(t.text.as_deref(), Some("widget"));
        assert!(t.exact);

        let t = Target::parse(r"tr.group\/row:text-is('  acme/widget ')");
        assert_eq!(t.css, r"tr.group\/row");
        assert_eq!(t.text.as_deref(), Some("acme/widget"));
    }

    #[test]
    fn double_quotes_and_bare_filters() {
        let t = Target::parse(r#":has-text("Use 'this'")"#);
        assert_eq!(t.css, "*");
        assert_eq!(t.text.as_deref(), Some("Use 'this'"));
    }

    #[test]
    fn unterminated_filter_stays_css() {
        let t = Target::parse("button:has-text('oops");
        assert_eq!(t.css, "button:has-text('oops");
        assert_eq!(t.text, None);
    }

    #[test]
    fn invoke_escapes_selector_arguments() {
        let js = invoke(PROBE_JS, &[target("button:has-text('Use \"this\"')")]);
        assert!(js.contains(r#""text":"Use \"this\"""#));
        assert!(js.contains(r#""css":"button""#));
        assert!(js.starts_with("(() => {"));
        assert!(js.trim_end().ends_with("})()"));
    }

    #[test]
    fn invoke_includes_resolver_once() {
        let js = invoke(ATTRIBUTE_JS, &[target("a"), Value::from("href")]);
        assert_eq!(js.matches("const resolveAll").count(), 1);
        assert!(js.contains(r#"({"css":"a","text":null,"exact":false}, "href")"#));
    }

    #[test]
    fn every_captcha_kind_has_a_marker() {
        for kind in CaptchaKind::ALL {
            assert!(!captcha_marker(kind).is_empty());
        }
    }
}
