use scraper::ElementRef;

/// Visible text of an element with whitespace collapsed.
pub fn text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attribute value, trimmed; `None` when absent or blank.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accessible label plus tooltip, the two places controls describe themselves.
pub fn description(el: ElementRef) -> String {
    let aria = attr(el, "aria-label").unwrap_or("");
    let tooltip = attr(el, "data-tooltip").unwrap_or("");
    format!("{} {}", aria, tooltip).trim().to_string()
}

pub fn parent(el: ElementRef) -> Option<ElementRef> {
    el.parent().and_then(ElementRef::wrap)
}
