use crate::dom::{ElementSpec, NodeId, PageDom, PageError};
use tracing::debug;

/// Data key carrying the agent's marker on a decorated password field.
pub const MARKER_KEY: &str = "keefillTrigger";
pub const TRIGGER_PADDING_PX: f32 = 32.0;
pub const TRIGGER_TITLE: &str = "Fill KeePass credentials";

fn trigger_element() -> ElementSpec {
    let styles = [
        ("position", "absolute"),
        ("right", "8px"),
        ("top", "50%"),
        ("transform", "translateY(-50%)"),
        ("width", "24px"),
        ("height", "24px"),
        ("background", "#4CAF50"),
        ("color", "white"),
        ("border", "none"),
        ("border-radius", "6px"),
        ("cursor", "pointer"),
        ("z-index", "10000"),
        ("padding", "0"),
        ("opacity", "0.85"),
    ];
    ElementSpec {
        tag: "button",
        text: "\u{1F511}".to_string(),
        attrs: vec![
            ("type", "button".to_string()),
            ("title", TRIGGER_TITLE.to_string()),
        ],
        styles: styles.iter().map(|(k, v)| (*k, v.to_string())).collect(),
    }
}

fn parse_px(value: Option<String>) -> f32 {
    value
        .as_deref()
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn has_trigger(dom: &impl PageDom, parent: NodeId) -> bool {
    dom.children(parent).into_iter().any(|c| {
        dom.attr(c, "type").as_deref() == Some("button")
            && dom.attr(c, "title").as_deref() == Some(TRIGGER_TITLE)
    })
}

/// Decorates `password` with the fill trigger. Returns the new trigger, or
/// `None` when the field already carries `marker` or has no parent.
pub fn attach_trigger(
    dom: &mut impl PageDom,
    password: NodeId,
    marker: &str,
) -> Result<Option<NodeId>, PageError> {
    if dom.data(password, MARKER_KEY).as_deref() == Some(marker) {
        return Ok(None);
    }
    dom.set_data(password, MARKER_KEY, marker)?;

    let Some(parent) = dom.parent(password) else {
        debug!(?password, "password field has no parent; no trigger");
        return Ok(None);
    };
    if has_trigger(dom, parent) {
        debug!(?password, "another agent already placed a trigger here");
        return Ok(None);
    }
    if dom.computed_style(parent, "position").as_deref() == Some("static") {
        dom.set_style(parent, "position", "relative")?;
    }
    let padding = parse_px(dom.computed_style(password, "padding-right")) + TRIGGER_PADDING_PX;
    dom.set_style(password, "padding-right", &format!("{padding}px"))?;

    let trigger = dom.append_element(parent, &trigger_element())?;
    debug!(?password, ?trigger, "fill trigger attached");
    Ok(Some(trigger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryPage;

    fn login_page() -> (MemoryPage, NodeId, NodeId) {
        let mut page = MemoryPage::new("https://example.com/login");
        let wrap = page.add(page.body(), "div", &[]);
        let pass = page.add(wrap, "input", &[("type", "password")]);
        (page, wrap, pass)
    }

    #[test]
    fn places_trigger_next_to_field() {
        let (mut page, wrap, pass) = login_page();
        page.set_style(pass, "padding-right", "6px").unwrap();

        let trigger = attach_trigger(&mut page, pass, "m1").unwrap().unwrap();
        assert_eq!(page.parent(trigger), Some(wrap));
        assert_eq!(page.tag(trigger), Some("button"));
        assert_eq!(page.attr(trigger, "title").as_deref(), Some(TRIGGER_TITLE));
        assert_eq!(page.inline_style(wrap, "position").as_deref(), Some("relative"));
        assert_eq!(page.inline_style(pass, "padding-right").as_deref(), Some("38px"));
        assert_eq!(page.data(pass, MARKER_KEY).as_deref(), Some("m1"));
    }

    #[test]
    fn positioned_parent_is_left_alone() {
        let (mut page, wrap, pass) = login_page();
        page.set_style(wrap, "position", "absolute").unwrap();
        attach_trigger(&mut page, pass, "m1").unwrap();
        assert_eq!(page.inline_style(wrap, "position").as_deref(), Some("absolute"));
    }

    #[test]
    fn second_pass_adds_nothing() {
        let (mut page, wrap, pass) = login_page();
        attach_trigger(&mut page, pass, "m1").unwrap();
        assert_eq!(attach_trigger(&mut page, pass, "m1").unwrap(), None);
        assert_eq!(page.children(wrap).len(), 2);
        assert_eq!(page.inline_style(pass, "padding-right").as_deref(), Some("32px"));
    }

    #[test]
    fn second_agent_reuses_existing_trigger() {
        let (mut page, wrap, pass) = login_page();
        assert!(attach_trigger(&mut page, pass, "first").unwrap().is_some());
        assert_eq!(attach_trigger(&mut page, pass, "second").unwrap(), None);
        assert_eq!(page.children(wrap).len(), 2);
        assert_eq!(page.inline_style(pass, "padding-right").as_deref(), Some("32px"));
    }

    #[test]
    fn page_set_marker_does_not_suppress_trigger() {
        let (mut page, _, pass) = login_page();
        page.set_data(pass, MARKER_KEY, "forged").unwrap();
        assert!(attach_trigger(&mut page, pass, "m1").unwrap().is_some());
    }
}
