use crate::dom::{NodeId, PageDom};

const USERNAME_NAME_HINTS: &[&str] = &["user", "login", "email"];

/// Input types that can never hold a username, whatever their name says.
const NON_TEXT_TYPES: &[&str] = &[
    "password", "hidden", "submit", "button", "checkbox", "radio", "image", "reset", "file",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginFields {
    pub username: Option<NodeId>,
    pub password: Option<NodeId>,
}

/// The `type` attribute as written. `None` when absent, which attribute
/// selectors such as `input[type="text"]` do not match.
fn declared_type(dom: &impl PageDom, node: NodeId) -> Option<String> {
    dom.attr(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
}

fn is_username_candidate(dom: &impl PageDom, node: NodeId) -> bool {
    let ty = declared_type(dom, node);
    match ty.as_deref() {
        Some(t) if NON_TEXT_TYPES.contains(&t) => return false,
        Some("text" | "email") => return true,
        _ => {}
    }
    dom.attr(node, "name")
        .map(|name| USERNAME_NAME_HINTS.iter().any(|h| name.contains(h)))
        .unwrap_or(false)
}

/// First password input, and the first input that looks like a username.
pub fn detect(dom: &impl PageDom) -> LoginFields {
    let inputs = dom.inputs();
    LoginFields {
        password: inputs
            .iter()
            .copied()
            .find(|n| declared_type(dom, *n).as_deref() == Some("password")),
        username: inputs
            .iter()
            .copied()
            .find(|n| is_username_candidate(dom, *n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryPage;

    #[test]
    fn finds_classic_login_form() {
        let mut page = MemoryPage::new("https://example.com/login");
        let form = page.add(page.body(), "form", &[]);
        let user = page.add(form, "input", &[("type", "email"), ("name", "email")]);
        let pass = page.add(form, "input", &[("type", "password")]);
        let second = page.add(form, "input", &[("type", "password")]);

        let fields = detect(&page);
        assert_eq!(fields.username, Some(user));
        assert_eq!(fields.password, Some(pass));
        assert_ne!(fields.password, Some(second));
    }

    #[test]
    fn name_hint_matches_unusual_types() {
        let mut page = MemoryPage::new("https://example.com");
        let tel = page.add(page.body(), "input", &[("type", "tel"), ("name", "login_id")]);
        page.add(page.body(), "input", &[("type", "password")]);
        assert_eq!(detect(&page).username, Some(tel));
    }

    #[test]
    fn untyped_inputs_qualify_by_name_only() {
        let mut page = MemoryPage::new("https://example.com");
        let header = page.add(page.body(), "div", &[]);
        page.add(header, "input", &[("name", "q")]);
        let form = page.add(page.body(), "form", &[]);
        let user = page.add(form, "input", &[("name", "username")]);
        page.add(form, "input", &[("type", "password")]);
        assert_eq!(detect(&page).username, Some(user));
    }

    #[test]
    fn untyped_input_without_hint_is_ignored() {
        let mut page = MemoryPage::new("https://example.com");
        page.add(page.body(), "input", &[("name", "q")]);
        assert_eq!(detect(&page), LoginFields::default());
    }

    #[test]
    fn hidden_and_password_inputs_are_not_usernames() {
        let mut page = MemoryPage::new("https://example.com");
        page.add(page.body(), "input", &[("type", "hidden"), ("name", "login_token")]);
        let pass = page.add(page.body(), "input", &[("type", "password"), ("name", "user_pass")]);
        let fields = detect(&page);
        assert_eq!(fields.username, None);
        assert_eq!(fields.password, Some(pass));
    }
}
