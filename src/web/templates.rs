//! HTML templates for the task board pages.
//!
//! Templates are embedded at compile time using `include_str!` and filled
//! with [`fill`]. Placeholders are written `{{name}}`.

/// The base HTML template with navigation and layout.
pub const BASE_TEMPLATE: &str = include_str!("templates/base.html");

/// Task listing with search box and sort toggle.
pub const TASK_LIST_TEMPLATE: &str = include_str!("templates/task_list.html");

/// Create and update form.
pub const TASK_FORM_TEMPLATE: &str = include_str!("templates/task_form.html");

/// Delete confirmation.
pub const CONFIRM_DELETE_TEMPLATE: &str = include_str!("templates/task_confirm_delete.html");

pub const STATISTICS_TEMPLATE: &str = include_str!("templates/statistics.html");

/// Not-found and other error pages.
pub const ERROR_TEMPLATE: &str = include_str!("templates/error.html");

/// Substitute `{{name}}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// stays literal. Unknown placeholders are left as written.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = &after[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_replaces_known_placeholders_once() {
        let out = fill(
            "<h1>{{title}}</h1>{{body}}{{unknown}}",
            &[("title", "{{body}}"), ("body", "x")],
        );
        assert_eq!(out, "<h1>{{body}}</h1>x{{unknown}}");
    }

    #[test]
    fn fill_keeps_unterminated_braces() {
        assert_eq!(fill("a {{b", &[("b", "c")]), "a {{b");
    }

    #[test]
    fn templates_carry_their_placeholders() {
        assert!(BASE_TEMPLATE.contains("{{content}}"));
        assert!(TASK_LIST_TEMPLATE.contains("{{tasks}}"));
        assert!(TASK_FORM_TEMPLATE.contains("{{priority_options}}"));
        assert!(CONFIRM_DELETE_TEMPLATE.contains("{{task_title}}"));
        assert!(STATISTICS_TEMPLATE.contains("{{next_task}}"));
        assert!(ERROR_TEMPLATE.contains("{{message}}"));
    }
}
