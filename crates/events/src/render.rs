//! HTML rendering for outbound notification emails.
//!
//! Every email shares one layout (header, body, footer, optional action
//! button). A [`TemplateRenderer`] produces the body for a named template;
//! when the name is unknown the worker falls back to [`fallback_html`], which
//! builds the body from the data's `title`, `message` and `action_url`.

use handlebars::{html_escape, Handlebars};
use serde_json::Value;

use emporia_core::notification::{NotificationType, GENERIC_TEMPLATE};

/// Error type for template rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template registered under the name.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The template exists but failed to compile or render.
    #[error("Template render error: {0}")]
    Render(String),
}

/// Renders a named template into a complete HTML document.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError>;
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

const BRAND: &str = "Emporia";

/// Wrap a body fragment in the shared email layout. `title` and `action_url`
/// are escaped; `content_html` is inserted as is.
pub fn render_layout(title: &str, content_html: &str, action_url: Option<&str>) -> String {
    let button = action_url
        .filter(|url| !url.is_empty())
        .map(|url| {
            format!(
                r#"<p style="margin:24px 0"><a href="{}" style="background:#1f6feb;color:#fff;padding:10px 18px;border-radius:4px;text-decoration:none">View details</a></p>"#,
                html_escape(url)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family:Helvetica,Arial,sans-serif;background:#f5f6f8;margin:0;padding:24px">
<table role="presentation" width="100%" style="max-width:600px;margin:0 auto;background:#fff;border-radius:6px">
<tr><td style="padding:20px 24px;border-bottom:1px solid #e5e7eb"><strong>{BRAND}</strong></td></tr>
<tr><td style="padding:24px">
<h1 style="font-size:20px;margin:0 0 16px">{title}</h1>
{content_html}
{button}
</td></tr>
<tr><td style="padding:16px 24px;color:#6b7280;font-size:12px;border-top:1px solid #e5e7eb">You are receiving this email because of your notification settings on {BRAND}.</td></tr>
</table>
</body>
</html>"#,
        title = html_escape(title),
    )
}

fn str_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

/// Layout built straight from `title`, `message` and `action_url`.
pub fn fallback_html(data: &Value) -> String {
    let title = str_field(data, "title").unwrap_or("Notification");
    let message = str_field(data, "message").unwrap_or_default();
    let content = format!("<p>{}</p>", html_escape(message));
    render_layout(title, &content, str_field(data, "action_url"))
}

// ---------------------------------------------------------------------------
// HandlebarsRenderer
// ---------------------------------------------------------------------------

const ORDER_BODY: &str = r#"<p>{{message}}</p>
{{#if order_number}}<p>Order <strong>#{{order_number}}</strong>{{#if total}} &middot; {{total}}{{/if}}</p>{{/if}}
{{#if customer_name}}<p>Customer: {{customer_name}}</p>{{/if}}"#;

const PRODUCT_BODY: &str = r#"<p>{{message}}</p>
{{#if product_name}}<p><strong>{{product_name}}</strong>{{#if stock}} &middot; {{stock}} left in stock{{/if}}</p>{{/if}}"#;

const PAYMENT_BODY: &str = r#"<p>{{message}}</p>
{{#if amount}}<p>Amount received: <strong>{{amount}}</strong></p>{{/if}}"#;

const STORE_BODY: &str = r#"<p>{{message}}</p>
{{#if store_url}}<p>Your store is live at <a href="{{store_url}}">{{store_url}}</a></p>{{/if}}"#;

const CUSTOMER_BODY: &str = r#"<p>{{message}}</p>
{{#if customer_email}}<p>Contact: {{customer_email}}</p>{{/if}}"#;

const GENERIC_BODY: &str = "<p>{{message}}</p>";

/// Handlebars-based renderer with a built-in body per notification type.
pub struct HandlebarsRenderer {
    handlebars: Handlebars<'static>,
}

impl HandlebarsRenderer {
    /// Create a renderer with the built-in templates registered.
    pub fn new() -> Result<Self, RenderError> {
        let mut renderer = Self {
            handlebars: Handlebars::new(),
        };
        for notification_type in NotificationType::ALL {
            let body = match notification_type {
                NotificationType::Order => ORDER_BODY,
                NotificationType::Product => PRODUCT_BODY,
                NotificationType::Payment => PAYMENT_BODY,
                NotificationType::Store => STORE_BODY,
                NotificationType::Customer => CUSTOMER_BODY,
                NotificationType::System => GENERIC_BODY,
            };
            renderer.register(notification_type.template_name(), body)?;
        }
        if !renderer.has_template(GENERIC_TEMPLATE) {
            renderer.register(GENERIC_TEMPLATE, GENERIC_BODY)?;
        }
        Ok(renderer)
    }

    /// Register (or replace) a body template.
    pub fn register(&mut self, name: &str, body: &str) -> Result<(), RenderError> {
        self.handlebars
            .register_template_string(name, body)
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        if !self.has_template(name) {
            return Err(RenderError::TemplateNotFound(name.to_string()));
        }
        let body = self
            .handlebars
            .render(name, data)
            .map_err(|e| RenderError::Render(e.to_string()))?;
        let title = str_field(data, "title").unwrap_or("Notification");
        Ok(render_layout(title, &body, str_field(data, "action_url")))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn every_notification_type_has_a_template() {
        let renderer = HandlebarsRenderer::new().unwrap();
        for notification_type in NotificationType::ALL {
            assert!(renderer.has_template(notification_type.template_name()));
        }
        assert!(renderer.has_template(GENERIC_TEMPLATE));
    }

    #[test]
    fn order_template_renders_fields_inside_layout() {
        let renderer = HandlebarsRenderer::new().unwrap();
        let html = renderer
            .render(
                "order_notification",
                &json!({
                    "title": "New order #1001",
                    "message": "Jane placed an order.",
                    "order_number": "1001",
                    "total": "42.00 USD",
                    "action_url": "https://shop.example.com/orders/1",
                }),
            )
            .unwrap();
        assert!(html.contains("New order #1001"));
        assert!(html.contains("<strong>#1001</strong>"));
        assert!(html.contains("42.00 USD"));
        assert!(html.contains(r#"href="https://shop.example.com/orders/1""#));
    }

    #[test]
    fn unknown_template_is_reported_distinctly() {
        let renderer = HandlebarsRenderer::new().unwrap();
        assert_matches!(
            renderer.render("nope", &json!({})),
            Err(RenderError::TemplateNotFound(name)) if name == "nope"
        );
    }

    #[test]
    fn broken_template_fails_registration() {
        let mut renderer = HandlebarsRenderer::new().unwrap();
        assert_matches!(
            renderer.register("broken", "{{#if open}}never closed"),
            Err(RenderError::Render(_))
        );
    }

    #[test]
    fn fallback_escapes_message_and_omits_missing_button() {
        let html = fallback_html(&json!({"title": "Hi", "message": "<script>x</script>"}));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("View details"));

        let with_link = fallback_html(&json!({"message": "m", "action_url": "/a"}));
        assert!(with_link.contains("View details"));
        assert!(with_link.contains("<h1 style=\"font-size:20px;margin:0 0 16px\">Notification</h1>"));
    }
}
