//! Renders slot notifications from templates.

use minijinja::Environment;
use minijinja::context;

use crate::notifier::Notification;
use crate::notifier::error::NotifyError;
use crate::service::Slot;

pub const BOOKING_URL: &str = "https://my.gov.ge";

const SUBJECT: &str = "📅 A new exam slot is available!";

const EMAIL_BODY: &str = r#"<div style="font-family: Arial, sans-serif; padding: 20px; background-color: #f5f5f5;">
  <div style="max-width: 600px; margin: 0 auto; background-color: white; padding: 30px; border-radius: 10px;">
    <h1 style="color: #2563eb;">🎉 An exam slot is available!</h1>
    <div style="background-color: #eff6ff; padding: 20px; border-radius: 8px; margin-bottom: 20px;">
      <p><strong>Category:</strong> {{ category }}</p>
      <p><strong>Center:</strong> {{ center }}</p>
      <p><strong>Date:</strong> {{ date }}</p>
    </div>
    <p style="color: #666;">Book it on the official portal:</p>
    <a href="{{ link }}" style="display: inline-block; background-color: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px;">Go to {{ link }}</a>
    <p style="color: #999; font-size: 12px; margin-top: 30px;">Sent by exam-watch</p>
  </div>
</div>"#;

const TELEGRAM_TEXT: &str = "🎉 *A new exam slot is available!*

📋 *Category:* {{ category | md }}
🏢 *Center:* {{ center | md }}
📅 *Date:* {{ date | md }}

Book it here:
👉 {{ link }}";

pub struct MessageBuilder {
    env: Environment<'static>,
}

impl MessageBuilder {
    pub fn new() -> Result<Self, NotifyError> {
        let mut env = Environment::new();
        env.add_filter("md", escape_markdown);
        env.add_template("subject.txt", SUBJECT)?;
        // `.html` turns on auto-escaping for labels coming from upstream.
        env.add_template("email.html", EMAIL_BODY)?;
        env.add_template("telegram.txt", TELEGRAM_TEXT)?;
        Ok(Self { env })
    }

    pub fn build(&self, slot: &Slot) -> Result<Notification, NotifyError> {
        let ctx = context! {
            category => slot.category_label,
            center => slot.location_label,
            date => slot.date,
            link => BOOKING_URL,
        };
        Ok(Notification {
            subject: self.env.get_template("subject.txt")?.render(&ctx)?,
            html_body: self.env.get_template("email.html")?.render(&ctx)?,
            text: self.env.get_template("telegram.txt")?.render(&ctx)?,
        })
    }
}

/// Escapes the characters legacy Telegram Markdown treats as markup.
fn escape_markdown(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(location: &str) -> Slot {
        Slot {
            date: "2025-03-01".to_string(),
            location_label: location.to_string(),
            category_label: "B".to_string(),
        }
    }

    #[test]
    fn test_build_includes_slot_details() {
        let notification = MessageBuilder::new().unwrap().build(&slot("Rustavi")).unwrap();

        assert_eq!(notification.subject, SUBJECT);
        assert!(notification.html_body.contains("2025-03-01"));
        assert!(notification.html_body.contains("Rustavi"));
        assert!(notification.text.contains("*Date:* 2025-03-01"));
        assert!(notification.text.contains(BOOKING_URL));
    }

    #[test]
    fn test_labels_are_escaped() {
        let notification = MessageBuilder::new()
            .unwrap()
            .build(&slot("<b>Kutaisi_2</b>"))
            .unwrap();

        assert!(notification.html_body.contains("&lt;b&gt;Kutaisi_2&lt;"));
        assert!(!notification.html_body.contains("<b>Kutaisi"));
        assert!(notification.text.contains("<b>Kutaisi\\_2</b>"));
    }
}
