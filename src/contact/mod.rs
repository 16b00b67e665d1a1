//! Contact-form path: bot verification and the notification email.

pub mod email;
pub mod recaptcha;

use serde_json::Value;

use email::OutboundEmail;

pub const NOT_PROVIDED: &str = "Not provided";

/// Contact form fields. Anything absent or not a string becomes
/// [`NOT_PROVIDED`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub full_name: String,
    pub email: String,
    pub company: String,
    pub project_focus: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn from_payload(payload: &Value) -> Self {
        let field = |key: &str| {
            payload
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(NOT_PROVIDED)
                .to_string()
        };

        Self {
            full_name: field("fullName"),
            email: field("email"),
            company: field("company"),
            project_focus: field("projectFocus"),
            message: field("message"),
        }
    }
}

pub fn compose_contact_email(submission: &ContactSubmission, from: &str, to: &str) -> OutboundEmail {
    OutboundEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!(
            "New Contact: {} - {}",
            submission.full_name, submission.project_focus
        ),
        html: render_html(submission),
    }
}

fn render_html(s: &ContactSubmission) -> String {
    let name = escape_html(&s.full_name);
    let email = escape_html(&s.email);
    let company = escape_html(&s.company);
    let focus = escape_html(&s.project_focus);
    let message = escape_html(&s.message);

    format!(
        r##"<html>
<body style="font-family: Arial, sans-serif; padding: 20px; background-color: #f4f4f4;">
  <div style="max-width: 600px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px;">
    <h2 style="color: #2d5016; border-bottom: 2px solid #2d5016; padding-bottom: 10px;">New Contact Form Submission</h2>
    <table style="width: 100%; border-collapse: collapse;">
      <tr><td style="padding: 10px 0; font-weight: bold; color: #333;">Full Name:</td><td style="padding: 10px 0; color: #555;">{name}</td></tr>
      <tr><td style="padding: 10px 0; font-weight: bold; color: #333;">Email:</td><td style="padding: 10px 0; color: #555;"><a href="mailto:{email}">{email}</a></td></tr>
      <tr><td style="padding: 10px 0; font-weight: bold; color: #333;">Company:</td><td style="padding: 10px 0; color: #555;">{company}</td></tr>
      <tr><td style="padding: 10px 0; font-weight: bold; color: #333;">Project Focus:</td><td style="padding: 10px 0; color: #555;">{focus}</td></tr>
    </table>
    <h3 style="color: #2d5016; margin-top: 20px;">Message:</h3>
    <p style="background: #f9f9f9; padding: 15px; border-radius: 5px; color: #555;">{message}</p>
  </div>
</body>
</html>
"##
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
