//! Outbound email through Resend: sign-in codes and dashboard invites.
//!
//! Templates are compiled into the binary. User-controlled values are
//! HTML-escaped before substitution.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::MailConfig;

const ACCESS_CODE_TEMPLATE: &str = include_str!("../../templates/access_code.html");
const INVITE_TEMPLATE: &str = include_str!("../../templates/invite.html");

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

/// Fields substituted into the invite email.
#[derive(Debug, Clone)]
pub struct InviteEmail<'a> {
    pub to: &'a str,
    pub inviter_name: &'a str,
    pub dashboard_name: &'a str,
    pub invite_code: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    config: MailConfig,
    app_base_url: String,
}

impl Mailer {
    #[must_use]
    pub fn new(config: MailConfig, app_base_url: impl Into<String>) -> Self {
        Self { config, app_base_url: app_base_url.into() }
    }

    /// Send a sign-in access code.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if the provider rejects the message.
    pub async fn send_access_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        let html = render_access_code(to, code);
        self.send(to, "Your Focusboard sign-in code", &html).await
    }

    /// Send a dashboard invite.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if the provider rejects the message.
    pub async fn send_invite(&self, invite: &InviteEmail<'_>) -> Result<(), MailError> {
        let html = render_invite(invite, &self.app_base_url);
        let subject = format!("You're invited to {}", invite.dashboard_name);
        self.send(invite.to, &subject, &html).await
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let resend = Resend::new(&self.config.api_key);
        let email = CreateEmailBaseOptions::new(&self.config.from, [to], subject).with_html(html);
        resend
            .emails
            .send(email)
            .await
            .map_err(|e| MailError(e.to_string()))?;
        Ok(())
    }
}

#[must_use]
pub fn render_access_code(email: &str, code: &str) -> String {
    ACCESS_CODE_TEMPLATE
        .replace("{{EMAIL}}", &escape_html(email))
        .replace("{{CODE}}", &escape_html(code))
}

#[must_use]
pub fn render_invite(invite: &InviteEmail<'_>, app_base_url: &str) -> String {
    let link = format!("{app_base_url}/invites");
    INVITE_TEMPLATE
        .replace("{{INVITER}}", &escape_html(invite.inviter_name))
        .replace("{{DASHBOARD}}", &escape_html(invite.dashboard_name))
        .replace("{{EMAIL}}", &escape_html(invite.to))
        .replace("{{LINK}}", &escape_html(&link))
        .replace("{{INVITE_CODE}}", &escape_html(invite.invite_code))
        .replace("{{OTP}}", &escape_html(invite.otp))
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "mailer_test.rs"]
mod tests;
