// src/email.rs
//
// Transactional mail through the Resend REST API (POST /emails, bearer key).

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const RESEND_API_BASE: &str = "https://api.resend.com";
pub const DEFAULT_FROM: &str = "Renderiq <team@renderiq.io>";
pub const SUPPORT_EMAIL: &str = "support@renderiq.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery is not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("resend api error status={status} body={body}")]
    Api { status: u16, body: String },
}

pub struct Mailer<'a> {
    pub api_base: &'a str,
    pub api_key: Option<&'a str>,
    pub from: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    reply_to: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Sends one message and returns the provider message id.
pub async fn send_email(client: &reqwest::Client, mailer: &Mailer<'_>, email: &Email) -> Result<String, EmailError> {
    let api_key = mailer.api_key.filter(|k| !k.is_empty()).ok_or(EmailError::NotConfigured)?;

    let resp = client
        .post(format!("{}/emails", mailer.api_base))
        .bearer_auth(api_key)
        .timeout(REQUEST_TIMEOUT)
        .json(&SendRequest {
            from: mailer.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
            reply_to: SUPPORT_EMAIL,
        })
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(EmailError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<SendResponse>(&body)
        .map(|r| r.id)
        .map_err(|_| EmailError::Api {
            status: status.as_u16(),
            body,
        })
}

fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    }
}

fn html_page(title: &str, paragraphs: &[String], link: Option<(&str, &str)>) -> String {
    let mut body = format!("<h2>{}</h2>", escape(title));
    for p in paragraphs {
        body.push_str(&format!("<p>{}</p>", escape(p.as_str())));
    }
    if let Some((label, href)) = link {
        let href = escape(href);
        body.push_str(&format!(
            "<p><a href=\"{href}\">{}</a></p><p>{href}</p>",
            escape(label)
        ));
    }
    format!("<!DOCTYPE html><html><body>{body}</body></html>")
}

pub fn verification_email(to: &str, name: Option<&str>, link: &str) -> Email {
    let hello = greeting(name);
    let paragraphs = vec![
        hello.clone(),
        "Thank you for signing up for Renderiq! Please verify your email address to complete your registration."
            .to_string(),
        "This verification link will expire in 24 hours.".to_string(),
        "If you didn't create an account with Renderiq, you can safely ignore this email.".to_string(),
    ];
    Email {
        to: to.to_string(),
        subject: "Verify Your Email Address - Renderiq".to_string(),
        html: html_page("Verify Your Email", &paragraphs, Some(("Verify Email Address", link))),
        text: format!(
            "{hello}\n\nThank you for signing up for Renderiq! Please verify your email address by clicking this link: {link}\n\n\
             This link will expire in 24 hours.\n\nIf you didn't create an account with Renderiq, you can safely ignore this email."
        ),
    }
}

pub fn password_reset_email(to: &str, name: Option<&str>, link: &str) -> Email {
    let hello = greeting(name);
    let paragraphs = vec![
        hello.clone(),
        "We received a request to reset your password for your Renderiq account.".to_string(),
        "This link will expire in 1 hour.".to_string(),
        "If you didn't request a password reset, you can safely ignore this email. Your password will remain unchanged."
            .to_string(),
    ];
    Email {
        to: to.to_string(),
        subject: "Reset Your Password - Renderiq".to_string(),
        html: html_page("Reset Your Password", &paragraphs, Some(("Reset Password", link))),
        text: format!(
            "{hello}\n\nWe received a request to reset your password. Click this link to reset it: {link}\n\n\
             This link will expire in 1 hour.\n\nIf you didn't request a password reset, you can safely ignore this email."
        ),
    }
}

pub fn password_changed_email(to: &str, name: Option<&str>) -> Email {
    let hello = greeting(name);
    let paragraphs = vec![
        hello.clone(),
        "Your password has been successfully reset.".to_string(),
        format!("If you didn't make this change, please contact our support team immediately at {SUPPORT_EMAIL}."),
    ];
    Email {
        to: to.to_string(),
        subject: "Password Reset Successful - Renderiq".to_string(),
        html: html_page("Password Reset Successful", &paragraphs, None),
        text: format!(
            "{hello}\n\nYour password has been successfully reset.\n\n\
             If you didn't make this change, please contact our support team immediately."
        ),
    }
}
