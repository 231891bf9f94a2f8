//! Outbound email notifications.
//!
//! Signing flow emails go out through Mailgun. Delivery is best-effort:
//! a failed send is logged and recorded in the audit trail by the caller,
//! it never fails the request that triggered it.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Settings;

const MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

/// Delivery seam. Handlers depend on this trait so tests can swap in a
/// recording implementation instead of hitting Mailgun.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one email. Returns whether delivery was accepted.
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool;
}

pub struct MailgunNotifier {
    client: Client,
    api_key: String,
    domain: String,
    from: String,
}

impl MailgunNotifier {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.mailgun_api_key.clone(),
            domain: settings.mailgun_domain.clone(),
            from: format!(
                "{} <{}>",
                settings.emails_from_name, settings.emails_from_email
            ),
        }
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool {
        let url = format!("{}/{}/messages", MAILGUN_API_BASE, self.domain);
        let form = [
            ("from", self.from.as_str()),
            ("to", to),
            ("subject", subject),
            ("html", html),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("Sent email \"{}\" to {}", subject, to);
                true
            }
            Ok(response) => {
                warn!(
                    "Mailgun rejected email to {}: HTTP {}",
                    to,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Failed to send email to {}: {}", to, e);
                false
            }
        }
    }
}

pub const SUBJECT_BORROWER_SIGNING: &str = "Pantbrev redo för signering";
pub const SUBJECT_COOPERATIVE_SIGNING: &str =
    "Pantbrev redo för bostadsrättsföreningens godkännande";
pub const SUBJECT_DEED_COMPLETED: &str = "Pantbrev fullständigt signerat";

pub fn signing_link(frontend_url: &str, deed_id: i64) -> String {
    format!("{}/deeds/{}/sign", frontend_url.trim_end_matches('/'), deed_id)
}

pub fn borrower_signing_email(
    recipient_name: &str,
    credit_number: &str,
    apartment_address: &str,
    link: &str,
) -> String {
    format!(
        "<html><body>\
         <p>Hej {recipient_name},</p>\
         <p>Ett pantbrev för lägenheten på {apartment_address} \
         (kreditnummer {credit_number}) väntar på din signatur.</p>\
         <p><a href=\"{link}\">Signera pantbrevet</a></p>\
         </body></html>"
    )
}

pub fn cooperative_signing_email(
    recipient_name: &str,
    cooperative_name: &str,
    credit_number: &str,
    link: &str,
) -> String {
    format!(
        "<html><body>\
         <p>Hej {recipient_name},</p>\
         <p>Alla låntagare har signerat pantbrevet med kreditnummer {credit_number}. \
         Det väntar nu på godkännande från {cooperative_name}.</p>\
         <p><a href=\"{link}\">Granska och signera</a></p>\
         </body></html>"
    )
}

pub fn deed_completed_email(recipient_name: &str, credit_number: &str) -> String {
    format!(
        "<html><body>\
         <p>Hej {recipient_name},</p>\
         <p>Pantbrevet med kreditnummer {credit_number} är nu signerat av samtliga parter.</p>\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_link_handles_trailing_slash() {
        assert_eq!(
            signing_link("http://localhost:3000/", 42),
            "http://localhost:3000/deeds/42/sign"
        );
        assert_eq!(
            signing_link("http://localhost:3000", 42),
            "http://localhost:3000/deeds/42/sign"
        );
    }

    #[test]
    fn test_borrower_email_contains_link_and_credit_number() {
        let html = borrower_signing_email(
            "Anna Andersson",
            "K-1001",
            "Storgatan 1",
            "http://localhost:3000/deeds/1/sign",
        );
        assert!(html.contains("K-1001"));
        assert!(html.contains("http://localhost:3000/deeds/1/sign"));
        assert!(html.contains("Anna Andersson"));
    }
}
