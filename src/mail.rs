/*!
Outbound notification email.

All mail is best-effort and fire-and-forget: each message is tried
against the configured SMTP relays in order, the first success wins,
and total failure is logged and swallowed. Nothing here ever blocks or
fails the HTTP request that triggered it.
*/
use std::sync::Arc;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

/// One SMTP relay from the config file.
#[derive(Clone, Debug, Deserialize)]
pub struct RelaySpec {
    pub host: String,
    pub username: String,
    pub password: String,
}

pub struct Mailer {
    from: Mailbox,
    operator: Mailbox,
    /// Public base URL used to build verification/reset links.
    base_url: String,
    relays: Vec<(String, AsyncSmtpTransport<Tokio1Executor>)>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from", &self.from)
            .field("operator", &self.operator)
            .field("base_url", &self.base_url)
            .field("relays", &self.relays.iter().map(|r| &r.0).collect::<Vec<_>>())
            .finish()
    }
}

fn verification_body(base_url: &str, code: &str) -> String {
    format!(
        "<p>Thank you for signing up! To verify your email, click the following link:</p>\n\
         <a href=\"{0}/verify?code={1}\">Verify Email</a>",
        base_url, code
    )
}

fn reset_body(base_url: &str, token: &str) -> String {
    let link = format!("{}/reset?code={}", base_url, token);
    format!(
        "<p>We received a request to reset your password. Click the link below to reset your password:</p>\n\
         <a href=\"{0}\">{0}</a>",
        link
    )
}

impl Mailer {
    pub fn new(
        from_addr: &str,
        operator_addr: &str,
        base_url: &str,
        specs: &[RelaySpec],
    ) -> Result<Self, String> {
        let from: Mailbox = from_addr.parse()
            .map_err(|e| format!("Bad from address {:?}: {}", from_addr, e))?;
        let operator: Mailbox = operator_addr.parse()
            .map_err(|e| format!("Bad operator address {:?}: {}", operator_addr, e))?;

        let mut relays = Vec::with_capacity(specs.len());
        for spec in specs.iter() {
            let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&spec.host)
                .map_err(|e| format!("Bad relay host {:?}: {}", &spec.host, e))?
                .credentials(Credentials::new(
                    spec.username.clone(),
                    spec.password.clone(),
                ))
                .build();
            relays.push((spec.host.clone(), transport));
        }

        if relays.is_empty() {
            log::warn!("No mail relays configured; outbound mail will be dropped.");
        }

        Ok(Self {
            from,
            operator,
            base_url: base_url.trim_end_matches('/').to_owned(),
            relays,
        })
    }

    fn message(
        &self,
        to: Mailbox,
        subject: &str,
        body: String,
        html: bool,
    ) -> Result<Message, String> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(if html { ContentType::TEXT_HTML } else { ContentType::TEXT_PLAIN });

        builder.body(body)
            .map_err(|e| format!("Error building message: {}", &e))
    }

    /// Try the relays in order; first success wins.
    async fn send(&self, msg: Message, what: &str) {
        for (host, transport) in self.relays.iter() {
            match transport.send(msg.clone()).await {
                Ok(_) => {
                    log::info!("{} sent via {}.", what, host);
                    return;
                },
                Err(e) => {
                    log::error!("Error sending {} via {}: {}", what, host, &e);
                },
            }
        }
        log::error!("All relays failed; {} dropped.", what);
    }

    /// Queue a message in the background. Send failures are logged and
    /// otherwise ignored.
    fn post(self: &Arc<Self>, to: Mailbox, subject: &str, body: String, html: bool) {
        let msg = match self.message(to, subject, body, html) {
            Ok(m) => m,
            Err(e) => {
                log::error!("Dropping unbuildable message {:?}: {}", subject, &e);
                return;
            },
        };

        let mailer = Arc::clone(self);
        let what = format!("{:?} mail", subject);
        tokio::spawn(async move {
            mailer.send(msg, &what).await;
        });
    }

    fn visitor_mailbox(&self, email: &str) -> Option<Mailbox> {
        match email.parse() {
            Ok(mb) => Some(mb),
            Err(e) => {
                log::error!("Unmailable address {:?}: {}", email, &e);
                None
            },
        }
    }

    pub fn send_verification(self: &Arc<Self>, email: &str, code: &str) {
        if let Some(to) = self.visitor_mailbox(email) {
            self.post(
                to,
                "Account Verification",
                verification_body(&self.base_url, code),
                true,
            );
        }
    }

    pub fn send_password_reset(self: &Arc<Self>, email: &str, token: &str) {
        if let Some(to) = self.visitor_mailbox(email) {
            self.post(
                to,
                "Password Reset Request",
                reset_body(&self.base_url, token),
                true,
            );
        }
    }

    /// Confirmation pair: one note to the museum operator, one to the
    /// visitor.
    pub fn send_reservation_confirmed(
        self: &Arc<Self>,
        name: &str,
        email: &str,
        date: &str,
        slot: &str,
    ) {
        self.post(
            self.operator.clone(),
            "New Reservation",
            format!(
                "A new reservation has been made by {} for {} at {}.",
                name, date, slot
            ),
            false,
        );

        if let Some(to) = self.visitor_mailbox(email) {
            self.post(
                to,
                "Reservation Confirmation",
                format!(
                    "Thank you for your reservation, {}! Your reservation is confirmed for {} at {}.",
                    name, date, slot
                ),
                false,
            );
        }
    }

    pub fn send_reservation_updated(
        self: &Arc<Self>,
        name: &str,
        email: &str,
        date: &str,
        slot: &str,
    ) {
        self.post(
            self.operator.clone(),
            "Reservation Update",
            format!(
                "A reservation has been updated by {} for {} at {}.",
                name, date, slot
            ),
            false,
        );

        if let Some(to) = self.visitor_mailbox(email) {
            self.post(
                to,
                "Reservation Update Confirmation",
                format!(
                    "Your reservation has been updated successfully. New date and time: {} at {}.",
                    date, slot
                ),
                false,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(
            "museo <noreply@museo.example>",
            "operator@museo.example",
            "https://museo.example/",
            &[],
        ).unwrap()
    }

    #[test]
    fn bodies_carry_the_links() {
        let m = mailer();
        let body = verification_body(&m.base_url, "123456");
        assert!(body.contains("https://museo.example/verify?code=123456"));

        let body = reset_body(&m.base_url, "deadbeef");
        assert!(body.contains("https://museo.example/reset?code=deadbeef"));
    }

    #[test]
    fn messages_build() {
        let m = mailer();
        let to: Mailbox = "a@x.com".parse().unwrap();
        m.message(to, "Test", "<p>hi</p>".to_owned(), true).unwrap();
    }

    #[test]
    fn bad_addresses_rejected_up_front() {
        assert!(Mailer::new("not an address", "operator@museo.example", "x", &[]).is_err());
        assert!(Mailer::new("noreply@museo.example", "", "x", &[]).is_err());
    }

    #[test]
    fn unmailable_visitor_is_skipped() {
        let m = mailer();
        assert!(m.visitor_mailbox("not an address").is_none());
        assert!(m.visitor_mailbox("a@x.com").is_some());
    }
}
