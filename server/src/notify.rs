//! Notification transports: lettre SMTP for production, a log-only
//! transport when SMTP is disabled.
//!
//! Sends run on worker-pool threads, so the blocking lettre transport is
//! used directly.

use lettre::message::SinglePart;
use lettre::transport::smtp::SmtpTransport;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, Transport};

use guardpost_types::notify_adapter::{Notification, NotifyConf, NotifyTransport};

use crate::prelude::*;

#[derive(Debug, Default)]
pub struct SmtpNotifyTransport;

impl NotifyTransport for SmtpNotifyTransport {
	fn send_notification(
		&self,
		conf: &NotifyConf,
		recipients: &[String],
		notification: &Notification,
	) -> GpResult<()> {
		let sender: lettre::message::Mailbox = conf
			.sender
			.parse()
			.map_err(|_| Error::ValidationError(format!("invalid sender address: {}", conf.sender)))?;

		let mut transport = SmtpTransport::relay(&conf.smtp_server)
			.map_err(|err| Error::Internal(format!("SMTP setup failed: {err}")))?;
		if !conf.smtp_username.is_empty() {
			transport = transport.credentials(Credentials::new(
				conf.smtp_username.clone(),
				conf.smtp_password.clone(),
			));
		}
		let transport = transport.build();

		let body = notification.paragraphs.join("\n\n");
		for recipient in recipients {
			let Ok(to) = recipient.parse() else {
				warn!(recipient, "Invalid notification recipient address, skipping");
				continue;
			};
			let email = Message::builder()
				.from(sender.clone())
				.to(to)
				.subject(&notification.subject)
				.singlepart(SinglePart::plain(body.clone()))
				.map_err(|err| Error::Internal(format!("failed to build email: {err}")))?;
			transport
				.send(&email)
				.map_err(|err| Error::Internal(format!("SMTP send failed: {err}")))?;
			debug!(recipient, subject = %notification.subject, "Sent notification");
		}
		Ok(())
	}
}

/// Used when SMTP is disabled in the configuration; notifications end up
/// in the log only.
#[derive(Debug, Default)]
pub struct LogNotifyTransport;

impl NotifyTransport for LogNotifyTransport {
	fn send_notification(
		&self,
		_conf: &NotifyConf,
		recipients: &[String],
		notification: &Notification,
	) -> GpResult<()> {
		info!(
			recipients = ?recipients,
			subject = %notification.subject,
			body = %notification.paragraphs.join(" / "),
			"SMTP disabled, notification logged only"
		);
		Ok(())
	}
}

// vim: ts=4
