use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::IdentityError;

/// SMTP configuration, loaded from env by `Config` (§4.G).
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub app_name: String,
    pub app_url: String,
}

impl EmailConfig {
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let smtp_port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let smtp_username = std::env::var("SMTP_USERNAME").ok()?;
        let smtp_password = std::env::var("SMTP_PASSWORD").ok()?;
        let from_email = std::env::var("SMTP_FROM_EMAIL").ok()?;
        let from_name = std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Jiko Auth".to_string());
        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "Jiko Auth".to_string());
        let app_url = std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        Some(Self {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            from_email,
            from_name,
            app_name,
            app_url,
        })
    }
}

/// SMTP-backed sender for the one transactional email the core surface needs:
/// the email verification link (§4.D).
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Result<Self, IdentityError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| IdentityError::MailError(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            config: Arc::new(config),
            mailer: Arc::new(mailer),
        })
    }

    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> Result<(), IdentityError> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| IdentityError::MailError(e.to_string()))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| IdentityError::MailError(e.to_string()))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| IdentityError::MailError(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| IdentityError::MailError(e.to_string()))?;

        info!("email sent to {}", to);
        Ok(())
    }

    /// Send the email verification link. A mail failure is logged, never
    /// surfaced to the caller: registration still succeeds (§4.D).
    pub async fn send_email_verification(&self, to: &str, verification_token: &str) {
        let verify_url = format!(
            "{}/api/v1/auth/verify-email?token={}",
            self.config.app_url, verification_token
        );

        let html = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .header {{ background: #4F46E5; color: white; padding: 20px; text-align: center; }}
        .content {{ padding: 30px; background: #f9fafb; }}
        .button {{ display: inline-block; padding: 12px 24px; background: #4F46E5; color: white; text-decoration: none; border-radius: 6px; margin: 20px 0; }}
        .footer {{ padding: 20px; text-align: center; color: #666; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{app_name}</h1>
        </div>
        <div class="content">
            <h2>Verify Your Email</h2>
            <p>Welcome to {app_name}! Please verify your email address by clicking the button below:</p>
            <p style="text-align: center;">
                <a href="{verify_url}" class="button">Verify Email</a>
            </p>
            <p>Or copy and paste this link into your browser:</p>
            <p style="word-break: break-all; color: #4F46E5;">{verify_url}</p>
            <p>This link expires in 3 minutes.</p>
        </div>
        <div class="footer">
            <p>© {year} {app_name}. All rights reserved.</p>
        </div>
    </div>
</body>
</html>
"#,
            app_name = self.config.app_name,
            verify_url = verify_url,
            year = chrono::Utc::now().format("%Y")
        );

        if let Err(e) = self
            .send_email(to, &format!("Verify your {} email", self.config.app_name), &html)
            .await
        {
            error!(error = %e, recipient = to, "failed to send verification email");
        }
    }
}

/// Development-mode stand-in that logs instead of dialing out (§4.D:
/// `APP_ENV != production` auto-verifies and suppresses mail, but the
/// surface is kept for local runs that still want to see the link logged).
#[derive(Clone, Default)]
pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }

    pub async fn send_email_verification(&self, to: &str, verification_token: &str) {
        info!("[mock email] verification to {}: token={}", to, verification_token);
    }
}
