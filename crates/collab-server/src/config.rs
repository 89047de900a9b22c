use std::env;

use anyhow::Context;
use collab_shared::{DEFAULT_MEMBER_LIMIT, INVITE_TTL_DAYS, MAX_PENDING_INVITES};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in: i64,
    pub port: u16,
    pub app_base_url: String,
    pub mail: Option<MailConfig>,
    pub default_member_limit: i32,
    pub max_pending_invites: i64,
    pub invite_ttl_days: i64,
}

/// Transactional mail API. Absent when `MAIL_API_KEY` is unset; invites are
/// then shared by link only.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let mail = match env::var("MAIL_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => Some(MailConfig {
                api_url: env::var("MAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                api_key,
                from: env::var("MAIL_FROM").context("MAIL_FROM must be set with MAIL_API_KEY")?,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expires_in: env::var("JWT_EXPIRES_IN")
                .unwrap_or_else(|_| "86400".to_string()) // 1 day
                .parse()?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            mail,
            default_member_limit: env::var("DEFAULT_MEMBER_LIMIT")
                .map(|v| v.parse())
                .unwrap_or(Ok(DEFAULT_MEMBER_LIMIT))?,
            max_pending_invites: env::var("MAX_PENDING_INVITES")
                .map(|v| v.parse())
                .unwrap_or(Ok(MAX_PENDING_INVITES))?,
            invite_ttl_days: env::var("INVITE_TTL_DAYS")
                .map(|v| v.parse())
                .unwrap_or(Ok(INVITE_TTL_DAYS))?,
        })
    }
}
