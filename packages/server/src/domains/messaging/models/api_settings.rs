use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Per-brand Twilio credentials.
///
/// A brand without a row (or with incomplete credentials) falls back to the
/// system-wide sender configured from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BrandApiSettings {
    pub brand_id: Uuid,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_whatsapp_number: Option<String>,
}

impl BrandApiSettings {
    pub async fn find_for_brand(brand_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let settings = sqlx::query_as::<_, BrandApiSettings>(
            "SELECT brand_id, twilio_account_sid, twilio_auth_token, twilio_whatsapp_number
             FROM api_settings
             WHERE brand_id = $1",
        )
        .bind(brand_id)
        .fetch_optional(pool)
        .await?;

        Ok(settings)
    }

    /// Complete credentials, trimmed, or None if the brand has no usable
    /// Twilio configuration of its own
    pub fn twilio_credentials(&self) -> Option<(String, String, Option<String>)> {
        match (&self.twilio_account_sid, &self.twilio_auth_token) {
            (Some(sid), Some(token)) if !sid.trim().is_empty() && !token.trim().is_empty() => {
                Some((
                    sid.trim().to_string(),
                    token.trim().to_string(),
                    self.twilio_whatsapp_number
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                ))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_credentials_are_rejected() {
        let settings = BrandApiSettings {
            brand_id: Uuid::new_v4(),
            twilio_account_sid: Some("AC123".to_string()),
            twilio_auth_token: None,
            twilio_whatsapp_number: None,
        };

        assert!(settings.twilio_credentials().is_none());
    }

    #[test]
    fn credentials_are_trimmed() {
        let settings = BrandApiSettings {
            brand_id: Uuid::new_v4(),
            twilio_account_sid: Some(" AC123 ".to_string()),
            twilio_auth_token: Some(" secret ".to_string()),
            twilio_whatsapp_number: Some("  ".to_string()),
        };

        let (sid, token, number) = settings.twilio_credentials().unwrap();
        assert_eq!(sid, "AC123");
        assert_eq!(token, "secret");
        assert_eq!(number, None);
    }
}
