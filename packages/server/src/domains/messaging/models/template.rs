use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A provider-approved WhatsApp template.
///
/// `brand_id = NULL` marks a global definition; a brand-scoped row with the
/// same name takes precedence over it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemplateDefinition {
    pub id: Uuid,
    pub name: String,
    pub brand_id: Option<Uuid>,
    pub template_sid: String,
    pub variables: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TemplateDefinition {
    /// Resolve an active template by name for a brand. Brand-scoped match
    /// wins over global.
    pub async fn resolve(name: &str, brand_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let template = sqlx::query_as::<_, TemplateDefinition>(
            "SELECT * FROM whatsapp_templates
             WHERE name = $1 AND is_active = true AND (brand_id = $2 OR brand_id IS NULL)
             ORDER BY brand_id NULLS LAST
             LIMIT 1",
        )
        .bind(name)
        .bind(brand_id)
        .fetch_optional(pool)
        .await?;

        Ok(template)
    }

    /// Declared variable slot names, in template order
    pub fn variable_slots(&self) -> Vec<String> {
        self.variables
            .as_array()
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(|slot| slot.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
