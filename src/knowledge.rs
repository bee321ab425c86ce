//! Business knowledge used as the generation system instruction.
//!
//! Loaded once at startup from a JSON file with the business profile,
//! catalog, pricing, policies, response style and compliance rules.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

const GENERIC_INSTRUCTION: &str = "Actúa como asistente virtual del negocio. \
Responde de forma breve y amable. Si no sabes algo, indica que un asesor humano dará seguimiento.";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub display_name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub service_area: String,
    #[serde(default)]
    pub business_hours: String,
    #[serde(default)]
    pub contact_channels: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit_price: String,
    #[serde(default)]
    pub bulk_price: Option<String>,
    #[serde(default)]
    pub availability: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStyle {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub format_rules: Vec<String>,
    #[serde(default)]
    pub fallback: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    #[serde(default)]
    pub prohibited_promises: Vec<String>,
    #[serde(default)]
    pub escalation_criteria: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub business_profile: BusinessProfile,
    #[serde(default)]
    pub catalog: Vec<CatalogItem>,
    #[serde(default)]
    pub pricing_rules: Vec<String>,
    #[serde(default)]
    pub operational_policies: Vec<String>,
    #[serde(default)]
    pub response_style: ResponseStyle,
    #[serde(default)]
    pub compliance: Compliance,
}

impl KnowledgeBase {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read knowledge file {}: {}", path.display(), e))
        })?;
        let kb: KnowledgeBase = serde_json::from_str(&content)?;
        tracing::info!(
            business = %kb.business_profile.display_name,
            catalog_items = kb.catalog.len(),
            "Loaded knowledge base from {}",
            path.display()
        );
        Ok(kb)
    }

    /// Build the system instruction text.
    pub fn system_instruction(&self) -> String {
        let profile = &self.business_profile;
        let style = &self.response_style;
        let compliance = &self.compliance;

        let sections = [
            format!(
                "NEGOCIO: {}\n{}\nUbicación: {}\nHorario: {}\nContacto: {}",
                profile.display_name,
                profile.tagline,
                profile.service_area,
                profile.business_hours,
                profile.contact_channels.join(", ")
            ),
            format!("CATÁLOGO:\n{}", format_catalog(&self.catalog)),
            format!("PRECIOS:\n{}", numbered(&self.pricing_rules)),
            format!("POLÍTICAS:\n{}", numbered(&self.operational_policies)),
            format!(
                "ESTILO:\n- Tono: {}\n- Reglas: {}\n- Fallback: {}",
                style.tone,
                style.format_rules.join("; "),
                style.fallback
            ),
            format!(
                "CUMPLIMIENTO:\n- Prohibido: {}\n- Escalar si: {}",
                compliance.prohibited_promises.join("; "),
                compliance.escalation_criteria.join("; ")
            ),
        ];

        format!(
            "Actúa como asistente virtual de {}. Usa la siguiente información oficial. \
             Si no sabes algo, escala al humano.\n\n{}",
            profile.display_name,
            sections.join("\n\n")
        )
    }
}

/// System instruction from an optional knowledge file.
pub fn load_system_instruction(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(KnowledgeBase::load(path)?.system_instruction()),
        None => {
            tracing::warn!("KNOWLEDGE_PATH not set, using generic instruction");
            Ok(GENERIC_INSTRUCTION.to_string())
        }
    }
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_catalog(catalog: &[CatalogItem]) -> String {
    catalog
        .iter()
        .map(|item| {
            let mut lines = vec![
                format!("• {} ({})", item.name, item.sku),
                format!("  Descripción: {}", item.description),
                format!("  Precio unitario: {}", item.unit_price),
            ];
            if let Some(bulk) = &item.bulk_price {
                lines.push(format!("  Precio mayoreo: {}", bulk));
            }
            lines.push(format!("  Disponibilidad: {}", item.availability));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
