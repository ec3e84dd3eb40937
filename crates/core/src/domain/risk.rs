use serde::{Deserialize, Serialize};

/// One row of the risk table collected by the external widget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskEntry {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "probabilidad")]
    pub probability: String,
    #[serde(rename = "impacto")]
    pub impact: String,
}

impl RiskEntry {
    pub fn new(
        description: impl Into<String>,
        probability: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            probability: probability.into(),
            impact: impact.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Probability {
    Alta,
    Media,
    Baja,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    Alto,
    Medio,
    Bajo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Alta,
    Media,
    Baja,
}

impl Probability {
    pub const ALL: [Probability; 3] = [Self::Alta, Self::Media, Self::Baja];

    pub fn parse(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "alta" => Some(Self::Alta),
            "media" => Some(Self::Media),
            "baja" => Some(Self::Baja),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Alta => "Alta",
            Self::Media => "Media",
            Self::Baja => "Baja",
        }
    }
}

impl Impact {
    pub const ALL: [Impact; 3] = [Self::Alto, Self::Medio, Self::Bajo];

    pub fn parse(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "alto" => Some(Self::Alto),
            "medio" => Some(Self::Medio),
            "bajo" => Some(Self::Bajo),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Alto => "Alto",
            Self::Medio => "Medio",
            Self::Bajo => "Bajo",
        }
    }
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Alta => "Alta",
            Self::Media => "Media",
            Self::Baja => "Baja",
        }
    }
}

/// A risk row after severity resolution, as reported in quotation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedRisk {
    pub description: String,
    pub probability: String,
    pub impact: String,
    pub severity: Severity,
}

fn normalize_label(label: &str) -> String {
    crate::validator::fold_label(label)
}

#[cfg(test)]
mod tests {
    use super::{Impact, Probability, RiskEntry};

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(Probability::parse(" ALTA "), Some(Probability::Alta));
        assert_eq!(Impact::parse("medio"), Some(Impact::Medio));
        assert_eq!(Probability::parse("Bája"), Some(Probability::Baja));
        assert_eq!(Probability::parse("Alto"), None);
        assert_eq!(Impact::parse(""), None);
    }

    #[test]
    fn risk_entry_uses_widget_field_names() {
        let entry: RiskEntry = serde_json::from_str(
            r#"{"descripcion":"Lluvias","probabilidad":"Media","impacto":"Alto"}"#,
        )
        .expect("widget row should deserialize");

        assert_eq!(entry, RiskEntry::new("Lluvias", "Media", "Alto"));
    }
}
