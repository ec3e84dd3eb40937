use crate::domain::risk::{AssessedRisk, Impact, Probability, RiskEntry, Severity};

/// Severity returned for labels outside the fixed probability/impact sets.
pub const DEFAULT_SEVERITY: Severity = Severity::Media;

/// Probability x impact severity table. Total over both label sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskMatrix {
    cells: [[Severity; 3]; 3],
}

impl Default for RiskMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

impl RiskMatrix {
    pub const fn standard() -> Self {
        use Severity::{Alta, Baja, Media};
        Self {
            cells: [
                // Alto,  Medio, Bajo
                [Alta, Alta, Media], // probabilidad Alta
                [Alta, Media, Baja], // probabilidad Media
                [Media, Baja, Baja], // probabilidad Baja
            ],
        }
    }

    pub fn severity(&self, probability: Probability, impact: Impact) -> Severity {
        self.cells[probability_row(probability)][impact_column(impact)]
    }

    /// Resolves free-form labels; unrecognized labels yield [`DEFAULT_SEVERITY`].
    pub fn resolve(&self, probability: &str, impact: &str) -> Severity {
        match (Probability::parse(probability), Impact::parse(impact)) {
            (Some(probability), Some(impact)) => self.severity(probability, impact),
            _ => DEFAULT_SEVERITY,
        }
    }

    pub fn assess(&self, entry: &RiskEntry) -> AssessedRisk {
        AssessedRisk {
            description: entry.description.clone(),
            probability: entry.probability.clone(),
            impact: entry.impact.clone(),
            severity: self.resolve(&entry.probability, &entry.impact),
        }
    }
}

pub fn resolve_severity(probability: &str, impact: &str) -> Severity {
    RiskMatrix::standard().resolve(probability, impact)
}

fn probability_row(probability: Probability) -> usize {
    match probability {
        Probability::Alta => 0,
        Probability::Media => 1,
        Probability::Baja => 2,
    }
}

fn impact_column(impact: Impact) -> usize {
    match impact {
        Impact::Alto => 0,
        Impact::Medio => 1,
        Impact::Bajo => 2,
    }
}
