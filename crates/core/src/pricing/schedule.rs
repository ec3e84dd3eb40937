use serde::{Deserialize, Serialize};

use crate::domain::quotation::ScheduledPhase;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWeight {
    pub id: String,
    pub label: String,
    pub weight: u32,
}

/// Splits `total` proportionally to `weights`.
///
/// Every entry but the last gets `floor(w_i * total / sum(w))`; the last entry
/// absorbs the rounding remainder, so the result always sums to `total`. A
/// zero weight sum hands the whole duration to the last entry.
pub fn allocate_days(weights: &[u32], total: u32) -> Vec<u32> {
    let Some((_, leading)) = weights.split_last() else {
        return Vec::new();
    };

    let weight_sum: u64 = weights.iter().map(|weight| u64::from(*weight)).sum();
    let total = u64::from(total);
    let mut assigned = 0_u64;
    let mut allocations = Vec::with_capacity(weights.len());

    for weight in leading {
        let share = if weight_sum == 0 { 0 } else { u64::from(*weight) * total / weight_sum };
        assigned += share;
        allocations.push(share as u32);
    }
    allocations.push((total - assigned) as u32);

    allocations
}

pub fn allocate(phases: &[PhaseWeight], total_days: u32) -> Vec<ScheduledPhase> {
    let weights = phases.iter().map(|phase| phase.weight).collect::<Vec<_>>();
    phases
        .iter()
        .zip(allocate_days(&weights, total_days))
        .map(|(phase, days)| ScheduledPhase {
            id: phase.id.clone(),
            label: phase.label.clone(),
            days,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{allocate, allocate_days, PhaseWeight};

    fn pmi_phases() -> Vec<PhaseWeight> {
        [
            ("dias_inicio", "Inicio", 10),
            ("dias_planificacion", "Planificación", 20),
            ("dias_ejecucion", "Ejecución", 45),
            ("dias_monitoreo", "Monitoreo y control", 15),
            ("dias_cierre", "Cierre", 10),
        ]
        .into_iter()
        .map(|(id, label, weight)| PhaseWeight {
            id: id.to_string(),
            label: label.to_string(),
            weight,
        })
        .collect()
    }

    #[test]
    fn last_phase_absorbs_rounding_remainder() {
        let schedule = allocate(&pmi_phases(), 97);
        let days = schedule.iter().map(|phase| phase.days).collect::<Vec<_>>();

        assert_eq!(days, vec![9, 19, 43, 14, 12]);
        assert_eq!(schedule[4].id, "dias_cierre");
    }

    #[test]
    fn exact_split_needs_no_correction() {
        assert_eq!(allocate_days(&[10, 20, 45, 15, 10], 100), vec![10, 20, 45, 15, 10]);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(allocate_days(&[], 30).is_empty());
        assert_eq!(allocate_days(&[0, 0, 0], 30), vec![0, 0, 30]);
        assert_eq!(allocate_days(&[7], 30), vec![30]);
        assert_eq!(allocate_days(&[1, 1, 1], 0), vec![0, 0, 0]);
    }

    proptest! {
        #[test]
        fn allocations_always_sum_to_target(
            weights in prop::collection::vec(0u32..10_000, 1..12),
            total in 0u32..100_000,
        ) {
            let allocations = allocate_days(&weights, total);
            prop_assert_eq!(allocations.len(), weights.len());
            let allocated: u64 = allocations.iter().map(|days| u64::from(*days)).sum();
            prop_assert_eq!(allocated, u64::from(total));
        }

        #[test]
        fn leading_phases_never_exceed_their_proportional_share(
            weights in prop::collection::vec(1u32..1_000, 2..8),
            total in 0u32..10_000,
        ) {
            let allocations = allocate_days(&weights, total);
            let weight_sum: u64 = weights.iter().map(|weight| u64::from(*weight)).sum();
            for (weight, days) in weights.iter().zip(&allocations).take(weights.len() - 1) {
                prop_assert!(u64::from(*days) * weight_sum <= u64::from(*weight) * u64::from(total));
            }
        }
    }
}
