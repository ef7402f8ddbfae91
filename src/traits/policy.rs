//! Mutual exclusion between traits.
//!
//! Consulted once after every trait has been configured. When both sides of
//! a rule are enabled the loser is switched off and reports why.

use tracing::info;

use super::TraitId;
use crate::model::condition::{DEPLOYMENT_AVAILABLE, TRAIT_INFO};
use crate::model::{Condition, ConditionStatus};

pub struct ExclusionRule {
    pub winner: TraitId,
    pub loser: TraitId,
    condition: fn() -> Condition,
}

impl ExclusionRule {
    pub fn condition(&self) -> Condition {
        (self.condition)()
    }
}

fn deployment_superseded() -> Condition {
    Condition::new(
        DEPLOYMENT_AVAILABLE,
        ConditionStatus::False,
        "deploymentTraitConfiguration",
        "controller strategy: knative-service",
    )
}

fn service_superseded() -> Condition {
    Condition::new(
        TRAIT_INFO,
        ConditionStatus::True,
        "serviceTraitConfiguration",
        "explicitly disabled by the platform: knative-service trait has priority over this trait",
    )
}

pub const RULES: &[ExclusionRule] = &[
    ExclusionRule {
        winner: TraitId::KnativeService,
        loser: TraitId::Deployment,
        condition: deployment_superseded,
    },
    ExclusionRule {
        winner: TraitId::KnativeService,
        loser: TraitId::Service,
        condition: service_superseded,
    },
];

/// Apply [`RULES`] to the configure-stage decisions, returning the
/// conditions raised by the losers.
pub fn resolve(decisions: &mut [(TraitId, bool)]) -> Vec<Condition> {
    let mut conditions = Vec::new();
    for rule in RULES {
        let enabled = |id: TraitId, d: &[(TraitId, bool)]| d.iter().any(|(t, on)| *t == id && *on);
        if !(enabled(rule.winner, decisions) && enabled(rule.loser, decisions)) {
            continue;
        }
        for (id, on) in decisions.iter_mut() {
            if *id == rule.loser {
                *on = false;
            }
        }
        info!(winner = %rule.winner, loser = %rule.loser, "Trait disabled by exclusion policy");
        conditions.push(rule.condition());
    }
    conditions
}
