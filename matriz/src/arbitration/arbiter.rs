//! Ethics-gated selection among competing proposals.

use super::Proposal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Proposals with an ethics risk strictly above this value are disqualified.
pub const ETHICS_RISK_CEILING: f64 = 0.8;

/// Reason recorded for proposals above the ceiling.
pub const ETHICS_DISQUALIFICATION: &str = "ethics_risk_above_ceiling";

/// What the arbiter decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationDecision {
    /// A winner was selected.
    Selected,
    /// No proposals were submitted.
    NoProposals,
    /// Every proposal was disqualified.
    NoViableProposals,
}

impl ArbitrationDecision {
    /// Returns the decision name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::NoProposals => "no_proposals",
            Self::NoViableProposals => "no_viable_proposals",
        }
    }
}

impl fmt::Display for ArbitrationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposal that passed the ethics gate, with its rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Proposal id.
    pub id: String,
    /// `confidence * role_weight`.
    pub score: f64,
    /// Proposal confidence.
    pub confidence: f64,
    /// Proposal role weight.
    pub role_weight: f64,
}

/// A proposal removed before ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disqualification {
    /// Proposal id.
    pub id: String,
    /// Why it was removed.
    pub reason: String,
    /// The offending ethics risk.
    pub ethics_risk: f64,
    /// The ceiling in force.
    pub ceiling: f64,
}

/// Audit trail of one arbitration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    /// The decision.
    pub decision: ArbitrationDecision,
    /// Winning proposal id.
    pub winner: Option<String>,
    /// Winning score.
    pub winner_score: Option<f64>,
    /// Human-readable summary.
    pub summary: String,
    /// Surviving candidates, best first.
    pub ranked: Vec<RankedCandidate>,
    /// Removed proposals.
    pub disqualified: Vec<Disqualification>,
}

/// Winner (if any) plus the rationale.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrationOutcome {
    /// The selected proposal.
    pub winner: Option<Proposal>,
    /// The audit trail.
    pub rationale: Rationale,
}

impl ArbitrationOutcome {
    /// Splits into `(winner, rationale)`.
    #[must_use]
    pub fn into_parts(self) -> (Option<Proposal>, Rationale) {
        (self.winner, self.rationale)
    }
}

/// Picks one proposal among many.
///
/// Ranking is `confidence * role_weight` descending, then `ts` ascending,
/// then submission order.
#[derive(Debug, Clone)]
pub struct ProposalArbiter {
    ceiling: f64,
}

impl Default for ProposalArbiter {
    fn default() -> Self {
        Self {
            ceiling: ETHICS_RISK_CEILING,
        }
    }
}

impl ProposalArbiter {
    /// Creates an arbiter with the default ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arbiter with a custom ceiling.
    #[must_use]
    pub fn with_ceiling(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Returns the ethics-risk ceiling.
    #[must_use]
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Selects a winner.
    #[must_use]
    pub fn choose(&self, proposals: &[Proposal]) -> ArbitrationOutcome {
        if proposals.is_empty() {
            return ArbitrationOutcome {
                winner: None,
                rationale: Rationale {
                    decision: ArbitrationDecision::NoProposals,
                    winner: None,
                    winner_score: None,
                    summary: "no proposals submitted".to_string(),
                    ranked: Vec::new(),
                    disqualified: Vec::new(),
                },
            };
        }

        let (eligible, rejected): (Vec<(usize, &Proposal)>, Vec<(usize, &Proposal)>) = proposals
            .iter()
            .enumerate()
            .partition(|(_, p)| p.ethics_risk <= self.ceiling);

        let disqualified: Vec<Disqualification> = rejected
            .iter()
            .map(|(_, p)| Disqualification {
                id: p.id.clone(),
                reason: ETHICS_DISQUALIFICATION.to_string(),
                ethics_risk: p.ethics_risk,
                ceiling: self.ceiling,
            })
            .collect();

        let mut ranked = eligible;
        ranked.sort_by(|(ia, a), (ib, b)| rank_order(a, b).then_with(|| ia.cmp(ib)));

        let candidates: Vec<RankedCandidate> = ranked
            .iter()
            .map(|(_, p)| RankedCandidate {
                id: p.id.clone(),
                score: p.score(),
                confidence: p.confidence,
                role_weight: p.role_weight,
            })
            .collect();

        let Some((_, best)) = ranked.first() else {
            let summary = format!(
                "all {} proposals disqualified: {}",
                disqualified.len(),
                describe_disqualified(&disqualified)
            );
            return ArbitrationOutcome {
                winner: None,
                rationale: Rationale {
                    decision: ArbitrationDecision::NoViableProposals,
                    winner: None,
                    winner_score: None,
                    summary,
                    ranked: candidates,
                    disqualified,
                },
            };
        };

        let mut summary = format!(
            "selected {} (score {:.3} = confidence {:.3} x role_weight {:.3}) among {} candidate(s)",
            best.id,
            best.score(),
            best.confidence,
            best.role_weight,
            candidates.len()
        );
        if !disqualified.is_empty() {
            summary.push_str("; disqualified ");
            summary.push_str(&describe_disqualified(&disqualified));
        }

        ArbitrationOutcome {
            winner: Some((*best).clone()),
            rationale: Rationale {
                decision: ArbitrationDecision::Selected,
                winner: Some(best.id.clone()),
                winner_score: Some(best.score()),
                summary,
                ranked: candidates,
                disqualified,
            },
        }
    }
}

fn rank_order(a: &Proposal, b: &Proposal) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.ts.cmp(&b.ts))
}

fn describe_disqualified(disqualified: &[Disqualification]) -> String {
    disqualified
        .iter()
        .map(|d| {
            format!(
                "{} ({}: {:.2} > {:.2})",
                d.id, d.reason, d.ethics_risk, d.ceiling
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{now_utc, Timestamp};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn proposal(id: &str, confidence: f64, ethics_risk: f64, ts: Timestamp) -> Proposal {
        Proposal::new(id, 0, confidence, ts).with_ethics_risk(ethics_risk)
    }

    #[test]
    fn test_empty_input() {
        let (winner, rationale) = ProposalArbiter::new().choose(&[]).into_parts();
        assert!(winner.is_none());
        assert_eq!(rationale.decision, ArbitrationDecision::NoProposals);
    }

    #[test]
    fn test_ethics_ceiling_dominates_confidence() {
        let now = now_utc();
        let risky = proposal("0:INTENT", 0.9, 0.95, now);
        let safe = proposal("1:THOUGHT", 0.6, 0.1, now);

        let outcome = ProposalArbiter::new().choose(&[risky, safe]);

        assert_eq!(outcome.winner.unwrap().id, "1:THOUGHT");
        assert_eq!(outcome.rationale.decision, ArbitrationDecision::Selected);
        assert_eq!(outcome.rationale.disqualified.len(), 1);
        assert_eq!(outcome.rationale.disqualified[0].id, "0:INTENT");
        assert_eq!(outcome.rationale.disqualified[0].reason, ETHICS_DISQUALIFICATION);
        assert!(outcome.rationale.summary.contains(ETHICS_DISQUALIFICATION));
    }

    #[test]
    fn test_all_disqualified() {
        let now = now_utc();
        let outcome = ProposalArbiter::new().choose(&[
            proposal("0:A", 0.9, 0.81, now),
            proposal("1:B", 0.8, 1.0, now),
        ]);

        assert!(outcome.winner.is_none());
        assert_eq!(outcome.rationale.decision, ArbitrationDecision::NoViableProposals);
        assert_eq!(outcome.rationale.disqualified.len(), 2);
        assert!(outcome.rationale.ranked.is_empty());
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let outcome = ProposalArbiter::new().choose(&[proposal("0:A", 0.5, ETHICS_RISK_CEILING, now_utc())]);
        assert_eq!(outcome.winner.unwrap().id, "0:A");
    }

    #[test]
    fn test_role_weight_scales_confidence() {
        let now = now_utc();
        let heavy = Proposal::new("0:A", 0, 0.6, now).with_role_weight(1.0);
        let light = Proposal::new("1:B", 1, 0.9, now).with_role_weight(0.5);

        let outcome = ProposalArbiter::new().choose(&[light, heavy]);
        assert_eq!(outcome.winner.unwrap().id, "0:A");
        assert_eq!(
            outcome.rationale.ranked.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["0:A", "1:B"]
        );
    }

    #[test]
    fn test_tie_broken_by_earliest_ts() {
        let now = now_utc();
        let late = proposal("0:A", 0.7, 0.0, now + Duration::milliseconds(5));
        let early = proposal("1:B", 0.7, 0.0, now);

        let outcome = ProposalArbiter::new().choose(&[late, early]);
        assert_eq!(outcome.winner.unwrap().id, "1:B");
    }

    #[test]
    fn test_full_tie_keeps_submission_order() {
        let now = now_utc();
        let outcome = ProposalArbiter::new().choose(&[
            proposal("0:A", 0.7, 0.0, now),
            proposal("1:B", 0.7, 0.0, now),
        ]);
        assert_eq!(outcome.winner.unwrap().id, "0:A");
    }

    #[test]
    fn test_custom_ceiling() {
        let arbiter = ProposalArbiter::with_ceiling(0.2);
        assert_eq!(arbiter.ceiling(), 0.2);

        let outcome = arbiter.choose(&[proposal("0:A", 0.9, 0.3, now_utc())]);
        assert!(outcome.winner.is_none());
    }

    #[test]
    fn test_rationale_serializes() {
        let outcome = ProposalArbiter::new().choose(&[proposal("0:A", 0.5, 0.1, now_utc())]);
        let value = serde_json::to_value(&outcome.rationale).unwrap();

        assert_eq!(value["decision"], "selected");
        assert_eq!(value["winner"], "0:A");
    }
}
