//! Consensus arbitration among competing stage outputs.

mod arbiter;
mod proposal;

pub use arbiter::{
    ArbitrationDecision, ArbitrationOutcome, Disqualification, ProposalArbiter, RankedCandidate,
    Rationale, ETHICS_DISQUALIFICATION, ETHICS_RISK_CEILING,
};
pub use proposal::{carries_proposal_fields, Proposal, DEFAULT_CONFIDENCE, PROPOSAL_FIELDS};
