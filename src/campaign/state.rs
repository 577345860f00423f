use crate::scheduler::batch::MeasurementBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("invalid campaign state transition: {from:?} -> {to:?}")]
pub struct StateError {
    pub from: CampaignState,
    pub to: CampaignState,
}

/// Campaign lifecycle. Polling may re-enter itself as batch retries occur;
/// Aggregated is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignState {
    Draft,
    Submitted,
    Polling,
    Aggregated,
}

impl CampaignState {
    fn allows(self, next: CampaignState) -> bool {
        use CampaignState::*;
        matches!(
            (self, next),
            (Draft, Submitted) | (Submitted, Polling) | (Polling, Polling) | (Polling, Aggregated)
        )
    }
}

/// One measurement campaign and the batches it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub uuid: Uuid,
    pub dry_run: bool,
    pub state: CampaignState,
    pub batches: Vec<MeasurementBatch>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Campaign {
    pub fn new(uuid: Uuid, dry_run: bool) -> Self {
        Self {
            uuid,
            dry_run,
            state: CampaignState::Draft,
            batches: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn transition(&mut self, next: CampaignState) -> Result<(), StateError> {
        if !self.state.allows(next) {
            return Err(StateError {
                from: self.state,
                to: next,
            });
        }

        info!(campaign = %self.uuid, from = ?self.state, to = ?next, "Campaign state transition");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle_transitions() {
        let mut campaign = Campaign::new(Uuid::new_v4(), false);
        assert_eq!(campaign.state, CampaignState::Draft);

        campaign.transition(CampaignState::Submitted).unwrap();
        campaign.transition(CampaignState::Polling).unwrap();
        // Polling re-enters per batch retry
        campaign.transition(CampaignState::Polling).unwrap();
        campaign.transition(CampaignState::Aggregated).unwrap();
        assert_eq!(campaign.state, CampaignState::Aggregated);
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let mut campaign = Campaign::new(Uuid::new_v4(), false);
        let err = campaign.transition(CampaignState::Aggregated).unwrap_err();
        assert_eq!(err.from, CampaignState::Draft);
        assert_eq!(err.to, CampaignState::Aggregated);
        assert_eq!(campaign.state, CampaignState::Draft);
    }

    #[test]
    fn test_aggregated_is_terminal() {
        let mut campaign = Campaign::new(Uuid::new_v4(), false);
        campaign.transition(CampaignState::Submitted).unwrap();
        campaign.transition(CampaignState::Polling).unwrap();
        campaign.transition(CampaignState::Aggregated).unwrap();

        assert!(campaign.transition(CampaignState::Polling).is_err());
        assert!(campaign.transition(CampaignState::Draft).is_err());
    }
}
