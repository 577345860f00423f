pub mod controller;
pub mod state;

pub use controller::{
    select_targets, BatchFailure, CampaignController, CampaignError, CampaignReport,
};
pub use state::{Campaign, CampaignState, StateError};
