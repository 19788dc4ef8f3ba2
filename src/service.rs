pub mod activity;
mod newsletter;
pub mod subscriptions;

pub use newsletter::{
    publish, DeliveryStatus, DispatchJob, DispatchResult, DispatchSettings, Dispatcher,
    Publication, RecipientOutcome,
};
pub use subscriptions::SubscribeOutcome;
