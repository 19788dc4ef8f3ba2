use crate::model::NewActivity;
use crate::repo::ActivityStore;

/// Append an audit record.
/// The audit trail must never break the flow it describes, failures are only logged.
#[tracing::instrument(name = "Record activity", skip(store, activity), fields(action = %activity.action))]
pub async fn record<A>(store: &A, activity: NewActivity)
where
    A: ActivityStore + ?Sized,
{
    if let Err(error) = store.append(&activity).await {
        tracing::error!(
            error.cause_chain = ?error,
            "Failed to record activity {}",
            activity.action
        );
    }
}
