mod activity;
mod subscriptions;
mod templates;

pub use activity::{ActivityAction, ActivityRecord, NewActivity};
pub use subscriptions::{NewSubscription, SubscribeTransition, Subscription, SubscriptionStatus};
pub use templates::{EditableField, FieldType, NewTemplate, Template, TemplateKind};
