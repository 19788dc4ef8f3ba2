mod activity;
mod subscriptions;
mod templates;
mod users;

pub use activity::{ActivityStore, PgActivityRepo};
pub use subscriptions::{PgSubscriptionRepo, SubscriptionStore};
pub use templates::{PgTemplateRepo, TemplateStore};
pub use users::{NewUser, PgUsersRepo, UserCredentials, UserStore};
