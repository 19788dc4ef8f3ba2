use actix_web::dev::HttpServiceFactory;
use actix_web::web;

pub mod activity;
mod error;
pub mod newsletters;
pub mod subscriptions;
pub mod templates;

pub use error::{RestError, RestResult};

/// Back office endpoints, every handler is guarded by `Administrator`
pub fn admin_scope() -> impl HttpServiceFactory {
    web::scope("/admin")
        .service(subscriptions::admin_scope())
        .service(templates::scope())
        .service(newsletters::scope())
        .service(activity::scope())
}
