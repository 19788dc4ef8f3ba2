mod email_client;

pub use email_client::{Delivery, Email, EmailClient, EmailTransport, TransportError};
