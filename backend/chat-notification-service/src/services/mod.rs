pub mod dispatcher;
pub mod firestore;
pub mod push;

pub use dispatcher::*;
pub use firestore::{DocumentStore, FirestoreClient};
pub use push::PushGateway;
