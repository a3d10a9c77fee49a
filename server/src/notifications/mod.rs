//! Durable notifications: the fallback record when a user has no live
//! connection, admin broadcasts, plus the REST surface for reading them back.

pub mod push;
pub mod routes;
pub mod store;
