//! Support inquiry intake.

pub mod handlers;
