//! Profile read and update for the authenticated user.

pub mod handlers;
