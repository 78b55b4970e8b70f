pub mod history;
pub mod photo;
pub mod user;
