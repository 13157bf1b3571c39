pub mod dashboard;
pub mod health;
pub mod matches;
pub mod player;
pub mod sse;
pub mod validation;
pub mod year;
