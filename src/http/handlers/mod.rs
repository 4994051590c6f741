//! Free-function handlers grouped by entity family, one module per family —
//! same split as the teacher's `api.rs`, just spread across files since
//! there are more routes here than the teacher's single-purpose API.

pub mod admin;
pub mod authors;
pub mod auth;
pub mod books;
pub mod health;
pub mod profile;
pub mod progress;
pub mod reading;
pub mod tags;
