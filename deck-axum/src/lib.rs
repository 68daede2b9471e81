//! deck-axum: Axum adapter for the deck draw service.
//!
//! Routes:
//! - `GET /healthz`
//! - `POST /updateCacheCardId` (bearer token)
//! - `GET /getCardId?deck=&n=`
//! - `GET /drawDaily?userId=&deck=&n=`
//!
//! Errors render as Feathers-style JSON with the reason code in `data.reason`.

pub mod app;
pub mod middlewares;
pub mod rest;
pub mod state;
mod error;
pub use error::DeckAxumError;
pub use state::DeckAxumState;

pub use app::{axum, DeckAxumApp};
