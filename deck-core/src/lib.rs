//! deck-core: framework-agnostic core of the deck draw service.
//!
//! - [`DeckCache`]: one overwrite-only pool document per deck
//! - [`sampling`]: uniform sampling without replacement
//! - [`QuotaLedger`]: once-per-day check-and-mark per user
//! - [`DrawCoordinator`]: request validation, pool read and sampling
//!
//! [`DeckApp`] wires them over a single [`deck_blob::BlobStore`].

pub mod app;
pub mod cache;
pub mod config;
pub mod deck;
pub mod draw;
pub mod errors;
pub mod quota;
pub mod sampling;

pub use app::DeckApp;
pub use cache::{
    BatchFailure, BatchOutcome, BatchStatus, DeckCache, DeckEntry, DeckPool, FailureReason,
    PoolRead, SavedDeck,
};
pub use config::{DeckConfig, DeckConfigSnapshot, DeckLimits};
pub use deck::{DeckName, DeckPoolDocument, UnknownDeck};
pub use draw::{DailyDraw, Draw, DrawCoordinator, PoolSummary};
pub use errors::{DeckError, DeckResult, ErrorKind};
pub use quota::{QuotaCheck, QuotaLedger, QuotaRecord};
