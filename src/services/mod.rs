//! The relay pipeline, one module per stage.
//!
//! ```text
//! Request ─▶ Normalizer ─▶ DestinationPolicy ─▶ Composer ─▶ Transport
//!                                                   │
//! Response ◀────────────── Translator ◀─── RelayResult
//! ```

mod composer;
mod normalizer;
mod relay;
mod translator;

pub use composer::{Composer, ForwardingContext, authorization_value};
pub use normalizer::{NormalizedRequest, Normalizer};
pub use relay::RelayService;
pub use translator::{RelaySummary, Translator};
