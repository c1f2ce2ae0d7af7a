//! Market-timing gate.
//!
//! Decides whether a work type may run right now, given its timing policy
//! and the subject it would run against. Market-hours knowledge itself comes
//! from an external `MarketChecker` capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::MarketTiming;

/// External capability answering market-hours questions.
#[async_trait]
pub trait MarketChecker: Send + Sync {
    async fn is_any_market_open(&self) -> bool;
    async fn is_security_market_open(&self, subject: &str) -> bool;
    async fn are_all_markets_closed(&self) -> bool;
}

#[derive(Clone)]
pub struct MarketGate {
    checker: Arc<dyn MarketChecker>,
}

impl MarketGate {
    pub fn new(checker: Arc<dyn MarketChecker>) -> Self {
        Self { checker }
    }

    /// Whether `timing` permits running for `subject` right now.
    ///
    /// For the per-security policies a non-empty subject asks about that
    /// security's own venue; an empty subject asks about markets globally.
    pub async fn permits(&self, timing: MarketTiming, subject: &str) -> bool {
        match timing {
            MarketTiming::AnyTime => true,
            MarketTiming::DuringMarketOpen => {
                if subject.is_empty() {
                    self.checker.is_any_market_open().await
                } else {
                    self.checker.is_security_market_open(subject).await
                }
            }
            MarketTiming::AfterMarketClose => {
                if subject.is_empty() {
                    !self.checker.is_any_market_open().await
                } else {
                    !self.checker.is_security_market_open(subject).await
                }
            }
            MarketTiming::AllMarketsClosed => self.checker.are_all_markets_closed().await,
        }
    }
}
