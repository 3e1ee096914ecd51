use pwledger_core::FixedClock;
use pwledger_core_types::Sensitive;
use pwledger_engine::{EngineConfig, JsonFileBackend, Session};
use std::sync::Arc;

/// 2024-03-01 12:00:00 UTC
#[allow(dead_code)]
pub const T0: i64 = 1_709_294_400;

#[allow(dead_code)]
pub fn passphrase() -> Sensitive<String> {
    Sensitive::new("correct horse battery staple".to_string())
}

/// Session over a fresh JSON backend with a pinned clock
#[allow(dead_code)]
pub fn session() -> (Session, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(T0));
    let session = Session::new(EngineConfig::default(), Arc::new(JsonFileBackend::new()))
        .with_clock(clock.clone());
    (session, clock)
}
