//! Bridge loops: the per-direction event loop that moves frames between
//! two Handles. Two flavors — streaming ([`pubsub`]) and correlated
//! ([`reqrep`]).

pub mod pubsub;
pub mod reqrep;
