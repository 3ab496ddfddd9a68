//! Proptest generators for property-based testing.

use proptest::prelude::*;

use burnerkit_core::{Network, NetworkFamily, RetiredIndexSet};

/// Any supported network.
pub fn network() -> impl Strategy<Value = Network> {
    prop_oneof![
        Just(Network::Solana),
        Just(Network::Ethereum),
        Just(Network::Avalanche),
        Just(Network::Arbitrum),
    ]
}

pub fn family() -> impl Strategy<Value = NetworkFamily> {
    prop_oneof![Just(NetworkFamily::Solana), Just(NetworkFamily::Evm)]
}

/// A burner index in a realistic range.
pub fn index() -> impl Strategy<Value = u32> {
    0u32..256
}

/// A 64-byte seed.
pub fn seed() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 64)
}

/// A non-empty password.
pub fn password() -> impl Strategy<Value = String> {
    "[ -~]{1,32}"
}

/// A set of retired indices below `max`.
pub fn retired_set(max: u32) -> impl Strategy<Value = RetiredIndexSet> {
    prop::collection::btree_set(0..max, 0..(max as usize / 2))
        .prop_map(|set| set.into_iter().collect())
}

/// A raw page origin with noise the registry has to strip.
pub fn origin() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("https"), Just("http"), Just("HTTPS")],
        "[a-z][a-z0-9]{0,11}",
        prop_oneof![Just(""), Just(":8080")],
        prop_oneof![Just(""), Just("/"), Just("/app?x=1"), Just("#top")],
    )
        .prop_map(|(scheme, host, port, tail)| format!("{scheme}://{host}.example{port}{tail}"))
}
