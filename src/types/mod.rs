pub mod conversions;
pub mod leaderboard;

pub use leaderboard::{
    AddressAggregate, AggregateMap, BonusPointMap, BurnEvent, LeaderboardSnapshot, MarketSnapshot,
    PersistedSnapshot, RankedEntry, SlimEntry, SnapshotSource, sum_amounts,
};
