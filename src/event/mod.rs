// Change notification infrastructure
//
// The store publishes a `StoreChange` after every committed mutation;
// live aggregation queries subscribe and recompute replacement snapshots.

pub use changes::StoreChange;
pub use feed::ChangeFeed;

mod changes;
mod feed;
