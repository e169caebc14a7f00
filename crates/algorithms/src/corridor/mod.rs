//! Cost distance and corridor extraction between habitat regions
//!
//! - **cost_distance**: multi-source Dijkstra with D8 backlinks
//! - **regions**: habitat features rasterized into disjoint cell sets
//! - **network**: pairwise least-cost corridors, pruned to a spanning tree

pub mod cost_distance;
pub mod network;
pub mod regions;

pub use cost_distance::{cost_distance, CostDistance, CostDistanceParams, CostSurface};
pub use network::{
    extract_corridors, Corridor, CorridorParams, CorridorSet, DisconnectedRegions,
    ExtractCorridors, PruningPolicy,
};
pub use regions::{Region, RegionSet};
