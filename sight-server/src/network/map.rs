//! Network map construction and segment decomposition.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use chrono::Duration;
use petgraph::algo::astar;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use tracing::{debug, trace};

use super::{NetworkConfig, NetworkError};
use crate::domain::{DomainError, Segment, Stop, StopKey, Trip};

/// An edge between two parent stops.
#[derive(Debug, Clone)]
struct Edge {
    travel_ms: i64,
    /// `None` for a directly observed hop.
    composition: Option<Composition>,
}

/// The chain of finer hops a composite edge stands for.
#[derive(Debug, Clone)]
struct Composition {
    /// Endpoint the chain starts from.
    start: NodeIndex,
    hops: Vec<(NodeIndex, NodeIndex)>,
}

impl Composition {
    /// The hops in travel order when leaving from `from`.
    fn oriented(&self, from: NodeIndex) -> Vec<(NodeIndex, NodeIndex)> {
        if from == self.start {
            self.hops.clone()
        } else {
            self.hops.iter().rev().map(|&(a, b)| (b, a)).collect()
        }
    }
}

/// A read-only view of one edge, with endpoints in key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeSummary {
    pub from: StopKey,
    pub to: StopKey,
    pub travel_time: Duration,
    pub composite: bool,
}

/// A weighted graph of parent stops.
///
/// Stops within the merge radius of an existing vertex are associated with
/// it rather than added, which folds platforms of one station (and the
/// same station across feeds) into a single vertex. At most one edge joins
/// two vertices; its weight is the fastest travel time seen between them.
#[derive(Debug, Clone)]
pub struct NetworkMap {
    graph: StableUnGraph<Arc<Stop>, Edge>,
    associations: HashMap<StopKey, NodeIndex>,
    config: NetworkConfig,
}

impl NetworkMap {
    /// Create an empty map.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            graph: StableUnGraph::default(),
            associations: HashMap::new(),
            config,
        }
    }

    /// Build a map from every segment of the given trips.
    ///
    /// Segments are deduplicated per unordered stop pair, keeping the
    /// fastest, then processed shortest distance first so that long hops
    /// find the short ones already in place.
    pub fn from_trips<'a>(
        trips: impl IntoIterator<Item = &'a Trip>,
        config: NetworkConfig,
    ) -> Result<Self, NetworkError> {
        debug!("Collecting segments");
        let mut segments = collect_segments(trips)?;

        debug!(segments = segments.len(), "Sorting segments");
        // Stable: equal distances keep stop-key order.
        segments.sort_by(|a, b| a.distance().total_cmp(&b.distance()));

        debug!("Building network map");
        let mut map = Self::new(config);
        for segment in &segments {
            map.process_segment(segment)?;
        }

        debug!(
            vertices = map.graph.node_count(),
            edges = map.graph.edge_count(),
            "Network map built"
        );
        Ok(map)
    }

    /// Number of parent stops.
    pub fn parent_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The parent stop a stop was merged into, if the stop is known.
    pub fn parent_of(&self, key: &StopKey) -> Option<&Arc<Stop>> {
        self.associations.get(key).map(|&idx| &self.graph[idx])
    }

    /// All edges, sorted.
    pub fn edges(&self) -> Vec<EdgeSummary> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|idx| {
                let (a, b) = self.graph.edge_endpoints(idx)?;
                let (a, b) = (self.graph[a].key(), self.graph[b].key());
                let (from, to) = if a <= b { (a, b) } else { (b, a) };
                let edge = &self.graph[idx];
                Some(EdgeSummary {
                    from,
                    to,
                    travel_time: Duration::milliseconds(edge.travel_ms),
                    composite: edge.composition.is_some(),
                })
            })
            .collect();
        edges.sort();
        edges
    }

    /// Add what `segment` tells us about the network.
    ///
    /// Results depend on the order segments arrive in; [`Self::from_trips`]
    /// feeds them shortest first.
    pub fn process_segment(&mut self, segment: &Segment) -> Result<(), NetworkError> {
        let from = self.ensure_vertex(segment.source());
        let to = self.ensure_vertex(segment.target());
        if from == to {
            return Ok(());
        }

        let travel_ms = segment.travel_time().num_milliseconds();
        let path = astar(&self.graph, from, |n| n == to, |e| e.weight().travel_ms, |_| 0);

        match path {
            None => self.set_edge(from, to, travel_ms, None),
            Some((_, path)) if path.len() == 2 => {
                // The direct edge is already the best route; only its time can improve.
                if let Some(idx) = self.graph.find_edge(from, to) {
                    let edge = &mut self.graph[idx];
                    edge.travel_ms = edge.travel_ms.min(travel_ms);
                }
            }
            Some((path_ms, path)) => {
                if travel_ms as f64 * self.config.shortcut_factor < path_ms as f64 {
                    trace!(
                        from = %self.graph[from].key(),
                        to = %self.graph[to].key(),
                        travel_ms,
                        path_ms,
                        "Keeping shortcut"
                    );
                    self.set_edge(from, to, travel_ms, None);
                } else {
                    let hops = path.windows(2).map(|w| (w[0], w[1])).collect();
                    self.set_edge(from, to, travel_ms, Some(Composition { start: from, hops }));
                }
            }
        }
        Ok(())
    }

    /// Break a trip segment into the elementary hops it travels over.
    ///
    /// The returned segments run between parent stops, in travel order,
    /// and share the original travel time in proportion to their length.
    pub fn decompose_trip_segment(&self, segment: &Segment) -> Result<Vec<Segment>, NetworkError> {
        let from = self.vertex_of(segment.source())?;
        let to = self.vertex_of(segment.target())?;
        if from == to {
            return Ok(vec![segment.clone()]);
        }

        let mut hops = Vec::new();
        self.expand(from, to, &mut Vec::new(), &mut hops)?;
        Ok(self.share_travel_time(&hops, segment.travel_time())?)
    }

    fn vertex_of(&self, stop: &Stop) -> Result<NodeIndex, NetworkError> {
        let key = stop.key();
        self.associations
            .get(&key)
            .copied()
            .ok_or(NetworkError::UnknownStop(key))
    }

    /// Returns the vertex for `stop`, merging or adding it as needed.
    fn ensure_vertex(&mut self, stop: &Arc<Stop>) -> NodeIndex {
        let key = stop.key();
        if let Some(&idx) = self.associations.get(&key) {
            return idx;
        }

        let nearest = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph[idx].distance_to(stop.location)))
            .filter(|&(_, km)| km < self.config.merge_radius_km)
            .min_by(|(a, da), (b, db)| {
                da.total_cmp(db)
                    .then_with(|| self.graph[*a].key().cmp(&self.graph[*b].key()))
            });

        let idx = match nearest {
            Some((idx, km)) => {
                trace!(stop = %key, parent = %self.graph[idx].key(), km, "Merging stop");
                idx
            }
            None => self.graph.add_node(Arc::clone(stop)),
        };
        self.associations.insert(key, idx);
        idx
    }

    /// Insert an edge, or lower an existing one's time (taking the new
    /// composition along with it).
    fn set_edge(&mut self, from: NodeIndex, to: NodeIndex, travel_ms: i64, composition: Option<Composition>) {
        match self.graph.find_edge(from, to) {
            None => {
                self.graph.add_edge(from, to, Edge { travel_ms, composition });
            }
            Some(idx) => {
                let edge = &mut self.graph[idx];
                if travel_ms < edge.travel_ms {
                    edge.travel_ms = travel_ms;
                    edge.composition = composition;
                }
            }
        }
    }

    fn expand(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        active: &mut Vec<EdgeIndex>,
        out: &mut Vec<(NodeIndex, NodeIndex)>,
    ) -> Result<(), NetworkError> {
        let idx = self
            .graph
            .find_edge(from, to)
            .ok_or_else(|| NetworkError::MissingEdge {
                from: self.graph[from].key(),
                to: self.graph[to].key(),
            })?;

        let Some(composition) = &self.graph[idx].composition else {
            out.push((from, to));
            return Ok(());
        };
        if active.contains(&idx) {
            return Err(NetworkError::CyclicComposition {
                from: self.graph[from].key(),
                to: self.graph[to].key(),
            });
        }

        active.push(idx);
        for (a, b) in composition.oriented(from) {
            self.expand(a, b, active, out)?;
        }
        active.pop();
        Ok(())
    }

    /// Turn hops into segments whose times sum exactly to `total`.
    ///
    /// Times are cut at the rounded cumulative distance fraction, so each
    /// share is non-negative and the last one absorbs rounding.
    fn share_travel_time(
        &self,
        hops: &[(NodeIndex, NodeIndex)],
        total: Duration,
    ) -> Result<Vec<Segment>, DomainError> {
        let lengths: Vec<f64> = hops
            .iter()
            .map(|&(a, b)| self.graph[a].distance_to(self.graph[b].location))
            .collect();
        let total_km: f64 = lengths.iter().sum();
        let total_ms = total.num_milliseconds();
        let count = hops.len();

        let mut covered_km = 0.0;
        let mut elapsed_ms = 0;
        let mut segments = Vec::with_capacity(count);
        for (i, (&(a, b), km)) in hops.iter().zip(&lengths).enumerate() {
            covered_km += km;
            let boundary_ms = if i + 1 == count {
                total_ms
            } else if total_km > 0.0 {
                (total_ms as f64 * covered_km / total_km).round() as i64
            } else {
                total_ms * (i as i64 + 1) / count as i64
            };
            segments.push(Segment::new(
                Arc::clone(&self.graph[a]),
                Arc::clone(&self.graph[b]),
                Duration::milliseconds(boundary_ms - elapsed_ms),
            )?);
            elapsed_ms = boundary_ms;
        }
        Ok(segments)
    }
}

/// Every trip segment, keeping the fastest per unordered stop pair.
fn collect_segments<'a>(trips: impl IntoIterator<Item = &'a Trip>) -> Result<Vec<Segment>, DomainError> {
    let mut fastest: BTreeMap<(StopKey, StopKey), Segment> = BTreeMap::new();
    for trip in trips {
        for segment in trip.segments()? {
            let (a, b) = (segment.source().key(), segment.target().key());
            let pair = if a <= b { (a, b) } else { (b, a) };
            match fastest.entry(pair) {
                Entry::Vacant(entry) => {
                    entry.insert(segment);
                }
                Entry::Occupied(mut entry) => {
                    if segment.travel_time() < entry.get().travel_time() {
                        entry.insert(segment);
                    }
                }
            }
        }
    }
    Ok(fastest.into_values().collect())
}


#[cfg(test)]
mod proptests {
    use super::tests::{stop, trip};
    use super::*;
    use proptest::prelude::*;

    /// Trips over a line of stops, each calling at an increasing subset.
    fn trips_strategy() -> impl Strategy<Value = Vec<Vec<(usize, u32)>>> {
        let calls = prop::collection::btree_set(0usize..8, 2..6).prop_flat_map(|stops| {
            let n = stops.len();
            (Just(stops), prop::collection::vec(1u32..20, n))
        });
        prop::collection::vec(calls, 1..6).prop_map(|trips| {
            trips
                .into_iter()
                .map(|(stops, gaps)| {
                    let mut minute = 0;
                    stops
                        .into_iter()
                        .zip(gaps)
                        .map(|(s, gap)| {
                            minute += gap;
                            (s, minute)
                        })
                        .collect()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn decomposition_preserves_travel_time(plan in trips_strategy()) {
            let stops: Vec<_> = (0..8)
                .map(|i| stop(&format!("S{i}"), 0.0, i as f64 * 0.05))
                .collect();
            let trips: Vec<_> = plan
                .iter()
                .enumerate()
                .map(|(i, calls)| {
                    let calls: Vec<_> = calls.iter().map(|&(s, m)| (&stops[s], m)).collect();
                    trip(&format!("T{i}"), &calls)
                })
                .collect();

            let map = NetworkMap::from_trips(&trips, NetworkConfig::default()).unwrap();
            for t in &trips {
                for seg in t.segments().unwrap() {
                    let parts = map.decompose_trip_segment(&seg).unwrap();
                    let sum = parts.iter().map(Segment::travel_time).fold(Duration::zero(), |a, b| a + b);
                    prop_assert_eq!(sum, seg.travel_time());
                    prop_assert!(parts.iter().all(|p| p.travel_time() >= Duration::zero()));
                    prop_assert_eq!(&parts[0].source().stop_id, &seg.source().stop_id);
                    prop_assert_eq!(&parts[parts.len() - 1].target().stop_id, &seg.target().stop_id);
                }
            }
        }

        #[test]
        fn rebuild_gives_same_edges(plan in trips_strategy()) {
            let stops: Vec<_> = (0..8)
                .map(|i| stop(&format!("S{i}"), 0.0, i as f64 * 0.05))
                .collect();
            let trips: Vec<_> = plan
                .iter()
                .enumerate()
                .map(|(i, calls)| {
                    let calls: Vec<_> = calls.iter().map(|&(s, m)| (&stops[s], m)).collect();
                    trip(&format!("T{i}"), &calls)
                })
                .collect();

            let first = NetworkMap::from_trips(&trips, NetworkConfig::default()).unwrap();
            let second = NetworkMap::from_trips(&trips, NetworkConfig::default()).unwrap();
            prop_assert_eq!(first.edges(), second.edges());
        }
    }
}
