//! Causality chain tracing over the directed event graph.
//!
//! Each event lists the events it causes. Ancestors of a focal event are
//! found by walking those edges in reverse, descendants by walking them
//! forward. Both walks are breadth-first, depth-bounded, and carry a
//! visited set since authored causal data can contain cycles.

use crate::id::EventId;
use crate::model::Event;
use std::collections::{HashMap, HashSet, VecDeque};

/// One event in a causal chain, tagged with its hop distance from the
/// focal event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CausalLink {
    /// Event id
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Hops from the focal event
    pub distance: usize,
}

/// Bounded ancestor and descendant sets around a focal event
#[derive(Debug, Clone)]
pub struct CausalityChain {
    /// The event the chain is centered on
    pub focal: EventId,
    /// Display name of the focal event
    pub focal_name: String,
    /// Events that (transitively) caused the focal event, nearest first
    pub causes: Vec<CausalLink>,
    /// Events the focal event (transitively) causes, nearest first
    pub effects: Vec<CausalLink>,
    /// Anomalies encountered while tracing
    pub warnings: Vec<String>,
}

/// Trace causes and effects of `focal` through `events`, out to
/// `max_depth` hops in each direction.
pub(crate) fn trace(focal: &Event, events: &[Event], max_depth: usize) -> CausalityChain {
    let mut names: HashMap<EventId, &str> = HashMap::new();
    let mut forward: HashMap<EventId, Vec<EventId>> = HashMap::new();
    let mut reverse: HashMap<EventId, Vec<EventId>> = HashMap::new();
    let mut warnings = Vec::new();

    for event in events {
        names.insert(event.id, &event.name);
    }
    for event in events {
        for &effect in &event.causes {
            if effect == event.id {
                warnings.push(format!("event '{}' lists itself as an effect", event.name));
                continue;
            }
            if !names.contains_key(&effect) {
                warnings.push(format!(
                    "event '{}' causes {effect}, which is not in the vault",
                    event.name
                ));
                continue;
            }
            forward.entry(event.id).or_default().push(effect);
            reverse.entry(effect).or_default().push(event.id);
        }
    }

    let causes = bounded_walk(focal.id, &reverse, &names, max_depth);
    let effects = bounded_walk(focal.id, &forward, &names, max_depth);

    CausalityChain {
        focal: focal.id,
        focal_name: focal.name.clone(),
        causes,
        effects,
        warnings,
    }
}

/// BFS from `start` over `adjacency`, excluding the start itself,
/// yielding links sorted by distance then name.
fn bounded_walk(
    start: EventId,
    adjacency: &HashMap<EventId, Vec<EventId>>,
    names: &HashMap<EventId, &str>,
    max_depth: usize,
) -> Vec<CausalLink> {
    let mut visited: HashSet<EventId> = HashSet::new();
    visited.insert(start);
    let mut queue: VecDeque<(EventId, usize)> = VecDeque::new();
    queue.push_back((start, 0));
    let mut links = Vec::new();

    while let Some((node, distance)) = queue.pop_front() {
        if distance >= max_depth {
            continue;
        }
        let Some(nexts) = adjacency.get(&node) else {
            continue;
        };
        for &next in nexts {
            if !visited.insert(next) {
                continue;
            }
            if let Some(name) = names.get(&next) {
                links.push(CausalLink {
                    id: next,
                    name: (*name).to_owned(),
                    distance: distance + 1,
                });
            }
            queue.push_back((next, distance + 1));
        }
    }

    links.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.name.cmp(&b.name)));
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::VaultId;

    fn chain_of(names: &[&str], vault: VaultId) -> Vec<Event> {
        let mut events: Vec<Event> = names
            .iter()
            .map(|name| Event::new(vault, *name))
            .collect();
        for i in 0..events.len().saturating_sub(1) {
            let effect = events[i + 1].id;
            events[i].causes.push(effect);
        }
        events
    }

    #[test]
    fn test_linear_chain_splits_into_causes_and_effects() {
        let vault = VaultId::new();
        let events = chain_of(&["spark", "fire", "collapse", "exodus"], vault);
        let focal = events[1].clone();

        let chain = trace(&focal, &events, 5);

        assert_eq!(chain.causes.len(), 1);
        assert_eq!(chain.causes[0].name, "spark");
        assert_eq!(chain.causes[0].distance, 1);

        assert_eq!(chain.effects.len(), 2);
        assert_eq!(chain.effects[0].name, "collapse");
        assert_eq!(chain.effects[1].name, "exodus");
        assert_eq!(chain.effects[1].distance, 2);
    }

    #[test]
    fn test_three_cycle_terminates_without_duplicates() {
        let vault = VaultId::new();
        let mut events = chain_of(&["one", "two", "three"], vault);
        let first = events[0].id;
        events[2].causes.push(first);
        let focal = events[0].clone();

        let chain = trace(&focal, &events, 5);

        // Bounded, non-repeating, focal excluded
        assert_eq!(chain.effects.len(), 2);
        let ids: HashSet<EventId> = chain.effects.iter().map(|link| link.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&focal.id));
        // The cycle makes both remaining nodes ancestors as well
        assert_eq!(chain.causes.len(), 2);
    }

    #[test]
    fn test_max_depth_bounds_each_direction() {
        let vault = VaultId::new();
        let events = chain_of(&["a", "b", "c", "d", "e"], vault);
        let focal = events[0].clone();

        let chain = trace(&focal, &events, 2);
        assert_eq!(chain.effects.len(), 2);
        assert!(chain.effects.iter().all(|link| link.distance <= 2));
    }

    #[test]
    fn test_dangling_effect_warned_and_skipped() {
        let vault = VaultId::new();
        let mut events = chain_of(&["a", "b"], vault);
        events[0].causes.push(EventId::new());
        let focal = events[0].clone();

        let chain = trace(&focal, &events, 5);
        assert_eq!(chain.effects.len(), 1);
        assert_eq!(chain.warnings.len(), 1);
    }
}
