//! Cycle generator: covering closed walks through the Moore graph.
//!
//! The graph is treated as a directed multigraph over state ids with one
//! labelled edge per transition. Each generated [`TestPath`] starts and ends
//! at `S0`, and together the paths traverse every transition at least once.
//!
//! A walk is built around the next unused edge (preferring unused edges
//! leaving `S0`): a shortest lead-in from `S0` to its start state, the edge
//! itself, then greedy extension over unused outgoing edges until the walk
//! is back at `S0`, falling back to a shortest return path when the current
//! state has no unused edge left. All choices take the lexicographically
//! smallest transition id, so the output is reproducible.

mod error;

pub use error::CycleError;

use crate::core::{Model, StateId, Transition, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info};

/// One hop of a path: the transition taken and the state it leads to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub transition: TransitionId,
    pub target: StateId,
}

/// An alternating walk `state, transition, state, ..., state`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestPath {
    pub origin: StateId,
    pub steps: Vec<PathStep>,
}

impl TestPath {
    /// States in visiting order, origin first.
    pub fn states(&self) -> impl Iterator<Item = &StateId> {
        std::iter::once(&self.origin).chain(self.steps.iter().map(|step| &step.target))
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionId> {
        self.steps.iter().map(|step| &step.transition)
    }

    pub fn is_closed(&self) -> bool {
        self.states().last() == Some(&self.origin)
    }
}

impl fmt::Display for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)?;
        for step in &self.steps {
            write!(f, " --{}--> {}", step.transition, step.target)?;
        }
        Ok(())
    }
}

/// Outgoing edges per state, sorted by transition id.
struct Adjacency<'m> {
    outgoing: BTreeMap<&'m StateId, Vec<&'m Transition>>,
}

impl<'m> Adjacency<'m> {
    fn new(transitions: &'m [Transition]) -> Self {
        let mut outgoing: BTreeMap<&StateId, Vec<&Transition>> = BTreeMap::new();
        for transition in transitions {
            outgoing.entry(&transition.start).or_default().push(transition);
        }
        for edges in outgoing.values_mut() {
            edges.sort_by(|a, b| a.id.cmp(&b.id));
        }
        Self { outgoing }
    }

    fn leaving(&self, state: &StateId) -> &[&'m Transition] {
        self.outgoing.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first shortest walk from `from` to `to`; empty when equal.
    fn shortest(&self, from: &StateId, to: &StateId) -> Option<Vec<&'m Transition>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut parent: HashMap<&StateId, &'m Transition> = HashMap::new();
        let mut seen: BTreeSet<&StateId> = BTreeSet::new();
        let mut queue: VecDeque<&StateId> = VecDeque::new();
        seen.insert(from);
        queue.push_back(from);

        while let Some(state) = queue.pop_front() {
            for &edge in self.leaving(state) {
                if !seen.insert(&edge.end) {
                    continue;
                }
                parent.insert(&edge.end, edge);
                if &edge.end == to {
                    let mut walk = vec![edge];
                    let mut cursor = &edge.start;
                    while cursor != from {
                        let previous = parent[cursor];
                        walk.push(previous);
                        cursor = &previous.start;
                    }
                    walk.reverse();
                    return Some(walk);
                }
                queue.push_back(&edge.end);
            }
        }
        None
    }
}

/// Generate the covering set of test paths for `model`.
///
/// # Example
///
/// ```rust
/// use plc_conformance::core::{Model, StateId};
/// use plc_conformance::cycles::generate_paths;
///
/// let mut model = Model::new();
/// let s0 = StateId::initial();
/// let s1 = model.add_state("s1").unwrap();
/// model.add_sequential_transition("there", &s0, &s1).unwrap();
/// model.add_sequential_transition("back", &s1, &s0).unwrap();
///
/// let paths = generate_paths(&model).unwrap();
/// assert_eq!(paths.len(), 1);
/// assert_eq!(paths[0].to_string(), "S0 --T0--> S1 --T1--> S0");
/// ```
pub fn generate_paths(model: &Model) -> Result<Vec<TestPath>, CycleError> {
    let transitions = model.transitions();
    if transitions.is_empty() {
        return Err(CycleError::NoTransitions);
    }

    let initial = StateId::initial();
    let graph = Adjacency::new(transitions);
    let mut unused: BTreeSet<&TransitionId> = transitions.iter().map(|t| &t.id).collect();
    let mut paths: Vec<TestPath> = Vec::new();

    while !unused.is_empty() {
        let target = next_target(&graph, &initial, &unused, transitions)?;
        let mut steps: Vec<&Transition> = graph
            .shortest(&initial, &target.start)
            .ok_or_else(|| CycleError::Unreachable(target.id.clone()))?;
        steps.push(target);
        let mut current = &target.end;

        while current != &initial {
            let next_unused = graph
                .leaving(current)
                .iter()
                .copied()
                .find(|edge| unused.contains(&edge.id) && !steps.iter().any(|s| s.id == edge.id));
            match next_unused {
                Some(edge) => {
                    steps.push(edge);
                    current = &edge.end;
                }
                None => {
                    let back = graph
                        .shortest(current, &initial)
                        .ok_or_else(|| CycleError::NoReturn(current.clone()))?;
                    steps.extend(back);
                    current = &initial;
                }
            }
        }

        for step in &steps {
            unused.remove(&step.id);
        }

        let path = TestPath {
            origin: initial.clone(),
            steps: steps
                .iter()
                .map(|edge| PathStep {
                    transition: edge.id.clone(),
                    target: edge.end.clone(),
                })
                .collect(),
        };
        debug!(%path, "generated path");
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    info!(paths = paths.len(), transitions = transitions.len(), "generated test paths");
    Ok(paths)
}

/// The unused edge the next walk is built around.
fn next_target<'m>(
    graph: &Adjacency<'m>,
    initial: &StateId,
    unused: &BTreeSet<&TransitionId>,
    transitions: &'m [Transition],
) -> Result<&'m Transition, CycleError> {
    if let Some(edge) = graph
        .leaving(initial)
        .iter()
        .copied()
        .find(|edge| unused.contains(&edge.id))
    {
        return Ok(edge);
    }
    let id = unused.iter().next().ok_or(CycleError::NoTransitions)?;
    transitions
        .iter()
        .find(|transition| &&transition.id == id)
        .ok_or_else(|| CycleError::Unreachable((*id).clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s0() -> StateId {
        StateId::initial()
    }

    fn ids(path: &TestPath) -> Vec<&str> {
        path.transitions().map(TransitionId::as_str).collect()
    }

    #[test]
    fn self_loop_on_initial_state() {
        let mut model = Model::new();
        model.add_sequential_transition("idle", &s0(), &s0()).unwrap();
        let paths = generate_paths(&model).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].to_string(), "S0 --T0--> S0");
    }

    #[test]
    fn branches_are_covered_by_separate_walks() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        let s2 = model.add_state("b").unwrap();
        model.add_sequential_transition("t0", &s0(), &s1).unwrap();
        model.add_sequential_transition("t1", &s1, &s0()).unwrap();
        model.add_sequential_transition("t2", &s0(), &s2).unwrap();
        model.add_sequential_transition("t3", &s2, &s0()).unwrap();

        let paths = generate_paths(&model).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(ids(&paths[0]), vec!["T0", "T1"]);
        assert_eq!(ids(&paths[1]), vec!["T2", "T3"]);
    }

    #[test]
    fn inner_edges_get_a_lead_in_and_a_return() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        let s2 = model.add_state("b").unwrap();
        model.add_sequential_transition("t0", &s0(), &s1).unwrap();
        model.add_sequential_transition("t1", &s1, &s0()).unwrap();
        model.add_sequential_transition("t2", &s1, &s2).unwrap();
        model.add_sequential_transition("t3", &s2, &s1).unwrap();

        let paths = generate_paths(&model).unwrap();
        for path in &paths {
            assert!(path.is_closed());
            assert_eq!(path.origin, s0());
        }
        let covered: BTreeSet<&str> = paths.iter().flat_map(ids).collect();
        assert_eq!(covered, ["T0", "T1", "T2", "T3"].into_iter().collect());
    }

    #[test]
    fn smallest_id_wins_ties() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        model.add_sequential_transition("first", &s0(), &s1).unwrap();
        model.add_sequential_transition("second", &s0(), &s1).unwrap();
        model.add_sequential_transition("back", &s1, &s0()).unwrap();

        let paths = generate_paths(&model).unwrap();
        assert_eq!(ids(&paths[0]), vec!["T0", "T2"]);
        assert_eq!(ids(&paths[1]), vec!["T1", "T2"]);
    }

    #[test]
    fn generation_is_deterministic() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        let s2 = model.add_state("b").unwrap();
        model.add_sequential_transition("x", &s0(), &s1).unwrap();
        model.add_sequential_transition("y", &s1, &s2).unwrap();
        model.add_sequential_transition("z", &s2, &s0()).unwrap();
        model.add_sequential_transition("w", &s2, &s1).unwrap();
        assert_eq!(generate_paths(&model).unwrap(), generate_paths(&model).unwrap());
    }

    #[test]
    fn disconnected_cycle_is_reported() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        let s2 = model.add_state("b").unwrap();
        model.add_sequential_transition("idle", &s0(), &s0()).unwrap();
        model.add_sequential_transition("x", &s1, &s2).unwrap();
        model.add_sequential_transition("y", &s2, &s1).unwrap();
        assert_eq!(
            generate_paths(&model),
            Err(CycleError::Unreachable(TransitionId::from("T1")))
        );
    }

    #[test]
    fn dead_end_is_reported() {
        let mut model = Model::new();
        let s1 = model.add_state("a").unwrap();
        model.add_sequential_transition("x", &s0(), &s1).unwrap();
        assert_eq!(generate_paths(&model), Err(CycleError::NoReturn(s1)));
    }

    #[test]
    fn empty_graph_is_rejected() {
        assert_eq!(generate_paths(&Model::new()), Err(CycleError::NoTransitions));
    }
}
