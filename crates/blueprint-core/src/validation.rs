//! Load-time structural validation.
//!
//! Validation is the only fatal tier: a graph that fails here never produces
//! a frame, and no tick runs on it.

use std::collections::HashMap;

use crate::graph::CompiledGraph;
use crate::id::ActionIndex;

/// Which end of a transition is dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEnd {
    From,
    To,
}

impl std::fmt::Display for TransitionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionEnd::From => f.write_str("source"),
            TransitionEnd::To => f.write_str("target"),
        }
    }
}

/// Structural problems that prevent a graph from loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("duplicate action id '{0}'")]
    DuplicateActionId(String),
    #[error("transition {transition} has unknown {end} action '{action_id}'")]
    DanglingTransition {
        transition: usize,
        end: TransitionEnd,
        action_id: String,
    },
    #[error("graph has no start action")]
    NoStartNode,
    #[error("graph has {} start actions: {}", .0.len(), .0.join(", "))]
    MultipleStartNodes(Vec<String>),
}

/// Validate `graph` and return the action-id index together with the index
/// of the sole start action.
///
/// Checks run in order: duplicate ids, dangling endpoints, start count.
pub fn validate_graph(
    graph: &CompiledGraph,
) -> Result<(HashMap<String, ActionIndex>, ActionIndex), LoadError> {
    let mut index_by_id = HashMap::with_capacity(graph.actions.len());
    for (i, action) in graph.actions.iter().enumerate() {
        if index_by_id
            .insert(action.id.clone(), ActionIndex::from(i))
            .is_some()
        {
            return Err(LoadError::DuplicateActionId(action.id.clone()));
        }
    }

    for (i, transition) in graph.transitions.iter().enumerate() {
        if !index_by_id.contains_key(&transition.from_action) {
            return Err(LoadError::DanglingTransition {
                transition: i,
                end: TransitionEnd::From,
                action_id: transition.from_action.clone(),
            });
        }
        if !index_by_id.contains_key(&transition.to_action) {
            return Err(LoadError::DanglingTransition {
                transition: i,
                end: TransitionEnd::To,
                action_id: transition.to_action.clone(),
            });
        }
    }

    let starts: Vec<usize> = graph
        .actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_start())
        .map(|(i, _)| i)
        .collect();

    match starts.as_slice() {
        [] => Err(LoadError::NoStartNode),
        [single] => Ok((index_by_id, ActionIndex::from(*single))),
        many => Err(LoadError::MultipleStartNodes(
            many.iter().map(|&i| graph.actions[i].id.clone()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CompiledAction, CompiledTransition, action_types};

    fn graph(actions: &[(&str, &str)], transitions: &[(&str, &str)]) -> CompiledGraph {
        CompiledGraph {
            actions: actions
                .iter()
                .map(|(id, ty)| CompiledAction::new(*id, *ty))
                .collect(),
            transitions: transitions
                .iter()
                .map(|(a, b)| CompiledTransition::new(*a, *b))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_graph_returns_start_index() {
        let g = graph(
            &[("a", "delay"), ("s", action_types::START)],
            &[("s", "a")],
        );
        let (ids, start) = validate_graph(&g).unwrap();
        assert_eq!(start, ActionIndex(1));
        assert_eq!(ids["a"], ActionIndex(0));
    }

    #[test]
    fn duplicate_id_rejected() {
        let g = graph(&[("s", action_types::START), ("s", "delay")], &[]);
        assert_eq!(
            validate_graph(&g).unwrap_err(),
            LoadError::DuplicateActionId("s".into())
        );
    }

    #[test]
    fn dangling_target_rejected() {
        let g = graph(&[("s", action_types::START)], &[("s", "ghost")]);
        match validate_graph(&g).unwrap_err() {
            LoadError::DanglingTransition {
                transition,
                end,
                action_id,
            } => {
                assert_eq!(transition, 0);
                assert_eq!(end, TransitionEnd::To);
                assert_eq!(action_id, "ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn dangling_source_rejected() {
        let g = graph(&[("s", action_types::START)], &[("ghost", "s")]);
        assert!(matches!(
            validate_graph(&g),
            Err(LoadError::DanglingTransition {
                end: TransitionEnd::From,
                ..
            })
        ));
    }

    #[test]
    fn start_count_enforced() {
        let none = graph(&[("a", "delay")], &[]);
        assert_eq!(validate_graph(&none).unwrap_err(), LoadError::NoStartNode);

        let two = graph(&[("s1", action_types::START), ("s2", action_types::START)], &[]);
        let err = validate_graph(&two).unwrap_err();
        assert_eq!(
            err,
            LoadError::MultipleStartNodes(vec!["s1".into(), "s2".into()])
        );
        assert_eq!(err.to_string(), "graph has 2 start actions: s1, s2");
    }
}
