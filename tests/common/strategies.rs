use proptest::prelude::*;

use promote_core::RunState;

/// Destination paths like `/site/abc/def`
pub fn path_strategy() -> impl Strategy<Value = String> {
    "/[a-z]{1,8}(/[a-z0-9]{1,8}){0,3}"
}

/// Between zero and `max` distinct destination paths
pub fn path_list_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(path_strategy(), 0..=max).prop_map(|set| set.into_iter().collect())
}

pub fn capacity_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

pub fn run_state_strategy() -> impl Strategy<Value = RunState> {
    prop::sample::select(RunState::ALL.to_vec())
}

/// Arbitrary target root paths, including separators and mixed case
pub fn root_path_strategy() -> impl Strategy<Value = String> {
    "[/ _.A-Za-z0-9-]{0,40}"
}
