//! Domain systems for blueprint graphs.
//!
//! Each system drives the actions of one type id and runs after the core
//! transition and flow systems. Systems only touch their own actions' state
//! and the blackboard, and produce side effects only through the runner's
//! [`HostServices`](blueprint_core::host::HostServices).
//!
//! | type id     | system                | outcome ports     |
//! |-------------|-----------------------|-------------------|
//! | `delay`     | [`DelaySystem`]       | `out`             |
//! | `filter`    | [`FilterSystem`]      | `pass` / `reject` |
//! | `set_value` | [`SetValueSystem`]    | `out`             |
//! | `trigger`   | [`TriggerSystem`]     | `out`             |
//! | `spawn`     | [`SpawnSystem`]       | `out`             |
//! | `warning`   | [`WarningSystem`]     | `out`             |
//! | `log`       | [`LogSystem`]         | `out`             |
//!
//! Malformed or missing properties never fail a run: the documented default
//! is used and a diagnostic is recorded on the frame.

pub mod effects;
pub mod filter;
pub mod set_value;
pub mod timing;
pub mod trigger;

use blueprint_core::frame::BlueprintFrame;
use blueprint_core::id::ActionIndex;
use blueprint_core::runner::core_systems;
use blueprint_core::state::Phase;
use blueprint_core::system::{DOMAIN_ORDER, System};

pub use effects::{LogSystem, SpawnSystem, WarningSystem};
pub use filter::FilterSystem;
pub use set_value::SetValueSystem;
pub use timing::DelaySystem;
pub use trigger::TriggerSystem;

/// Type ids handled by this crate.
pub mod types {
    pub const DELAY: &str = "delay";
    pub const FILTER: &str = "filter";
    pub const SET_VALUE: &str = "set_value";
    pub const TRIGGER: &str = "trigger";
    pub const SPAWN: &str = "spawn";
    pub const WARNING: &str = "warning";
    pub const LOG: &str = "log";
}

/// Pipeline orders. Value-producing systems run before the ones that read
/// values, and host effects run last.
pub mod order {
    use super::DOMAIN_ORDER;

    pub const DELAY: i32 = DOMAIN_ORDER;
    pub const SET_VALUE: i32 = DOMAIN_ORDER + 10;
    pub const FILTER: i32 = DOMAIN_ORDER + 20;
    pub const TRIGGER: i32 = DOMAIN_ORDER + 30;
    pub const SPAWN: i32 = DOMAIN_ORDER + 40;
    pub const WARNING: i32 = DOMAIN_ORDER + 50;
    pub const LOG: i32 = DOMAIN_ORDER + 60;
}

/// Every domain system in this crate.
pub fn domain_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(DelaySystem::new()),
        Box::new(SetValueSystem::new()),
        Box::new(FilterSystem::new()),
        Box::new(TriggerSystem::new()),
        Box::new(SpawnSystem::new()),
        Box::new(WarningSystem::new()),
        Box::new(LogSystem::new()),
    ]
}

/// The core systems followed by every domain system: a complete pipeline.
pub fn default_systems() -> Vec<Box<dyn System>> {
    let mut systems = core_systems();
    systems.extend(domain_systems());
    systems
}

/// Actions of `type_id` that are Running this tick.
pub(crate) fn running(frame: &BlueprintFrame, type_id: &str) -> Vec<ActionIndex> {
    frame
        .action_indices(type_id)
        .iter()
        .copied()
        .filter(|&index| frame.phase(index) == Phase::Running)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipeline_is_ordered_and_complete() {
        let mut names: Vec<(i32, String)> = default_systems()
            .iter()
            .map(|s| (s.order(), s.name().to_string()))
            .collect();
        names.sort_by_key(|(order, _)| *order);
        let names: Vec<&str> = names.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "transition",
                "flow",
                "delay",
                "set_value",
                "filter",
                "trigger",
                "spawn",
                "warning",
                "log"
            ]
        );
    }

    #[test]
    fn every_domain_type_is_claimed_once() {
        let mut claimed: Vec<&str> = domain_systems()
            .iter()
            .flat_map(|s| s.type_ids().to_vec())
            .collect();
        claimed.sort_unstable();
        let mut expected = vec![
            types::DELAY,
            types::FILTER,
            types::SET_VALUE,
            types::TRIGGER,
            types::SPAWN,
            types::WARNING,
            types::LOG,
        ];
        expected.sort_unstable();
        assert_eq!(claimed, expected);
    }
}
