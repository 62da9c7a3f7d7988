// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use proptest::prelude::*;
use std::sync::Arc;

use telos_cortex::engine::evaluator::PolicyEvaluator;
use telos_cortex::engine_core::guardian::Guardian;
use telos_cortex::engine_core::models::{Policy, TaintLevel};

fn level() -> impl Strategy<Value = TaintLevel> {
    (0u8..=4).prop_map(|n| TaintLevel::try_from(n).unwrap())
}

fn guardian_with(max: TaintLevel) -> Guardian {
    Guardian::new(Arc::new(Policy {
        max_taint_for_exec: max,
        ..Policy::default()
    }))
}

#[derive(Debug, Clone)]
enum Op {
    Register(u32),
    Unregister(u32),
    Report(u8, TaintLevel),
    Map(u8, u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..6).prop_map(Op::Register),
        (1u32..6).prop_map(Op::Unregister),
        (0u8..8, level()).prop_map(|(s, l)| Op::Report(s, l)),
        (0u8..8, 1u32..6).prop_map(|(s, p)| Op::Map(s, p)),
    ]
}

proptest! {
    #[test]
    fn test_agent_taint_is_monotonic(levels in prop::collection::vec(level(), 1..40)) {
        let guardian = guardian_with(TaintLevel::Medium);
        guardian.register_agent(10);

        let mut highest = TaintLevel::Clean;
        for (i, l) in levels.iter().enumerate() {
            guardian.update_taint(&format!("tab-{}", i % 3), *l, "");
            highest = highest.max(*l);
            prop_assert_eq!(guardian.get_taint_level(10), highest);
        }

        guardian.clear_taint(10);
        prop_assert_eq!(guardian.get_taint_level(10), TaintLevel::Clean);
    }

    #[test]
    fn test_exec_threshold_is_strict(max in level(), current in level()) {
        let guardian = guardian_with(max);
        guardian.register_agent(1);
        guardian.update_taint("tab", current, "");

        prop_assert_eq!(PolicyEvaluator::should_block_exec(&guardian, 1), current > max);
    }

    #[test]
    fn test_structural_invariants_hold(ops in prop::collection::vec(op(), 1..60)) {
        let guardian = guardian_with(TaintLevel::Medium);
        for op in ops {
            match op {
                Op::Register(pid) => { guardian.register_agent(pid); }
                Op::Unregister(pid) => { guardian.unregister_agent(pid); }
                Op::Report(s, l) => { guardian.update_taint(&format!("tab-{}", s), l, ""); }
                Op::Map(s, pid) => { let _ = guardian.map_view_to_agent(&format!("tab-{}", s), pid); }
            }

            let snap = guardian.snapshot();
            if let Some(active) = snap.active_agent {
                prop_assert!(snap.agents.contains_key(&active));
            }
            prop_assert_eq!(snap.active_agent.is_none(), snap.agents.is_empty());
            for (source, pid) in &snap.view_agent_map {
                prop_assert!(snap.agents.contains_key(pid), "{} maps to unregistered {}", source, pid);
            }
        }
    }

    #[test]
    fn test_resolution_is_sticky(first in 1u32..100, second in 100u32..200) {
        let guardian = guardian_with(TaintLevel::Medium);
        guardian.register_agent(first);
        prop_assert_eq!(guardian.resolve_agent_for_view("tab"), Some(first));

        guardian.register_agent(second);
        prop_assert_eq!(guardian.resolve_agent_for_view("tab"), Some(first));
        prop_assert_eq!(guardian.resolve_agent_for_view("fresh"), Some(second));

        guardian.map_view_to_agent("tab", second).unwrap();
        prop_assert_eq!(guardian.resolve_agent_for_view("tab"), Some(second));
    }
}
