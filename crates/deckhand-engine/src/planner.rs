use serde::{Deserialize, Serialize};

use deckhand_core::report::{CreationMode, QualityProfile};
use deckhand_core::units::SlideSpec;

pub const DEFAULT_MAX_PLAN_STEPS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Qa,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub stage: Stage,
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub mode: CreationMode,
    pub quality_profile: QualityProfile,
    pub steps: Vec<PlanStep>,
}

/// Deterministic execution plan: one research step per slide in manifest
/// order, then content QA, then visual QA unless the profile skips it.
/// Truncated to `max(1, max_steps)`, dropping trailing steps.
pub fn build_plan(
    mode: CreationMode,
    profile: QualityProfile,
    slides: &[SlideSpec],
    max_steps: usize,
) -> Plan {
    let mut steps: Vec<PlanStep> = slides
        .iter()
        .map(|spec| PlanStep {
            stage: Stage::Research,
            tool: "research.route_sources".to_string(),
            slide_index: Some(spec.index),
        })
        .collect();

    steps.push(PlanStep {
        stage: Stage::Qa,
        tool: "qa.content_check".to_string(),
        slide_index: None,
    });
    if profile.runs_visual_qa() {
        steps.push(PlanStep {
            stage: Stage::Qa,
            tool: "qa.visual_check".to_string(),
            slide_index: None,
        });
    }

    steps.truncate(max_steps.max(1));
    Plan {
        mode,
        quality_profile: profile,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slides(n: usize) -> Vec<SlideSpec> {
        (0..n)
            .map(|i| SlideSpec {
                index: i,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn balanced_plan_has_research_then_both_qa_stages() {
        let plan = build_plan(
            CreationMode::Generate,
            QualityProfile::Balanced,
            &slides(3),
            DEFAULT_MAX_PLAN_STEPS,
        );
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.steps[0].stage, Stage::Research);
        assert_eq!(plan.steps[0].slide_index, Some(0));
        assert_eq!(plan.steps[2].slide_index, Some(2));
        assert_eq!(plan.steps[3].tool, "qa.content_check");
        assert_eq!(plan.steps[4].tool, "qa.visual_check");
    }

    #[test]
    fn fast_profile_omits_visual_qa() {
        let plan = build_plan(
            CreationMode::Generate,
            QualityProfile::Fast,
            &slides(2),
            DEFAULT_MAX_PLAN_STEPS,
        );
        assert_eq!(plan.steps.len(), 3);
        assert!(plan.steps.iter().all(|s| s.tool != "qa.visual_check"));
    }

    #[test]
    fn step_cap_drops_trailing_steps() {
        let plan = build_plan(
            CreationMode::Generate,
            QualityProfile::HighFidelity,
            &slides(20),
            DEFAULT_MAX_PLAN_STEPS,
        );
        assert_eq!(plan.steps.len(), 12);
        // QA steps fell off the end; all survivors are research.
        assert!(plan.steps.iter().all(|s| s.stage == Stage::Research));
    }

    #[test]
    fn cap_has_a_floor_of_one() {
        let plan = build_plan(
            CreationMode::Revise,
            QualityProfile::Balanced,
            &slides(2),
            0,
        );
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn empty_deck_still_plans_qa() {
        let plan = build_plan(
            CreationMode::Generate,
            QualityProfile::Balanced,
            &[],
            DEFAULT_MAX_PLAN_STEPS,
        );
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].tool, "qa.content_check");
    }
}
