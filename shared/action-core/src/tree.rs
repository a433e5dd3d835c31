//! Flattening of the per-video annotation tree into labeled intervals

use crate::labels::{LabeledInterval, NodeAttributes, Tier};
use crate::record::AnnotationNode;
use crate::{DEFAULT_CLIP_DURATION, NOT_APPLICABLE};

/// The refined caption kinds kept in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelCategory {
    SummaryBrief,
    SummaryDetailed,
    ActionBrief,
    ActionDetailed,
    ActionActor,
}

impl LabelCategory {
    pub const ALL: [LabelCategory; 5] = [
        LabelCategory::SummaryBrief,
        LabelCategory::SummaryDetailed,
        LabelCategory::ActionBrief,
        LabelCategory::ActionDetailed,
        LabelCategory::ActionActor,
    ];

    /// Name of the sample field holding this category
    pub fn field_name(&self) -> &'static str {
        match self {
            LabelCategory::SummaryBrief => "gpt_summary_brief",
            LabelCategory::SummaryDetailed => "gpt_summary_detailed",
            LabelCategory::ActionBrief => "gpt_action_brief",
            LabelCategory::ActionDetailed => "gpt_action_detailed",
            LabelCategory::ActionActor => "gpt_action_actor",
        }
    }

    /// Action descriptions may hold the not-applicable placeholder
    pub fn suppresses_placeholder(&self) -> bool {
        matches!(self, LabelCategory::ActionBrief | LabelCategory::ActionDetailed)
    }

    fn refined_text<'a>(&self, node: &'a AnnotationNode) -> Option<&'a str> {
        match self {
            LabelCategory::SummaryBrief => node.summary_brief(),
            LabelCategory::SummaryDetailed => node.summary_detailed(),
            LabelCategory::ActionBrief => node.action_brief(),
            LabelCategory::ActionDetailed => node.action_detailed(),
            LabelCategory::ActionActor => node.action_actor(),
        }
    }
}

/// Intervals of every category for one video, in node-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationLabels {
    /// Deepest level of the tree, 0 when it has no nodes
    pub max_level: u32,
    pub summary_brief: Vec<LabeledInterval>,
    pub summary_detailed: Vec<LabeledInterval>,
    pub action_brief: Vec<LabeledInterval>,
    pub action_detailed: Vec<LabeledInterval>,
    pub action_actor: Vec<LabeledInterval>,
}

impl AnnotationLabels {
    pub fn get(&self, category: LabelCategory) -> &[LabeledInterval] {
        match category {
            LabelCategory::SummaryBrief => &self.summary_brief,
            LabelCategory::SummaryDetailed => &self.summary_detailed,
            LabelCategory::ActionBrief => &self.action_brief,
            LabelCategory::ActionDetailed => &self.action_detailed,
            LabelCategory::ActionActor => &self.action_actor,
        }
    }

    fn get_mut(&mut self, category: LabelCategory) -> &mut Vec<LabeledInterval> {
        match category {
            LabelCategory::SummaryBrief => &mut self.summary_brief,
            LabelCategory::SummaryDetailed => &mut self.summary_detailed,
            LabelCategory::ActionBrief => &mut self.action_brief,
            LabelCategory::ActionDetailed => &mut self.action_detailed,
            LabelCategory::ActionActor => &mut self.action_actor,
        }
    }

    /// Total number of intervals across categories
    pub fn total(&self) -> usize {
        LabelCategory::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Flattens annotation nodes into per-category labeled intervals
#[derive(Debug, Clone)]
pub struct TreeFlattener {
    ceiling: f64,
    not_applicable: String,
}

impl Default for TreeFlattener {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_DURATION)
    }
}

impl TreeFlattener {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling,
            not_applicable: NOT_APPLICABLE.to_string(),
        }
    }

    pub fn with_not_applicable(mut self, placeholder: impl Into<String>) -> Self {
        self.not_applicable = placeholder.into();
        self
    }

    pub fn flatten(&self, nodes: &[AnnotationNode]) -> AnnotationLabels {
        let max_level = nodes.iter().map(|n| n.level).max().unwrap_or(0);
        let mut labels = AnnotationLabels {
            max_level,
            ..Default::default()
        };

        for node in nodes {
            let start = node.start;
            let end = node.end.min(self.ceiling);
            if start >= self.ceiling || start >= end {
                continue;
            }

            let attributes = NodeAttributes {
                node_id: node.node_id.clone(),
                parent_id: node.parent_id.clone(),
                level: node.level,
                tier: Tier::classify(node.level, max_level),
            };

            for category in LabelCategory::ALL {
                let Some(text) = category.refined_text(node) else {
                    continue;
                };
                if text.is_empty() {
                    continue;
                }
                if category.suppresses_placeholder() && text == self.not_applicable {
                    continue;
                }

                labels.get_mut(category).push(
                    LabeledInterval::new(text, start, end).with_attributes(attributes.clone()),
                );
            }
        }

        labels
    }
}
