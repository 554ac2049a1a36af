//! Pipeline steps and the routing decision made after `initialize`.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::models::FlowState;

/// A named pipeline step, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Initialize,
    Discover,
    Scrape,
    Critique,
    PlanResearch,
    ResearchNews,
    CounterArgs,
    WriteArticles,
}

impl FlowStep {
    pub const ALL: [FlowStep; 8] = [
        FlowStep::Initialize,
        FlowStep::Discover,
        FlowStep::Scrape,
        FlowStep::Critique,
        FlowStep::PlanResearch,
        FlowStep::ResearchNews,
        FlowStep::CounterArgs,
        FlowStep::WriteArticles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Discover => "discover",
            Self::Scrape => "scrape",
            Self::Critique => "critique",
            Self::PlanResearch => "plan_research",
            Self::ResearchNews => "research_news",
            Self::CounterArgs => "counter_args",
            Self::WriteArticles => "write_articles",
        }
    }

    /// Position along the pipeline. `discover` and `scrape` are alternative
    /// entry steps and share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Initialize => 0,
            Self::Discover | Self::Scrape => 1,
            Self::Critique => 2,
            Self::PlanResearch => 3,
            Self::ResearchNews => 4,
            Self::CounterArgs => 5,
            Self::WriteArticles => 6,
        }
    }

    /// The step that follows this one. `initialize` has no fixed successor
    /// (see [`route`]) and `write_articles` is terminal.
    pub fn next(&self) -> Option<FlowStep> {
        match self {
            Self::Initialize | Self::WriteArticles => None,
            Self::Discover | Self::Scrape => Some(Self::Critique),
            Self::Critique => Some(Self::PlanResearch),
            Self::PlanResearch => Some(Self::ResearchNews),
            Self::ResearchNews => Some(Self::CounterArgs),
            Self::CounterArgs => Some(Self::WriteArticles),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WriteArticles)
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for FlowStep {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| FlowError::BadRequest(format!("Unknown step: {}", s)))
    }
}

/// Where a run continues after `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Fresh run entering at `discover` or `scrape`.
    Start(FlowStep),
    /// Checkpointed run continuing after its last completed step.
    Resume { after: FlowStep },
}

impl Route {
    /// First step to execute, or `None` when the run is already finished.
    pub fn first_step(&self) -> Option<FlowStep> {
        match self {
            Route::Start(step) => Some(*step),
            Route::Resume { after } => after.next(),
        }
    }
}

/// Decide the entry point from the progress marker and the seed inputs.
pub fn route(state: &FlowState) -> Result<Route, FlowError> {
    if state.last_completed != FlowStep::Initialize {
        return Ok(Route::Resume {
            after: state.last_completed,
        });
    }
    if state.inputs.has_topic() {
        return Ok(Route::Start(FlowStep::Discover));
    }
    if state.inputs.has_urls() {
        return Ok(Route::Start(FlowStep::Scrape));
    }
    Err(FlowError::Configuration(
        "no resumable checkpoint and no seed input (topic or news URLs)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlowInputs;

    fn state_with(topic: &str, urls: &[&str]) -> FlowState {
        FlowState::new(
            "r",
            FlowInputs {
                topic: topic.to_string(),
                news_urls: urls.iter().map(|u| u.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn topic_routes_to_discover() {
        let s = state_with("AI in banking", &["https://example.com/a"]);
        assert_eq!(route(&s).unwrap(), Route::Start(FlowStep::Discover));
    }

    #[test]
    fn urls_route_to_scrape() {
        let s = state_with("", &["https://example.com/a"]);
        assert_eq!(route(&s).unwrap(), Route::Start(FlowStep::Scrape));
    }

    #[test]
    fn no_seed_is_configuration_error() {
        let s = state_with("   ", &[]);
        assert!(matches!(route(&s), Err(FlowError::Configuration(_))));
    }

    #[test]
    fn marker_wins_over_seed_inputs() {
        for marker in [FlowStep::Discover, FlowStep::ResearchNews, FlowStep::WriteArticles] {
            let mut s = state_with("", &[]);
            s.last_completed = marker;
            assert_eq!(route(&s).unwrap(), Route::Resume { after: marker });
        }
    }

    #[test]
    fn resume_continues_with_successor() {
        assert_eq!(
            Route::Resume {
                after: FlowStep::Scrape
            }
            .first_step(),
            Some(FlowStep::Critique)
        );
        assert_eq!(
            Route::Resume {
                after: FlowStep::WriteArticles
            }
            .first_step(),
            None
        );
    }

    #[test]
    fn transition_function_walks_canonical_order() {
        let mut seen = vec![FlowStep::Discover];
        let mut cur = FlowStep::Discover;
        while let Some(next) = cur.next() {
            assert!(next.rank() > cur.rank());
            seen.push(next);
            cur = next;
        }
        assert_eq!(
            seen.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec![
                "discover",
                "critique",
                "plan_research",
                "research_news",
                "counter_args",
                "write_articles"
            ]
        );
    }

    #[test]
    fn parse_and_serde_agree() {
        for step in FlowStep::ALL {
            let parsed: FlowStep = step.as_str().parse().unwrap();
            assert_eq!(parsed, step);
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
        }
        assert!("discover_news".parse::<FlowStep>().is_err());
    }
}
