//! Candidate scoring
//!
//! Scores are the sum of three bounded parts: matched required skills,
//! a flat location bonus and free capacity. Scoring is pure; it sees only
//! the profile handed in.

use crate::config::ScoringConfig;
use crate::graph::{CandidateRow, GraphView, NodeId};
use crate::requirement::Requirement;
use crate::skills::SkillId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Everything the scorer needs to know about one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate: CandidateRow,
    pub skills: Vec<SkillId>,
    /// Sum of active allocations
    pub current_load: f64,
}

impl CandidateProfile {
    pub fn node(&self) -> NodeId {
        self.candidate.node
    }

    pub fn headroom(&self) -> f64 {
        (1.0 - self.current_load).max(0.0)
    }

    pub fn is_available(&self) -> bool {
        self.current_load < 1.0 - crate::graph::staffing::ALLOCATION_EPSILON
    }

    pub fn has_skill(&self, skill: &SkillId) -> bool {
        self.skills.contains(skill)
    }
}

/// Read every candidate profile from a view
pub fn load_profiles(view: &dyn GraphView, today: NaiveDate) -> Vec<CandidateProfile> {
    view.candidates()
        .into_iter()
        .map(|candidate| profile_of(view, candidate, today))
        .collect()
}

pub fn profile_of(view: &dyn GraphView, candidate: CandidateRow, today: NaiveDate) -> CandidateProfile {
    CandidateProfile {
        skills: view.candidate_skills(candidate.node),
        current_load: view.active_load(candidate.node, today),
        candidate,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skill_score: f64,
    pub location_score: f64,
    pub availability_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    pub matched_skills: Vec<SkillId>,
}

/// Case-insensitive equality or containment; no constraint always matches
pub fn location_matches(candidate: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => {
            let wanted = wanted.trim().to_lowercase();
            candidate
                .map(|loc| loc.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateScorer {
    weights: ScoringConfig,
}

impl CandidateScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn score(&self, profile: &CandidateProfile, requirement: &Requirement) -> ScoreCard {
        let matched_skills: Vec<SkillId> = requirement
            .required_skills
            .iter()
            .filter(|skill| profile.has_skill(skill))
            .cloned()
            .collect();

        let skill_score = matched_skills.len() as f64 * self.weights.skill_weight;
        let location_score = if location_matches(
            profile.candidate.location.as_deref(),
            requirement.location.as_deref(),
        ) {
            self.weights.location_weight
        } else {
            0.0
        };
        let load = profile.current_load.clamp(0.0, 1.0);
        let availability_score = (1.0 - load) * self.weights.availability_weight;

        ScoreCard {
            total: skill_score + location_score + availability_score,
            breakdown: ScoreBreakdown {
                skill_score,
                location_score,
                availability_score,
            },
            matched_skills,
        }
    }

    /// Score and order a pool: total descending, then lower load, then
    /// candidate id
    pub fn rank<'a>(
        &self,
        pool: impl IntoIterator<Item = &'a CandidateProfile>,
        requirement: &Requirement,
    ) -> Vec<(&'a CandidateProfile, ScoreCard)> {
        let mut ranked: Vec<(&CandidateProfile, ScoreCard)> = pool
            .into_iter()
            .map(|profile| (profile, self.score(profile, requirement)))
            .collect();
        ranked.sort_by(|(a, sa), (b, sb)| compare(a, sa, b, sb));
        ranked
    }
}

fn compare(a: &CandidateProfile, sa: &ScoreCard, b: &CandidateProfile, sb: &ScoreCard) -> Ordering {
    sb.total
        .total_cmp(&sa.total)
        .then_with(|| a.current_load.total_cmp(&b.current_load))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, skills: &[&str], location: Option<&str>, load: f64) -> CandidateProfile {
        CandidateProfile {
            candidate: CandidateRow {
                node: NodeId::new(1),
                id: id.to_string(),
                name: id.to_string(),
                location: location.map(str::to_string),
                seniority: None,
                hourly_rate: None,
                years_experience: None,
                summary: None,
            },
            skills: crate::skills::normalize_all(skills),
            current_load: load,
        }
    }

    #[test]
    fn test_score_components() {
        let scorer = CandidateScorer::default();
        let req = Requirement::new(&["Python", "AWS", "Rust"], 3).with_location("Berlin");
        let card = scorer.score(&profile("a", &["python", "aws"], Some("Berlin, DE"), 0.5), &req);

        assert_eq!(card.breakdown.skill_score, 20.0);
        assert_eq!(card.breakdown.location_score, 10.0);
        assert_eq!(card.breakdown.availability_score, 10.0);
        assert_eq!(card.total, 40.0);
        assert_eq!(card.matched_skills.len(), 2);
    }

    #[test]
    fn test_skill_match_is_case_and_synonym_insensitive() {
        let scorer = CandidateScorer::default();
        let upper = scorer.score(&profile("a", &["Python"], None, 0.0), &Requirement::new(&["Python"], 1));
        let lower = scorer.score(&profile("a", &["python"], None, 0.0), &Requirement::new(&["Python"], 1));
        let alias = scorer.score(&profile("a", &["py"], None, 0.0), &Requirement::new(&["Python"], 1));
        assert_eq!(upper.breakdown.skill_score, 10.0);
        assert_eq!(upper.breakdown.skill_score, lower.breakdown.skill_score);
        assert_eq!(upper.breakdown.skill_score, alias.breakdown.skill_score);
    }

    #[test]
    fn test_location_is_flat_bonus() {
        let scorer = CandidateScorer::default();
        let req = Requirement::new(&["go"], 1).with_location("Warsaw");
        let missing = scorer.score(&profile("a", &[], None, 0.0), &req);
        let elsewhere = scorer.score(&profile("b", &[], Some("Krakow"), 0.0), &req);
        let here = scorer.score(&profile("c", &[], Some("warsaw"), 0.0), &req);
        assert_eq!(missing.breakdown.location_score, 0.0);
        assert_eq!(elsewhere.breakdown.location_score, 0.0);
        assert_eq!(here.breakdown.location_score, 10.0);

        let anywhere = Requirement::new(&["go"], 1);
        assert_eq!(scorer.score(&profile("a", &[], None, 0.0), &anywhere).breakdown.location_score, 10.0);
    }

    #[test]
    fn test_fully_booked_scores_no_availability() {
        let scorer = CandidateScorer::default();
        let card = scorer.score(&profile("a", &[], None, 1.0), &Requirement::new(&["go"], 1));
        assert_eq!(card.breakdown.availability_score, 0.0);
    }

    #[test]
    fn test_rank_tie_breaks() {
        let scorer = CandidateScorer::default();
        let req = Requirement::new(&["python"], 3);
        // Same total (10 + 10 + 20*0.5 = 30 vs 0 + 10 + 20 = 30): lower load first
        let busy_expert = profile("z", &["python"], None, 0.5);
        let free_novice = profile("y", &[], None, 0.0);
        let free_novice_b = profile("x", &[], None, 0.0);
        let pool = vec![busy_expert, free_novice, free_novice_b];

        let ranked: Vec<&str> = scorer
            .rank(&pool, &req)
            .into_iter()
            .map(|(p, _)| p.candidate.id.as_str())
            .collect();
        assert_eq!(ranked, vec!["x", "y", "z"]);
    }
}
