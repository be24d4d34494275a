//! Heuristic question reading
//!
//! Keyword rules for the six intents plus entity recognition against a
//! vocabulary snapshot of the graph. Reading does no I/O; the same question
//! against the same vocabulary always reads the same way.
//!
//! Rules fire in precedence order: scenario, temporal, reasoning,
//! aggregation, counting. Filtering is the residual rule and fires only when
//! nothing else did.

use super::plan::{
    AggregateFunction, Aggregation, CountTarget, GroupKey, Intent, Link, Measure, NumericField, PlanSource,
    QueryFilters, QueryPlan, ScenarioChange, ScenarioPlan, TemporalFocus, TimeWindow,
};
use crate::graph::{AffiliationKind, GraphView, ProjectStatus, Seniority};
use crate::requirement::{normalize_location, Requirement};
use crate::skills::{synonym_table, SkillId};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Longest phrase, in tokens, looked up in the vocabulary
const MAX_PHRASE: usize = 6;

const SEPARATORS: &[char] = &[',', '?', '!', ';', ':', '(', ')', '"', '/', '[', ']'];
const QUOTES: &[char] = &['\'', '`', '‘', '’'];

const ENTITY_WORDS: &[&str] = &[
    "developer", "developers", "dev", "devs", "engineer", "engineers", "people", "person",
    "candidate", "candidates", "consultant", "consultants", "employee", "employees", "resource",
    "resources", "folks", "members", "specialist", "specialists", "experts",
];

const COUNT_CUES: &[&str] = &["how many", "count", "number of", "headcount"];

const LIST_CUES: &[&str] = &[
    "list", "show", "find", "who", "which", "give me", "display", "what skills",
    "what technologies", "does", "search", "get",
];

const AVAILABILITY_CUES: &[&str] = &[
    "available", "free", "unassigned", "bench", "idle", "spare capacity", "not assigned",
];

const FUNCTION_CUES: &[(&str, AggregateFunction)] = &[
    ("average", AggregateFunction::Avg),
    ("avg", AggregateFunction::Avg),
    ("mean", AggregateFunction::Avg),
    ("total", AggregateFunction::Sum),
    ("sum", AggregateFunction::Sum),
    ("combined", AggregateFunction::Sum),
    ("minimum", AggregateFunction::Min),
    ("min", AggregateFunction::Min),
    ("lowest", AggregateFunction::Min),
    ("cheapest", AggregateFunction::Min),
    ("maximum", AggregateFunction::Max),
    ("max", AggregateFunction::Max),
    ("highest", AggregateFunction::Max),
    ("most expensive", AggregateFunction::Max),
];

const FIELD_CUES: &[(&str, NumericField)] = &[
    ("hourly rate", NumericField::HourlyRate),
    ("hourly rates", NumericField::HourlyRate),
    ("rate", NumericField::HourlyRate),
    ("rates", NumericField::HourlyRate),
    ("cost", NumericField::HourlyRate),
    ("costs", NumericField::HourlyRate),
    ("price", NumericField::HourlyRate),
    ("years of experience", NumericField::YearsExperience),
    ("experience", NumericField::YearsExperience),
    ("workload", NumericField::CurrentLoad),
    ("load", NumericField::CurrentLoad),
    ("allocation", NumericField::CurrentLoad),
    ("utilization", NumericField::CurrentLoad),
    ("utilisation", NumericField::CurrentLoad),
];

const SKILL_COUNT_CUES: &[&str] = &["skills", "skill count", "number of skills"];

const CAPACITY_CUES: &[&str] = &["capacity", "bench strength"];

const REASONING_PERSON_CUES: &[&str] = &[
    "worked with", "work with", "works with", "colleagues of", "colleague of", "collaborated with",
    "collaborates with", "worked alongside", "connected to", "connections of", "studied with",
    "in common with",
];

const REASONING_CUES: &[&str] = &[
    "worked together", "work together", "same company", "same university", "same project",
    "studied together", "know each other", "shared history",
];

const SHARED_SKILL_CUES: &[&str] = &[
    "same skills", "same skill", "same skillset", "same skill set", "similar skills", "shared skills",
    "skills in common", "overlapping skills", "same stack", "same tech stack",
];

const LINK_CUES: &[(&str, AffiliationKind)] = &[
    ("company", AffiliationKind::Company),
    ("companies", AffiliationKind::Company),
    ("employer", AffiliationKind::Company),
    ("employers", AffiliationKind::Company),
    ("worked at", AffiliationKind::Company),
    ("university", AffiliationKind::University),
    ("universities", AffiliationKind::University),
    ("college", AffiliationKind::University),
    ("school", AffiliationKind::University),
    ("studied", AffiliationKind::University),
    ("alumni", AffiliationKind::University),
    ("classmates", AffiliationKind::University),
    ("project", AffiliationKind::Project),
    ("projects", AffiliationKind::Project),
    ("teammates", AffiliationKind::Project),
];

const TEMPORAL_CUES: &[&str] = &[
    "become available", "becomes available", "becoming available", "available after",
    "available by", "free up", "frees up", "freed up", "roll off", "rolls off", "rolling off",
    "end date", "end dates", "when will", "when is", "when does", "next week", "next month",
    "next quarter", "available now", "available today", "upcoming",
];

const ASSIGNMENT_CUES: &[&str] = &[
    "current assignments", "current assignment", "current allocations", "currently assigned",
    "assignments", "who is working on what", "staffing overview",
];

const PROJECT_WORDS: &[&str] = &["project", "projects"];

const PROJECT_END_CUES: &[&str] = &[
    "ending", "ends", "end", "finishing", "finishes", "finish", "wrapping up", "wrap up", "due",
    "closing", "completing", "deadline", "deadlines", "end date", "end dates",
];

const PROJECT_STATUS_CUES: &[(&str, ProjectStatus)] = &[
    ("active", ProjectStatus::Active),
    ("ongoing", ProjectStatus::Active),
    ("running", ProjectStatus::Active),
    ("proposed", ProjectStatus::Proposed),
    ("planned", ProjectStatus::Proposed),
    ("pipeline", ProjectStatus::Proposed),
    ("historical", ProjectStatus::Historical),
    ("past", ProjectStatus::Historical),
    ("completed", ProjectStatus::Historical),
    ("finished", ProjectStatus::Historical),
    ("closed", ProjectStatus::Historical),
];

const CERTIFICATION_WORDS: &[&str] = &[
    "certification", "certifications", "certified", "certificate", "certificates", "cert", "certs",
];

/// Words before a certification word that do not name one
const CERTIFICATION_FILLER: &[&str] = &[
    "a", "an", "the", "any", "some", "with", "hold", "holds", "have", "has", "own", "valid", "active", "our",
    "how", "many", "number", "of",
];

const RELATIVE_CUES: &[(&str, i64)] = &[
    ("right now", 0),
    ("now", 0),
    ("today", 0),
    ("tomorrow", 1),
    ("this week", 7),
    ("next week", 7),
    ("this month", 30),
    ("next month", 30),
    ("next quarter", 90),
];

const SCENARIO_CUES: &[&str] = &[
    "what if", "what happens if", "what would happen if", "suppose", "supposing", "simulate",
    "simulation", "hypothetically", "imagine", "if we",
];

const GAP_CUES: &[&str] = &["skills gap", "skill gap", "skill gaps", "gap analysis", "missing skills", "skill shortage"];

const RISK_CUES: &[&str] = &["risk", "risks", "single point of failure", "single points of failure", "bus factor"];

const TEAM_CUES: &[&str] = &[
    "optimal team", "best team", "ideal team", "strongest team", "team composition", "compose a team",
    "assemble a team", "build a team", "put together a team", "recommended team", "recommend a team",
];

const REMOVE_CUES: &[&str] = &[
    "remove", "removed", "take off", "taken off", "pull", "pulled", "leaves", "leave", "quits",
    "quit", "drop", "dropped", "unassign", "rolls off", "roll off",
];

const CHANGE_CUES: &[&str] = &[
    "change", "changes", "changed", "reduce", "reduced", "reduces", "increase", "increased",
    "increases", "cut", "cuts", "lower", "lowered", "raise", "raised", "drops to", "goes to",
    "moves to", "scale", "scaled",
];

const ADD_CUES: &[&str] = &[
    "assign", "assigned", "add", "added", "adds", "join", "joins", "joined", "put", "staffed",
    "allocate", "allocated", "move", "moved", "works on", "work on", "starts on", "is on",
];

const RELEASE_CUES: &[&str] = &[
    "ends", "ended", "end", "finishes", "finished", "cancelled", "canceled", "cancel",
    "wraps up", "closes", "closed", "completes", "completed", "stops", "stopped", "is over",
    "released",
];

const STAFF_CUES: &[&str] = &[
    "hire", "hires", "hired", "hiring", "staff", "new project", "win", "wins", "won", "need",
    "needs", "needed", "start", "starts", "kick off", "kicks off", "take on", "land", "lands",
    "sign", "signs", "bring on", "onboard", "require", "requires",
];

const HALF_TIME_CUES: &[&str] = &["half time", "half-time", "halftime", "part time", "part-time"];
const FULL_TIME_CUES: &[&str] = &["full time", "full-time", "fulltime"];

const SENIORITY_WORDS: &[&str] = &["junior", "jr", "mid", "senior", "sr", "lead", "principal"];

/// Skill names that are also everyday words; recognized only next to a
/// staffing word
const AMBIGUOUS_SKILLS: &[&str] = &["go"];
const SKILL_CONTEXT: &[&str] = &["in", "with", "and", "or", "know", "knows", "using", "skilled"];

fn iso_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("static regex"))
}

fn bound_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(after|since|from|before|until|by)\s+(\d{4}-\d{2}-\d{2})\b").expect("static regex"))
}

fn relative_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bin\s+(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|twelve)\s+(day|week|month)s?\b")
            .expect("static regex")
    })
}

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)\s*(?:%|percent\b)").expect("static regex"))
}

fn group_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:by|per|for each|across)\s+(location|locations|city|cities|seniority|level|levels)\b").expect("static regex")
    })
}

/// Lowercase and split on whitespace and punctuation. Trailing dots,
/// surrounding quotes and a possessive `'s` are stripped; `#`, `+` and
/// inner dots stay so that "c#", "c++" and "node.js" survive.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter_map(|raw| {
            let token = raw.trim_end_matches('.').trim_matches(QUOTES);
            let token = token
                .strip_suffix("'s")
                .or_else(|| token.strip_suffix("’s"))
                .unwrap_or(token)
                .trim_matches(QUOTES);
            (!token.is_empty()).then(|| token.to_string())
        })
        .collect()
}

fn phrase(text: &str) -> String {
    tokenize(text).join(" ")
}

fn number_word(token: &str) -> Option<usize> {
    if let Ok(n) = token.parse::<usize>() {
        return Some(n);
    }
    let n = match token {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}

/// Entity names known to the graph, keyed by tokenized phrase
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    skills: HashMap<String, SkillId>,
    /// Name or id phrase to candidate id
    people: HashMap<String, String>,
    /// City phrase to display city
    locations: HashMap<String, String>,
    /// Name or id phrase to project id
    projects: HashMap<String, String>,
}

impl Vocabulary {
    /// Snapshot the entity names of a view, plus the skill synonym table
    pub fn from_view(view: &dyn GraphView) -> Self {
        let mut vocabulary = Self::default();
        for (alias, skill) in synonym_table() {
            vocabulary.add_skill(alias, &skill);
            vocabulary.add_skill(skill.as_str(), &skill);
        }
        for (skill, display) in view.skills() {
            vocabulary.add_skill(&display, &skill);
            for alias in skill.aliases() {
                vocabulary.add_skill(alias, &skill);
            }
        }
        for candidate in view.candidates() {
            add_key(&mut vocabulary.people, &candidate.name, &candidate.id);
            add_key(&mut vocabulary.people, &candidate.id, &candidate.id);
            if let Some(city) = candidate.location.as_deref().and_then(normalize_location) {
                vocabulary.locations.insert(phrase(&city), city);
            }
        }
        for project in view.projects() {
            add_key(&mut vocabulary.projects, &project.name, &project.id);
            add_key(&mut vocabulary.projects, &project.id, &project.id);
        }
        vocabulary
    }

    fn add_skill(&mut self, raw: &str, skill: &SkillId) {
        let key = phrase(raw);
        if key.chars().count() < 2 && !key.contains(&['#', '+'][..]) {
            return;
        }
        self.skills.entry(key).or_insert_with(|| skill.clone());
    }

    pub fn len(&self) -> usize {
        self.skills.len() + self.people.len() + self.locations.len() + self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn skill_at(&self, tokens: &[String], start: usize, len: usize, phrase: &str) -> Option<SkillId> {
        let skill = self.skills.get(phrase)?;
        if len == 1 && AMBIGUOUS_SKILLS.contains(&phrase) {
            let before = start.checked_sub(1).and_then(|i| tokens.get(i));
            let after = tokens.get(start + 1);
            let in_context = before
                .into_iter()
                .chain(after)
                .any(|t| SKILL_CONTEXT.contains(&t.as_str()) || ENTITY_WORDS.contains(&t.as_str()));
            if !in_context {
                return None;
            }
        }
        Some(skill.clone())
    }
}

/// Ids that are too short or purely numeric would collide with counts
fn add_key(map: &mut HashMap<String, String>, raw: &str, id: &str) {
    let key = phrase(raw);
    if key.chars().count() < 3 || key.chars().all(|c| c.is_ascii_digit()) {
        return;
    }
    map.entry(key).or_insert_with(|| id.to_string());
}

#[derive(Debug, Clone, PartialEq)]
enum Mention {
    Skill(SkillId),
    Person(String),
    Location(String),
    Project(String),
}

struct Question {
    tokens: Vec<String>,
    /// Tokens joined with single spaces and padded, for cue lookups
    spaced: String,
    lowered: String,
    mentions: Vec<Mention>,
}

impl Question {
    fn new(text: &str, vocabulary: &Vocabulary) -> Self {
        let tokens = tokenize(text);
        let spaced = format!(" {} ", tokens.join(" "));
        let mentions = scan(&tokens, vocabulary);
        Self {
            tokens,
            spaced,
            lowered: text.to_lowercase(),
            mentions,
        }
    }

    fn has(&self, cue: &str) -> bool {
        self.spaced.contains(&format!(" {} ", cue))
    }

    fn has_any(&self, cues: &[&str]) -> bool {
        cues.iter().any(|cue| self.has(cue))
    }

    fn allocation(&self) -> Option<f64> {
        if let Some(caps) = percent_regex().captures(&self.lowered) {
            if let Ok(percent) = caps[1].parse::<f64>() {
                if percent > 0.0 {
                    return Some((percent / 100.0).min(1.0));
                }
            }
        }
        if self.has_any(HALF_TIME_CUES) {
            Some(0.5)
        } else if self.has_any(FULL_TIME_CUES) {
            Some(1.0)
        } else {
            None
        }
    }

    /// A number up to three tokens before a staffing word
    fn team_size(&self) -> Option<usize> {
        for (j, token) in self.tokens.iter().enumerate() {
            if !ENTITY_WORDS.contains(&token.as_str()) {
                continue;
            }
            for i in (j.saturating_sub(3)..j).rev() {
                if let Some(n) = number_word(&self.tokens[i]) {
                    return Some(n);
                }
            }
        }
        None
    }
}

/// Greedy longest-phrase scan; people and projects win over skills and
/// locations at the same length
fn scan(tokens: &[String], vocabulary: &Vocabulary) -> Vec<Mention> {
    let mut mentions = Vec::new();
    let mut i = 0;
    'tokens: while i < tokens.len() {
        for len in (1..=MAX_PHRASE.min(tokens.len() - i)).rev() {
            let phrase = tokens[i..i + len].join(" ");
            let found = vocabulary
                .people
                .get(&phrase)
                .map(|id| Mention::Person(id.clone()))
                .or_else(|| vocabulary.projects.get(&phrase).map(|id| Mention::Project(id.clone())))
                .or_else(|| vocabulary.skill_at(tokens, i, len, &phrase).map(Mention::Skill))
                .or_else(|| vocabulary.locations.get(&phrase).map(|city| Mention::Location(city.clone())));
            if let Some(mention) = found {
                mentions.push(mention);
                i += len;
                continue 'tokens;
            }
        }
        i += 1;
    }
    mentions
}

/// Everything the rules found in one question
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub filters: QueryFilters,
    pub measure: Option<Measure>,
    pub target: CountTarget,
    pub link: Option<Link>,
    pub window: Option<TimeWindow>,
    pub focus: TemporalFocus,
    pub scenario: Option<ScenarioPlan>,
    /// Intent rules that fired, highest precedence first
    pub fired: Vec<Intent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Exactly one rule fired
    Confident(QueryPlan),
    /// Several rules fired; `best` is the highest-precedence one
    Ambiguous { best: QueryPlan, fired: Vec<Intent> },
    Unsure,
}

impl Reading {
    /// Build a plan for `intent` from what was read, if the reading carries
    /// what that intent needs
    pub fn plan_for(&self, intent: Intent, source: PlanSource) -> Option<QueryPlan> {
        let plan = QueryPlan::new(intent, self.filters.clone(), source);
        match intent {
            Intent::Counting => Some(plan.with_target(self.target.clone())),
            Intent::Filtering => Some(plan),
            Intent::Aggregation => self.measure.map(|measure| plan.with_measure(measure)),
            Intent::Reasoning => Some(plan.with_link(self.link)),
            Intent::Temporal => {
                let window = self.window.unwrap_or_default();
                let mut plan = plan.with_window(window).with_focus(self.focus);
                // "available after X" names the cutoff, not a lower bound
                if window.until.is_some() && plan.filters.after == window.until {
                    plan.filters.after = None;
                }
                Some(plan)
            }
            Intent::Scenario => self.scenario.clone().map(|scenario| plan.with_scenario(scenario)),
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self.fired.as_slice() {
            [] => Verdict::Unsure,
            [only] => self
                .plan_for(*only, PlanSource::Heuristic)
                .map_or(Verdict::Unsure, Verdict::Confident),
            [best, ..] => match self.plan_for(*best, PlanSource::Heuristic) {
                Some(plan) => Verdict::Ambiguous {
                    best: plan,
                    fired: self.fired.clone(),
                },
                None => Verdict::Unsure,
            },
        }
    }
}

/// Applies the keyword rules against a vocabulary snapshot
#[derive(Debug, Clone)]
pub struct QuestionReader {
    vocabulary: Vocabulary,
    default_team_size: usize,
}

impl QuestionReader {
    pub fn new(vocabulary: Vocabulary, default_team_size: usize) -> Self {
        Self {
            vocabulary,
            default_team_size,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn read(&self, text: &str) -> Reading {
        let question = Question::new(text, &self.vocabulary);
        let mut filters = filters_of(&question);
        let measure = measure_of(&question);
        let window = window_of(&question);
        let focus = focus_of(&question, &filters);
        let target = target_of(&question);
        // "aws certification" names a certification, not a skill to filter on
        if let CountTarget::CertificationHolders { certification: Some(term) } = &target {
            let named = SkillId::normalize(term);
            filters.skills.retain(|skill| Some(skill) != named.as_ref());
        }
        let scenario = self.scenario_of(&question, &filters);

        let mut fired = Vec::new();
        if scenario.is_some() {
            fired.push(Intent::Scenario);
        }
        if question.has_any(TEMPORAL_CUES)
            || (window.is_some() && question.has_any(AVAILABILITY_CUES))
            || focus != TemporalFocus::Availability
        {
            fired.push(Intent::Temporal);
        }
        if (question.has_any(REASONING_PERSON_CUES) && filters.person.is_some())
            || question.has_any(REASONING_CUES)
            || question.has_any(SHARED_SKILL_CUES)
        {
            fired.push(Intent::Reasoning);
        }
        if measure.is_some() {
            fired.push(Intent::Aggregation);
        }
        let mentions_entities = question.has_any(ENTITY_WORDS) || !filters.is_unrestricted();
        if question.has_any(COUNT_CUES) && (mentions_entities || target != CountTarget::Candidates) {
            fired.push(Intent::Counting);
        }
        if fired.is_empty()
            && question.has_any(LIST_CUES)
            && (mentions_entities || filters.person.is_some() || filters.project.is_some())
        {
            fired.push(Intent::Filtering);
        }

        let link = if question.has_any(SHARED_SKILL_CUES) {
            Some(Link::Skill)
        } else {
            LINK_CUES
                .iter()
                .find(|(cue, _)| question.has(cue))
                .map(|(_, kind)| Link::Affiliation(*kind))
        };
        Reading {
            filters,
            measure,
            target,
            link,
            window,
            focus,
            scenario,
            fired,
        }
    }

    fn scenario_of(&self, question: &Question, filters: &QueryFilters) -> Option<ScenarioPlan> {
        if question.has_any(SCENARIO_CUES) {
            if let Some(change) = self.change_of(question, filters) {
                return Some(ScenarioPlan::Simulate { changes: vec![change] });
            }
        }
        if question.has_any(GAP_CUES) {
            Some(ScenarioPlan::SkillGap)
        } else if question.has_any(RISK_CUES) {
            Some(ScenarioPlan::Risk)
        } else if question.has_any(TEAM_CUES) {
            Some(ScenarioPlan::TeamComposition)
        } else {
            None
        }
    }

    fn change_of(&self, question: &Question, filters: &QueryFilters) -> Option<ScenarioChange> {
        let allocation = question.allocation();
        match (&filters.person, &filters.project) {
            (Some(person), Some(project)) => {
                if question.has_any(REMOVE_CUES) {
                    Some(ScenarioChange::RemoveAssignment {
                        candidate: person.clone(),
                        project: Some(project.clone()),
                    })
                } else if let (true, Some(allocation)) = (question.has_any(CHANGE_CUES), allocation) {
                    Some(ScenarioChange::ChangeAllocation {
                        candidate: person.clone(),
                        project: project.clone(),
                        allocation,
                    })
                } else if question.has_any(ADD_CUES) || allocation.is_some() {
                    Some(ScenarioChange::AddAssignment {
                        candidate: person.clone(),
                        project: project.clone(),
                        allocation: allocation.unwrap_or(1.0),
                    })
                } else {
                    None
                }
            }
            (Some(person), None) => question.has_any(REMOVE_CUES).then(|| ScenarioChange::RemoveAssignment {
                candidate: person.clone(),
                project: None,
            }),
            (None, Some(project)) if question.has_any(RELEASE_CUES) => Some(ScenarioChange::ReleaseProject {
                project: project.clone(),
            }),
            _ => {
                if !question.has_any(STAFF_CUES) {
                    return None;
                }
                let team_size = question.team_size();
                if filters.skills.is_empty() && team_size.is_none() {
                    return None;
                }
                let skills: Vec<&str> = filters.skills.iter().map(SkillId::as_str).collect();
                let mut requirement = Requirement::new(&skills, team_size.unwrap_or(self.default_team_size));
                if let Some(location) = &filters.location {
                    requirement = requirement.with_location(location);
                }
                if let Some(allocation) = allocation {
                    requirement = requirement.with_allocation(allocation);
                }
                Some(ScenarioChange::StaffRequirement { requirement })
            }
        }
    }
}

fn filters_of(question: &Question) -> QueryFilters {
    let mut filters = QueryFilters::default();
    for mention in &question.mentions {
        match mention {
            Mention::Skill(skill) => {
                if !filters.skills.contains(skill) {
                    filters.skills.push(skill.clone());
                }
            }
            Mention::Person(id) => {
                filters.person.get_or_insert_with(|| id.clone());
            }
            Mention::Location(city) => {
                filters.location.get_or_insert_with(|| city.clone());
            }
            Mention::Project(id) => {
                filters.project.get_or_insert_with(|| id.clone());
            }
        }
    }
    filters.seniority = question
        .tokens
        .iter()
        .filter(|t| SENIORITY_WORDS.contains(&t.as_str()))
        .find_map(|t| t.parse::<Seniority>().ok());
    filters.available_only = question.has_any(AVAILABILITY_CUES);

    for caps in bound_regex().captures_iter(&question.lowered) {
        let Ok(date) = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d") else {
            continue;
        };
        match &caps[1] {
            "after" | "since" | "from" => {
                filters.after.get_or_insert(date);
            }
            _ => {
                filters.before.get_or_insert(date);
            }
        }
    }
    filters
}

/// Listings asked about in time terms. Scenario questions and questions
/// about people keep the availability reading.
fn focus_of(question: &Question, filters: &QueryFilters) -> TemporalFocus {
    if question.has_any(SCENARIO_CUES) {
        TemporalFocus::Availability
    } else if question.has_any(ASSIGNMENT_CUES) {
        TemporalFocus::Assignments
    } else if question.has_any(PROJECT_WORDS)
        && question.has_any(PROJECT_END_CUES)
        && !question.has_any(ENTITY_WORDS)
        && filters.person.is_none()
    {
        TemporalFocus::ProjectEnds
    } else {
        TemporalFocus::Availability
    }
}

fn target_of(question: &Question) -> CountTarget {
    if question.has_any(CERTIFICATION_WORDS) {
        return CountTarget::CertificationHolders {
            certification: certification_of(question),
        };
    }
    if question.has_any(PROJECT_WORDS) && !question.has_any(ENTITY_WORDS) {
        let status = PROJECT_STATUS_CUES
            .iter()
            .find(|(cue, _)| question.has(cue))
            .map(|(_, status)| *status);
        return CountTarget::Projects { status };
    }
    CountTarget::Candidates
}

/// "aws certification", "certified in aws"
fn certification_of(question: &Question) -> Option<String> {
    let tokens = &question.tokens;
    let at = tokens.iter().position(|t| CERTIFICATION_WORDS.contains(&t.as_str()))?;
    if tokens[at] == "certified" {
        if let (Some(joint), Some(name)) = (tokens.get(at + 1), tokens.get(at + 2)) {
            if matches!(joint.as_str(), "in" | "on" | "for") {
                return Some(name.clone());
            }
        }
    }
    let before = tokens.get(at.checked_sub(1)?)?;
    (!CERTIFICATION_FILLER.contains(&before.as_str())
        && !ENTITY_WORDS.contains(&before.as_str())
        && !COUNT_CUES.contains(&before.as_str()))
    .then(|| before.clone())
}

fn measure_of(question: &Question) -> Option<Measure> {
    let function = FUNCTION_CUES
        .iter()
        .find(|(cue, _)| question.has(cue))
        .map(|(_, function)| *function);

    if let Some(function) = function {
        let field = FIELD_CUES
            .iter()
            .find(|(cue, _)| question.has(cue))
            .map(|(_, field)| *field)
            .or_else(|| question.has_any(SKILL_COUNT_CUES).then_some(NumericField::SkillCount))
            .or_else(|| question.has_any(&["cheapest", "most expensive"]).then_some(NumericField::HourlyRate));
        if let Some(field) = field {
            return Some(Measure::Statistic(Aggregation {
                function,
                field,
                group_by: group_of(question),
            }));
        }
    }

    (question.has_any(CAPACITY_CUES) && !question.has_any(COUNT_CUES)).then_some(Measure::Capacity)
}

fn group_of(question: &Question) -> Option<GroupKey> {
    let caps = group_regex().captures(&question.lowered)?;
    let key = match &caps[1] {
        "locations" => "location",
        "cities" => "city",
        "levels" => "level",
        other => other,
    };
    key.parse().ok()
}

fn window_of(question: &Question) -> Option<TimeWindow> {
    let until = iso_date_regex()
        .captures(&question.lowered)
        .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok());
    let days = relative_days(question);
    (until.is_some() || days.is_some()).then_some(TimeWindow { until, days })
}

fn relative_days(question: &Question) -> Option<i64> {
    if let Some(caps) = relative_regex().captures(&question.lowered) {
        let count = number_word(&caps[1])? as i64;
        let unit = match &caps[2] {
            "day" => 1,
            "week" => 7,
            _ => 30,
        };
        return Some(count * unit);
    }
    RELATIVE_CUES
        .iter()
        .find(|(cue, _)| question.has(cue))
        .map(|(_, days)| *days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CandidateSpec, GraphStore, ProjectSpec, ProjectStatus};

    fn reader() -> QuestionReader {
        let mut store = GraphStore::new();
        let jacob = store
            .upsert_candidate(&CandidateSpec {
                id: "cand-jy".to_string(),
                name: "Jacob Young".to_string(),
                location: Some("Berlin, Germany".to_string()),
                ..Default::default()
            })
            .unwrap();
        store.add_candidate_skill(jacob, "Python", None).unwrap();
        store.add_candidate_skill(jacob, "Go", None).unwrap();
        store
            .upsert_candidate(&CandidateSpec {
                id: "cand-am".to_string(),
                name: "Alice Moore".to_string(),
                location: Some("New York".to_string()),
                ..Default::default()
            })
            .unwrap();
        store
            .upsert_project(&ProjectSpec {
                id: "apollo".to_string(),
                name: "Apollo Platform".to_string(),
                required_skills: vec!["Python".to_string()],
                start_date: None,
                end_date: None,
                budget: None,
                status: ProjectStatus::Active,
            })
            .unwrap();
        QuestionReader::new(Vocabulary::from_view(&store), 5)
    }

    fn confident(reader: &QuestionReader, question: &str) -> QueryPlan {
        match reader.read(question).verdict() {
            Verdict::Confident(plan) => plan,
            other => panic!("expected a confident plan for {:?}, got {:?}", question, other),
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Who knows C#, C++ and Node.js?"), vec!["who", "knows", "c#", "c++", "and", "node.js"]);
        assert_eq!(tokenize("Jacob Young's projects."), vec!["jacob", "young", "projects"]);
        assert_eq!(tokenize("'Apollo' / CI/CD"), vec!["apollo", "ci", "cd"]);
    }

    #[test]
    fn test_counting_available_python() {
        let plan = confident(&reader(), "How many Python developers are available?");
        assert_eq!(plan.intent, Intent::Counting);
        assert_eq!(plan.filters.skills, crate::skills::normalize_all(&["python"]));
        assert!(plan.filters.available_only);
        assert_eq!(plan.source, PlanSource::Heuristic);
    }

    #[test]
    fn test_average_rate_of_senior_python() {
        let plan = confident(&reader(), "What is the average hourly rate of Senior Python Developers?");
        assert_eq!(plan.intent, Intent::Aggregation);
        assert_eq!(
            plan.measure,
            Some(Measure::Statistic(Aggregation {
                function: AggregateFunction::Avg,
                field: NumericField::HourlyRate,
                group_by: None,
            }))
        );
        assert_eq!(plan.filters.seniority, Some(Seniority::Senior));
        assert_eq!(plan.filters.skills.len(), 1);
    }

    #[test]
    fn test_reasoning_needs_person() {
        let reader = reader();
        let plan = confident(&reader, "Who has worked with Jacob Young?");
        assert_eq!(plan.intent, Intent::Reasoning);
        assert_eq!(plan.filters.person.as_deref(), Some("cand-jy"));
        assert_eq!(plan.link, None);

        let plan = confident(&reader, "Which candidates studied at the same university?");
        assert_eq!(plan.intent, Intent::Reasoning);
        assert_eq!(plan.link, Some(Link::Affiliation(AffiliationKind::University)));

        // an unknown name does not make a reasoning question
        assert_ne!(reader.read("Who has worked with Zed Unknown?").fired.first(), Some(&Intent::Reasoning));
    }

    #[test]
    fn test_grouped_aggregation_and_capacity() {
        let reader = reader();
        let plan = confident(&reader, "Show the max years of experience per city");
        assert_eq!(
            plan.measure,
            Some(Measure::Statistic(Aggregation {
                function: AggregateFunction::Max,
                field: NumericField::YearsExperience,
                group_by: Some(GroupKey::Location),
            }))
        );
        let plan = confident(&reader, "What does our bench capacity look like?");
        assert_eq!(plan.measure, Some(Measure::Capacity));
    }

    #[test]
    fn test_filtering_is_residual() {
        let reader = reader();
        let plan = confident(&reader, "List Go developers in Berlin");
        assert_eq!(plan.intent, Intent::Filtering);
        assert_eq!(plan.filters.location.as_deref(), Some("Berlin"));
        assert_eq!(plan.filters.skills, crate::skills::normalize_all(&["go"]));

        let plan = confident(&reader, "What skills does Alice Moore have?");
        assert_eq!(plan.intent, Intent::Filtering);
        assert_eq!(plan.filters.person.as_deref(), Some("cand-am"));

        // "go" without a staffing word next to it is just a verb
        assert!(reader.read("Where did they go to lunch").filters.skills.is_empty());
    }

    #[test]
    fn test_temporal_windows() {
        let reader = reader();
        let plan = confident(&reader, "Who will become available next month?");
        assert_eq!(plan.intent, Intent::Temporal);
        assert_eq!(plan.window, Some(TimeWindow { until: None, days: Some(30) }));

        let plan = confident(&reader, "Which engineers are available after 2026-05-01?");
        assert_eq!(plan.intent, Intent::Temporal);
        let date = NaiveDate::from_ymd_opt(2026, 5, 1);
        assert_eq!(plan.window.and_then(|w| w.until), date);
        assert_eq!(plan.filters.after, None);

        let plan = confident(&reader, "Who is free in 2 weeks?");
        assert_eq!(plan.window.and_then(|w| w.days), Some(14));
    }

    #[test]
    fn test_scenario_changes() {
        let reader = reader();
        let plan = confident(&reader, "What if Alice Moore joins Apollo Platform at 50%?");
        assert_eq!(
            plan.scenario,
            Some(ScenarioPlan::Simulate {
                changes: vec![ScenarioChange::AddAssignment {
                    candidate: "cand-am".to_string(),
                    project: "apollo".to_string(),
                    allocation: 0.5,
                }]
            })
        );

        let plan = confident(&reader, "What happens if Jacob Young leaves?");
        assert!(matches!(
            plan.scenario,
            Some(ScenarioPlan::Simulate { ref changes })
                if changes == &vec![ScenarioChange::RemoveAssignment { candidate: "cand-jy".to_string(), project: None }]
        ));

        let plan = confident(&reader, "Suppose Apollo Platform is cancelled");
        assert!(matches!(
            plan.scenario,
            Some(ScenarioPlan::Simulate { ref changes })
                if matches!(changes[0], ScenarioChange::ReleaseProject { ref project } if project == "apollo")
        ));

        let plan = confident(&reader, "What if we win a project that needs three Python developers in Berlin?");
        match plan.scenario {
            Some(ScenarioPlan::Simulate { changes }) => match &changes[0] {
                ScenarioChange::StaffRequirement { requirement } => {
                    assert_eq!(requirement.team_size, 3);
                    assert_eq!(requirement.location.as_deref(), Some("Berlin"));
                }
                other => panic!("unexpected change {:?}", other),
            },
            other => panic!("unexpected scenario {:?}", other),
        }

        assert_eq!(confident(&reader, "Run a skills gap analysis").scenario, Some(ScenarioPlan::SkillGap));
        assert_eq!(confident(&reader, "Where is our bus factor lowest?").scenario, Some(ScenarioPlan::Risk));
    }

    #[test]
    fn test_counting_other_entities() {
        let reader = reader();
        let plan = confident(&reader, "How many active projects are there?");
        assert_eq!(plan.intent, Intent::Counting);
        assert_eq!(plan.target, CountTarget::Projects { status: Some(ProjectStatus::Active) });

        let plan = confident(&reader, "How many people hold a Python certification?");
        assert_eq!(
            plan.target,
            CountTarget::CertificationHolders { certification: Some("python".to_string()) }
        );
        // the certification name is not also a skill filter
        assert!(plan.filters.skills.is_empty());

        let plan = confident(&reader, "How many developers are certified in kubernetes?");
        assert_eq!(
            plan.target,
            CountTarget::CertificationHolders { certification: Some("kubernetes".to_string()) }
        );
        let plan = confident(&reader, "How many certified engineers do we have?");
        assert_eq!(plan.target, CountTarget::CertificationHolders { certification: None });

        assert_eq!(confident(&reader, "How many Python developers are there?").target, CountTarget::Candidates);
    }

    #[test]
    fn test_same_skills_reads_as_reasoning() {
        let plan = confident(&reader(), "Who has the same skills as Jacob Young?");
        assert_eq!(plan.intent, Intent::Reasoning);
        assert_eq!(plan.link, Some(Link::Skill));
        assert_eq!(plan.filters.person.as_deref(), Some("cand-jy"));
    }

    #[test]
    fn test_assignment_and_project_end_listings() {
        let reader = reader();
        let plan = confident(&reader, "Show current assignments");
        assert_eq!(plan.intent, Intent::Temporal);
        assert_eq!(plan.focus, TemporalFocus::Assignments);

        let plan = confident(&reader, "Which projects are ending before 2026-12-31?");
        assert_eq!(plan.focus, TemporalFocus::ProjectEnds);
        assert_eq!(plan.window.and_then(|w| w.until), NaiveDate::from_ymd_opt(2026, 12, 31));

        // people questions keep the availability reading
        let plan = confident(&reader, "Who will become available next month?");
        assert_eq!(plan.focus, TemporalFocus::Availability);
    }

    #[test]
    fn test_team_composition_scenario() {
        let plan = confident(&reader(), "What is the optimal team for a Python project?");
        assert_eq!(plan.intent, Intent::Scenario);
        assert_eq!(plan.scenario, Some(ScenarioPlan::TeamComposition));
        assert_eq!(plan.filters.skills, crate::skills::normalize_all(&["python"]));
    }

    #[test]
    fn test_ambiguous_and_unsure() {
        let reader = reader();
        match reader.read("How many developers become available next month?").verdict() {
            Verdict::Ambiguous { best, fired } => {
                assert_eq!(best.intent, Intent::Temporal);
                assert_eq!(fired, vec![Intent::Temporal, Intent::Counting]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(reader.read("Tell me about the weather").verdict(), Verdict::Unsure);
        // a scenario cue without a recognizable change is not enough
        assert_eq!(reader.read("What if things go wrong?").verdict(), Verdict::Unsure);
    }
}
