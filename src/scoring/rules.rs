//! Rule-based scoring channel.
//!
//! Four independently capped sub-scores (skills 40, experience 25,
//! location 20, education 15). A blocked organization or role type forces
//! the score to zero and replaces the rationale.

use crate::model::{Policy, Posting, Profile};

pub const SKILL_POINTS: f64 = 8.0;
pub const SKILL_CAP: f64 = 40.0;
const RATIONALE_SKILLS: usize = 5;

/// Result of the rule channel for one posting.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub value: f64,
    pub rationale: String,
    pub blocked: bool,
}

pub fn score(posting: &Posting, profile: &Profile, policy: &Policy) -> RuleScore {
    if let Some(reason) = block_reason(posting, policy) {
        return RuleScore {
            value: 0.0,
            rationale: reason,
            blocked: true,
        };
    }

    let mut reasons = Vec::with_capacity(4);
    let mut total = 0.0;

    let matched = matched_skills(posting, profile);
    total += (matched.len() as f64 * SKILL_POINTS).min(SKILL_CAP);
    if !matched.is_empty() {
        let shown: Vec<&str> = matched.iter().take(RATIONALE_SKILLS).map(String::as_str).collect();
        reasons.push(format!("Skills match: {}", shown.join(", ")));
    }

    let (points, reason) = experience_fit(posting, profile);
    total += points;
    reasons.push(reason);

    let (points, reason) = location_fit(posting, profile);
    total += points;
    reasons.push(reason);

    let (points, reason) = education_fit(posting, profile);
    total += points;
    if let Some(reason) = reason {
        reasons.push(reason);
    }

    RuleScore {
        value: total,
        rationale: reasons.join(" | "),
        blocked: false,
    }
}

fn block_reason(posting: &Posting, policy: &Policy) -> Option<String> {
    if policy.blocked_company(&posting.organization).is_some() {
        return Some("BLOCKED: Company in blocked list".to_string());
    }
    policy
        .blocked_role(&posting.title)
        .map(|role| format!("BLOCKED: Role type '{}' in blocked list", role.to_lowercase()))
}

/// Distinct profile skills (lowercased) found in the title, description, or
/// any requirement, in profile order.
pub fn matched_skills(posting: &Posting, profile: &Profile) -> Vec<String> {
    let title = posting.title.to_lowercase();
    let description = posting.description.to_lowercase();
    let requirements: Vec<String> = posting
        .requirements
        .iter()
        .map(|r| r.to_lowercase())
        .collect();

    let mut matched: Vec<String> = Vec::new();
    for skill in &profile.skills {
        let skill = skill.trim().to_lowercase();
        if skill.is_empty() || matched.contains(&skill) {
            continue;
        }
        let found = title.contains(&skill)
            || description.contains(&skill)
            || requirements.iter().any(|r| r.contains(&skill));
        if found {
            matched.push(skill);
        }
    }
    matched
}

fn experience_fit(posting: &Posting, profile: &Profile) -> (f64, String) {
    let required = posting.experience_required;
    if required == 0 {
        return (25.0, "Entry-level position (no experience required)".to_string());
    }

    let months = profile.experience_months();
    let required_months = required.saturating_mul(12);
    if months >= required_months {
        (25.0, format!("Experience meets requirement ({required} years)"))
    } else if months.saturating_mul(2) >= required_months {
        (15.0, format!("Some relevant experience (need {required} years)"))
    } else {
        (5.0, "Limited experience for this role".to_string())
    }
}

fn location_fit(posting: &Posting, profile: &Profile) -> (f64, String) {
    let location = posting.location.to_lowercase();
    let preferred_match = profile
        .constraints
        .preferred_locations
        .iter()
        .map(|l| l.trim().to_lowercase())
        .any(|l| !l.is_empty() && location.contains(&l));

    if posting.remote && profile.constraints.open_to_remote {
        (20.0, "Remote position matches preference".to_string())
    } else if preferred_match {
        (20.0, format!("Location matches: {location}"))
    } else if posting.remote {
        (15.0, "Remote option available".to_string())
    } else {
        (5.0, format!("Location: {location}"))
    }
}

fn education_fit(posting: &Posting, profile: &Profile) -> (f64, Option<String>) {
    let description = posting.description.to_lowercase();
    let relevant = profile
        .education
        .iter()
        .flat_map(|e| [e.field.as_str(), e.degree.as_str()])
        .map(|kw| kw.trim().to_lowercase())
        .any(|kw| !kw.is_empty() && description.contains(&kw));

    if relevant {
        (15.0, Some("Education background relevant".to_string()))
    } else {
        (5.0, None)
    }
}
