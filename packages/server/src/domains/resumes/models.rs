//! Resume model and its scoring projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Number of most recent roles included in the scoring projection.
const MAX_ROLES_IN_SUMMARY: usize = 3;

/// A stored resume. Read-only input to the matching pipelines.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Resume {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub user_id: Uuid,

    /// Display name of the resume record itself.
    pub name: String,
    #[builder(default, setter(strip_option))]
    pub first_name: Option<String>,
    #[builder(default, setter(strip_option))]
    pub last_name: Option<String>,
    #[builder(default, setter(strip_option))]
    pub email: Option<String>,
    #[builder(default, setter(strip_option))]
    pub location: Option<String>,
    #[builder(default, setter(strip_option))]
    pub professional_summary: Option<String>,
    #[builder(default, setter(strip_option))]
    pub target_role: Option<String>,

    // JSON document columns
    #[builder(default = json!([]))]
    pub work_experience: Value,
    #[builder(default = json!([]))]
    pub education: Value,
    #[builder(default = json!([]))]
    pub skills: Value,
    #[builder(default = json!([]))]
    pub certifications: Value,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    /// Project the resume to the compact document the scorer sees.
    ///
    /// Keeps name, target role, summary paragraph, skills, the last
    /// `MAX_ROLES_IN_SUMMARY` roles, degrees, and certifications. Everything
    /// else is dropped to keep the prompt well under provider context limits.
    pub fn scoring_summary(&self) -> Value {
        let full_name = match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.name.clone(),
        };

        let recent_roles: Vec<Value> = self
            .work_experience
            .as_array()
            .map(|roles| roles.iter().take(MAX_ROLES_IN_SUMMARY).cloned().collect())
            .unwrap_or_default();

        json!({
            "personal_info": {
                "name": full_name.trim(),
                "email": self.email,
                "location": self.location,
                "professional_summary": self.professional_summary,
            },
            "target_role": self.target_role,
            "skills": self.skills,
            "work_experience": recent_roles,
            "education": self.education,
            "certifications": self.certifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resume() -> Resume {
        Resume::builder()
            .user_id(Uuid::new_v4())
            .name("primary")
            .first_name("Ada")
            .last_name("Lovelace")
            .target_role("Data Analyst")
            .work_experience(json!([
                {"title": "Analyst", "company": "A"},
                {"title": "Junior Analyst", "company": "B"},
                {"title": "Intern", "company": "C"},
                {"title": "Tutor", "company": "D"},
            ]))
            .skills(json!(["sql", "python"]))
            .build()
    }

    #[test]
    fn summary_keeps_only_recent_roles() {
        let summary = sample_resume().scoring_summary();
        assert_eq!(summary["work_experience"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn summary_combines_name_parts() {
        let summary = sample_resume().scoring_summary();
        assert_eq!(summary["personal_info"]["name"], "Ada Lovelace");
    }

    #[test]
    fn summary_falls_back_to_record_name() {
        let resume = Resume::builder()
            .user_id(Uuid::new_v4())
            .name("untitled resume")
            .build();
        let summary = resume.scoring_summary();
        assert_eq!(summary["personal_info"]["name"], "untitled resume");
    }
}
