#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ProfileRow {
    pub user_id: i64,
    pub role: String,
    pub school: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub major: Option<String>,
    pub year: Option<String>,
    pub subjects: Option<String>,
    pub rate: Option<f64>,
}

/// Role-specific attribute set, so callers never probe nullable columns to
/// figure out which kind of profile they are holding.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileRole {
    Student {
        major: Option<String>,
        year: Option<String>,
    },
    Tutor {
        subjects: Vec<String>,
        rate: Option<f64>,
    },
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Student { .. } => "student",
            ProfileRole::Tutor { .. } => "tutor",
        }
    }
}

impl ProfileRow {
    pub fn role(&self) -> ProfileRole {
        match self.role.as_str() {
            "tutor" => ProfileRole::Tutor {
                subjects: self
                    .subjects
                    .as_deref()
                    .unwrap_or("")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                rate: self.rate,
            },
            _ => ProfileRole::Student {
                major: self.major.clone(),
                year: self.year.clone(),
            },
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> ProfileRow {
        ProfileRow {
            user_id: 1,
            role: "student".to_string(),
            school: None,
            location: None,
            latitude: None,
            longitude: None,
            avatar: None,
            bio: None,
            major: Some("CS".to_string()),
            year: Some("Sophomore".to_string()),
            subjects: None,
            rate: None,
        }
    }

    #[test]
    fn role_splits_the_attribute_sets() {
        let student = base_row();
        assert_eq!(
            student.role(),
            ProfileRole::Student {
                major: Some("CS".to_string()),
                year: Some("Sophomore".to_string()),
            }
        );

        let mut tutor = base_row();
        tutor.role = "tutor".to_string();
        tutor.subjects = Some("math, , computer_science".to_string());
        tutor.rate = Some(25.0);
        assert_eq!(
            tutor.role(),
            ProfileRole::Tutor {
                subjects: vec!["math".to_string(), "computer_science".to_string()],
                rate: Some(25.0),
            }
        );
    }
}
