use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported project types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Nextjs,
    React,
    Vite,
    Express,
    Fastapi,
    Flask,
    Vanilla,
}

impl ProjectType {
    /// Menu order.
    pub const ALL: [ProjectType; 7] = [
        ProjectType::Nextjs,
        ProjectType::React,
        ProjectType::Vite,
        ProjectType::Express,
        ProjectType::Fastapi,
        ProjectType::Flask,
        ProjectType::Vanilla,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Nextjs => "nextjs",
            ProjectType::React => "react",
            ProjectType::Vite => "vite",
            ProjectType::Express => "express",
            ProjectType::Fastapi => "fastapi",
            ProjectType::Flask => "flask",
            ProjectType::Vanilla => "vanilla",
        }
    }

    /// Resolves a 1-based menu choice.
    pub fn from_choice(choice: usize) -> Option<Self> {
        choice
            .checked_sub(1)
            .and_then(|idx| Self::ALL.get(idx).copied())
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything gathered from the operator before a project is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub description: String,
    pub features: Vec<String>,
    pub tech_stack: Vec<String>,
    pub setup_git: bool,
    pub repo_url: Option<String>,
    pub port: u16,
}

impl ProjectConfig {
    pub fn uses(&self, technology: &str) -> bool {
        self.tech_stack
            .iter()
            .any(|t| t.eq_ignore_ascii_case(technology))
    }
}

/// Splits a comma-separated answer into trimmed, non-empty items.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_choice_is_one_based() {
        assert_eq!(ProjectType::from_choice(1), Some(ProjectType::Nextjs));
        assert_eq!(ProjectType::from_choice(7), Some(ProjectType::Vanilla));
        assert_eq!(ProjectType::from_choice(0), None);
        assert_eq!(ProjectType::from_choice(8), None);
    }

    #[test]
    fn splits_comma_lists() {
        assert_eq!(
            split_list(" tailwindcss, typescript ,,"),
            vec!["tailwindcss".to_string(), "typescript".to_string()]
        );
    }

    #[test]
    fn config_round_trips_through_memory_json() {
        let config = ProjectConfig {
            name: "shop".into(),
            project_type: ProjectType::React,
            description: "d".into(),
            features: vec!["cart".into()],
            tech_stack: vec!["TailwindCSS".into()],
            setup_git: false,
            repo_url: None,
            port: 3000,
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["type"], "react");
        assert!(config.uses("tailwindcss"));
        let back: ProjectConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }
}
