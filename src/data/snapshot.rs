/// Relative paths of every regular file in a project at one point in time.
///
/// Order follows filesystem enumeration and is only meant for display or
/// model context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSnapshot {
    paths: Vec<String>,
}

impl ProjectSnapshot {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Renders the listing as a bulleted block for a prompt.
    pub fn render(&self) -> String {
        if self.paths.is_empty() {
            return "(no files)".to_string();
        }
        self.paths
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
