#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub branch: Option<String>,
    pub short_commit: Option<String>,
    pub is_clean: Option<bool>,
}

impl GitInfo {
    /// `main`, `main*` when dirty, or `detached@abc1234`
    pub fn label(&self) -> Option<String> {
        let mut label = match (&self.branch, &self.short_commit) {
            (Some(branch), _) => branch.clone(),
            (None, Some(sha)) => format!("detached@{sha}"),
            (None, None) => return None,
        };
        if self.is_clean == Some(false) {
            label.push('*');
        }
        Some(label)
    }
}
