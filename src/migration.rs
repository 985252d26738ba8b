/// A legacy-name migration rule, evaluated against each stored tensor name
/// while an older container streams through `register_variable`.
#[derive(Debug, Clone)]
pub enum MigrationRule {
    /// Replace an exact legacy name with one or more current names. Multiple
    /// targets register the same storage under each name; tensor bytes are
    /// reference-counted, so a split costs nothing.
    Rename { from: String, to: Vec<String> },
    /// Rewrite a leading path segment, e.g. dropping a prefix an older
    /// revision applied to every name.
    RewritePrefix { from: String, to: String },
}

impl MigrationRule {
    pub fn rename(from: &str, to: &str) -> Self {
        MigrationRule::Rename {
            from: from.to_string(),
            to: vec![to.to_string()],
        }
    }

    pub fn split(from: &str, to: &[&str]) -> Self {
        MigrationRule::Rename {
            from: from.to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn rewrite_prefix(from: &str, to: &str) -> Self {
        MigrationRule::RewritePrefix {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn apply(&self, name: &str) -> Option<Vec<String>> {
        match self {
            MigrationRule::Rename { from, to } => (name == from).then(|| to.clone()),
            MigrationRule::RewritePrefix { from, to } => {
                name.strip_prefix(from.as_str()).map(|rest| vec![format!("{to}{rest}")])
            }
        }
    }
}

/// Ordered rule list; the first matching rule decides, so exact renames must
/// precede broad prefix rewrites.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    rules: Vec<MigrationRule>,
}

impl MigrationPlan {
    pub fn new(rules: Vec<MigrationRule>) -> Self {
        Self { rules }
    }

    /// Map a stored name to the current names it should be registered under.
    /// `None` means the name is already current.
    pub fn apply(&self, name: &str) -> Option<Vec<String>> {
        self.rules.iter().find_map(|rule| rule.apply(name))
    }
}
