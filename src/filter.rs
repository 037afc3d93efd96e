use serde::Serialize;

/// The legend selection: one category, or everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    selected: Option<String>,
}

impl FilterState {
    pub fn selecting(category: impl Into<String>) -> Self {
        Self { selected: Some(category.into()) }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Clicking the selected row clears the filter, any other row selects it.
    pub fn toggle(&mut self, category: &str) {
        if self.selected() == Some(category) {
            self.selected = None;
        } else {
            self.selected = Some(category.to_string());
        }
    }

    pub fn admits(&self, category: &str) -> bool {
        self.selected().map_or(true, |selected| selected == category)
    }
}

#[cfg(test)]
mod tests {
    use super::FilterState;

    #[test]
    fn toggles_between_category_and_none() {
        let mut filter = FilterState::default();
        assert!(filter.admits("HOMICIDE") && filter.admits("RAPE"));

        filter.toggle("HOMICIDE");
        assert_eq!(filter.selected(), Some("HOMICIDE"));
        assert!(filter.admits("HOMICIDE"));
        assert!(!filter.admits("RAPE"));

        filter.toggle("RAPE");
        assert_eq!(filter, FilterState::selecting("RAPE"));

        filter.toggle("RAPE");
        assert_eq!(filter.selected(), None);
    }
}
