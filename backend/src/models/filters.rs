use serde::Deserialize;

/// Raw hunting parameters as they arrive on the query string. Nothing is
/// validated here; absent keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterSet {
    pub q: Option<String>,
    pub desc: Option<String>,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub manager_name: Option<String>,
    pub group: Option<String>,
    pub rule_id: Option<String>,
    pub level_gte: Option<String>,
    pub level_lte: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(raw) if raw.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Trimmed value of an optional parameter, `None` when missing or blank.
pub fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_parameters_count_as_absent() {
        assert_eq!(present(&None), None);
        assert_eq!(present(&Some("   ".into())), None);
        assert_eq!(present(&Some(" 001 ".into())), Some("001"));
    }

    #[test]
    fn only_explicit_asc_flips_the_order() {
        assert_eq!(SortOrder::from_param(None), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(Some("ASC ")), SortOrder::Asc);
        assert_eq!(SortOrder::from_param(Some("ascending")), SortOrder::Desc);
    }
}
