use serde::{Deserialize, Serialize};

/// Maps a sheet name to a coarse category such as "Inputs / Assumptions".
pub trait RolePolicy {
    fn classify(&self, sheet_name: &str) -> &str;
}

/// A role together with the name fragments that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRule {
    pub role: String,
    pub keywords: Vec<String>,
}

impl RoleRule {
    pub fn new(role: &str, keywords: &[&str]) -> Self {
        Self {
            role: role.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowered_name: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| lowered_name.contains(k.to_lowercase().as_str()))
    }
}

/// The keyword table used when the config does not supply one.
pub fn default_role_rules() -> Vec<RoleRule> {
    vec![
        RoleRule::new("Cover / TOC", &["cover", "toc", "index", "navigation"]),
        RoleRule::new("Control / Scenario", &["control", "scenario", "switch"]),
        RoleRule::new("Inputs / Assumptions", &["assumption", "input", "driver"]),
        RoleRule::new("Timing", &["timing", "timeline", "date"]),
        RoleRule::new(
            "Calculations",
            &["calc", "revenue", "opex", "capex", "debt", "tax", "deprn"],
        ),
        RoleRule::new(
            "Financial Statements",
            &["p&l", "bs", "cfs", "is", "statement", "cashflow"],
        ),
        RoleRule::new("Outputs / Dashboard", &["summary", "dashboard", "output", "kpi"]),
        RoleRule::new("Checks", &["check", "balance", "audit"]),
        RoleRule::new("Data / Lookup", &["data", "lookup", "table"]),
    ]
}

/// Ordered keyword table: case-insensitive substring match, first rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRoles {
    rules: Vec<RoleRule>,
    fallback: String,
}

impl KeywordRoles {
    pub fn new(rules: Vec<RoleRule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    pub fn rules(&self) -> &[RoleRule] {
        &self.rules
    }
}

impl Default for KeywordRoles {
    fn default() -> Self {
        Self::new(default_role_rules(), "Other")
    }
}

impl RolePolicy for KeywordRoles {
    fn classify(&self, sheet_name: &str) -> &str {
        let lowered = sheet_name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.role.as_str())
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Cover", "Cover / TOC")]
    #[case("Scenario Control", "Control / Scenario")]
    #[case("01_Inputs", "Inputs / Assumptions")]
    #[case("Timeline", "Timing")]
    #[case("Revenue Build", "Calculations")]
    #[case("P&L", "Financial Statements")]
    #[case("Dashboard", "Outputs / Dashboard")]
    #[case("Checks", "Checks")]
    #[case("Lookup", "Data / Lookup")]
    #[case("Notes", "Other")]
    fn default_table(#[case] sheet: &str, #[case] role: &str) {
        assert_eq!(KeywordRoles::default().classify(sheet), role);
    }

    #[test]
    fn earlier_rules_win() {
        // "Input Summary" hits both the inputs and the outputs keywords.
        assert_eq!(KeywordRoles::default().classify("Input Summary"), "Inputs / Assumptions");
    }

    #[test]
    fn custom_tables_are_swappable() {
        let roles = KeywordRoles::new(vec![RoleRule::new("Brewing", &["BREW"])], "Misc");
        assert_eq!(roles.classify("brewhouse"), "Brewing");
        assert_eq!(roles.classify("Inputs"), "Misc");
    }
}
