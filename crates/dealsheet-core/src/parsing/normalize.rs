use std::collections::HashMap;
use std::sync::LazyLock;

/// Normalize a line-item label to a canonical snake_case key.
///
/// Steps:
/// 1. Strip a trailing parenthetical qualifier: "Medicare (Part A)" -> "Medicare"
/// 2. Lowercase
/// 3. Replace spaces, hyphens, slashes, ampersands with underscores
/// 4. Collapse multiple underscores
/// 5. Look up in alias map
pub fn snake_label(raw: &str) -> String {
    let mut s = raw.trim().to_string();

    if let Some(idx) = s.rfind('(') {
        if s.ends_with(')') && idx > 0 {
            s = s[..idx].trim_end().to_string();
        }
    }

    s = s.to_lowercase().replace('&', " and ");

    let mut normalized = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            normalized.push(c);
        } else {
            normalized.push('_');
        }
    }

    let mut result = String::with_capacity(normalized.len());
    let mut prev_underscore = true;
    for c in normalized.chars() {
        if c == '_' {
            if !prev_underscore {
                result.push('_');
            }
            prev_underscore = true;
        } else {
            result.push(c);
            prev_underscore = false;
        }
    }
    if result.ends_with('_') {
        result.pop();
    }

    match LABEL_ALIASES.get(result.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => result,
    }
}

/// Tidy a facility name for display: collapse whitespace and drop trailing
/// statement qualifiers such as "- T12", "(OpCo)" or "Income Statement".
pub fn canonical_facility_name(raw: &str) -> String {
    let mut s = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        let before = s.len();

        if s.ends_with(')') {
            if let Some(idx) = s.rfind('(') {
                if idx > 0 {
                    s = s[..idx].trim_end().to_string();
                }
            }
        }

        let lower = s.to_lowercase();
        for suffix in STATEMENT_SUFFIXES {
            if lower.ends_with(suffix) && lower.len() == s.len() && s.len() > suffix.len() {
                let cut = s.len() - suffix.len();
                if s.is_char_boundary(cut) {
                    s.truncate(cut);
                    break;
                }
            }
        }
        s = s
            .trim_end_matches(|c: char| c == '-' || c == '–' || c == ':' || c.is_whitespace())
            .to_string();

        if s.len() == before {
            break;
        }
    }

    s
}

/// Lowercase alphanumeric tokens of a facility name, without corporate
/// suffixes ("LLC", "Inc") or filler words.
pub fn facility_tokens(raw: &str) -> Vec<String> {
    let lowered: String = canonical_facility_name(raw)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    lowered
        .split_whitespace()
        .filter(|t| !STOP_TOKENS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Comparison key for a facility name: its tokens joined by single spaces.
pub fn facility_key(raw: &str) -> String {
    facility_tokens(raw).join(" ")
}

/// Whole-word containment on lowercase text; a trailing plural "s" still
/// counts ("expenses" hits "expense", "community" does not hit "unit").
pub fn contains_word(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let mut after = haystack[end..].chars();
        let after_ok = match after.next() {
            None => true,
            Some('s') => after.next().map_or(true, |c| !c.is_alphanumeric()),
            Some(c) => !c.is_alphanumeric(),
        };
        if before_ok && after_ok {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Two-letter code for a US state given as a code or full name
/// ("TX", "Texas", "new york"). Codes must be uppercase in the source text.
pub fn state_code(text: &str) -> Option<&'static str> {
    let t = text.trim().trim_end_matches('.');
    if t.len() == 2 {
        return US_STATES.iter().find(|(code, _)| *code == t).map(|(code, _)| *code);
    }
    let lower = t.to_lowercase();
    US_STATES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(&lower))
        .map(|(code, _)| *code)
}

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"), ("AK", "Alaska"), ("AZ", "Arizona"), ("AR", "Arkansas"),
    ("CA", "California"), ("CO", "Colorado"), ("CT", "Connecticut"), ("DE", "Delaware"),
    ("DC", "District of Columbia"), ("FL", "Florida"), ("GA", "Georgia"), ("HI", "Hawaii"),
    ("ID", "Idaho"), ("IL", "Illinois"), ("IN", "Indiana"), ("IA", "Iowa"),
    ("KS", "Kansas"), ("KY", "Kentucky"), ("LA", "Louisiana"), ("ME", "Maine"),
    ("MD", "Maryland"), ("MA", "Massachusetts"), ("MI", "Michigan"), ("MN", "Minnesota"),
    ("MS", "Mississippi"), ("MO", "Missouri"), ("MT", "Montana"), ("NE", "Nebraska"),
    ("NV", "Nevada"), ("NH", "New Hampshire"), ("NJ", "New Jersey"), ("NM", "New Mexico"),
    ("NY", "New York"), ("NC", "North Carolina"), ("ND", "North Dakota"), ("OH", "Ohio"),
    ("OK", "Oklahoma"), ("OR", "Oregon"), ("PA", "Pennsylvania"), ("RI", "Rhode Island"),
    ("SC", "South Carolina"), ("SD", "South Dakota"), ("TN", "Tennessee"), ("TX", "Texas"),
    ("UT", "Utah"), ("VT", "Vermont"), ("VA", "Virginia"), ("WA", "Washington"),
    ("WV", "West Virginia"), ("WI", "Wisconsin"), ("WY", "Wyoming"),
];

const STATEMENT_SUFFIXES: &[&str] = &[
    "income statement",
    "operating statement",
    "p&l",
    "t12",
    "t13",
    "ttm",
    "ytd",
    "financials",
];

const STOP_TOKENS: &[&str] = &[
    "llc", "inc", "lp", "llp", "corp", "co", "ltd", "the", "of", "and", "dba",
];

static LABEL_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Summary metrics
    m.insert("total_revenues", "total_revenue");
    m.insert("total_operating_revenue", "total_revenue");
    m.insert("total_operating_revenues", "total_revenue");
    m.insert("net_revenue", "total_revenue");
    m.insert("total_net_revenue", "total_revenue");
    m.insert("total_expense", "total_expenses");
    m.insert("total_operating_expenses", "total_expenses");
    m.insert("total_operating_expense", "total_expenses");
    m.insert("total_costs", "total_expenses");
    m.insert("net_income_loss", "net_income");
    m.insert("net_profit", "net_income");

    // Fees and occupancy costs
    m.insert("mgmt_fee", "management_fee");
    m.insert("mgmt_fees", "management_fee");
    m.insert("management_fees", "management_fee");
    m.insert("rent", "lease_expense");
    m.insert("rent_expense", "lease_expense");
    m.insert("lease", "lease_expense");
    m.insert("building_rent", "lease_expense");
    m.insert("facility_rent", "lease_expense");

    // Payor revenue
    m.insert("medicare", "medicare_revenue");
    m.insert("medicare_part_a", "medicare_revenue");
    m.insert("medicaid", "medicaid_revenue");
    m.insert("private", "private_pay_revenue");
    m.insert("private_pay", "private_pay_revenue");
    m.insert("managed_care", "managed_care_revenue");
    m.insert("hmo", "managed_care_revenue");

    // Census
    m.insert("adc", "average_daily_census");
    m.insert("avg_daily_census", "average_daily_census");
    m.insert("resident_days", "patient_days");
    m.insert("total_patient_days", "patient_days");

    m
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_label() {
        assert_eq!(snake_label("Medicare Revenue"), "medicare_revenue");
    }

    #[test]
    fn test_label_with_parenthetical() {
        assert_eq!(snake_label("Medicare (Part A)"), "medicare_revenue");
    }

    #[test]
    fn test_label_separators() {
        assert_eq!(snake_label("Repairs & Maintenance"), "repairs_and_maintenance");
        assert_eq!(snake_label("  Dietary -- Raw Food / Supplements "), "dietary_raw_food_supplements");
    }

    #[test]
    fn test_label_aliases() {
        assert_eq!(snake_label("Mgmt Fee"), "management_fee");
        assert_eq!(snake_label("Total Operating Expenses"), "total_expenses");
        assert_eq!(snake_label("Rent"), "lease_expense");
    }

    #[test]
    fn test_canonical_facility_name() {
        assert_eq!(canonical_facility_name("  Sunrise   SNF "), "Sunrise SNF");
        assert_eq!(canonical_facility_name("Sunrise SNF - T12"), "Sunrise SNF");
        assert_eq!(canonical_facility_name("Sunrise SNF (OpCo)"), "Sunrise SNF");
        assert_eq!(canonical_facility_name("Sunrise SNF Income Statement"), "Sunrise SNF");
    }

    #[test]
    fn test_facility_key_drops_corporate_suffix() {
        assert_eq!(facility_key("Sunrise Health, LLC"), "sunrise health");
        assert_eq!(facility_key("The Meadows of Boise"), "meadows boise");
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("total expenses", "expense"));
        assert!(contains_word("t12 sunrise", "t12"));
        assert!(!contains_word("community", "unit"));
        assert!(!contains_word("drugs", "rug"));
        assert!(contains_word("per diem rates", "per diem"));
        assert!(!contains_word("current", "rent"));
    }

    #[test]
    fn test_state_code() {
        assert_eq!(state_code("TX"), Some("TX"));
        assert_eq!(state_code("Idaho"), Some("ID"));
        assert_eq!(state_code("new york"), Some("NY"));
        assert_eq!(state_code("in"), None);
        assert_eq!(state_code("Boise"), None);
    }

    #[test]
    fn test_unknown_label_passthrough() {
        assert_eq!(snake_label("Contract Labor"), "contract_labor");
    }
}
