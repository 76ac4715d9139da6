/// Four-digit ledger prefixes and the subcategory each one rolls up to.
///
/// Sorted by prefix so lookups can binary search.
const SUBCATEGORY_PREFIXES: &[(&str, &str)] = &[
    ("4001", "medicare_revenue"),
    ("4002", "medicaid_revenue"),
    ("4003", "managed_care_revenue"),
    ("4004", "private_pay_revenue"),
    ("4005", "hospice_revenue"),
    ("4006", "veterans_revenue"),
    ("4010", "ancillary_revenue"),
    ("4020", "therapy_revenue"),
    ("4090", "other_revenue"),
    ("5001", "nursing"),
    ("5005", "contract_labor"),
    ("5010", "dietary"),
    ("5020", "housekeeping"),
    ("5030", "laundry"),
    ("5040", "plant_operations"),
    ("5050", "activities"),
    ("5060", "social_services"),
    ("5070", "therapy"),
    ("5080", "pharmacy"),
    ("5090", "medical_supplies"),
    ("6001", "administrative_salaries"),
    ("6010", "management_fee"),
    ("6020", "professional_fees"),
    ("6030", "insurance"),
    ("6040", "property_tax"),
    ("6050", "utilities"),
    ("6060", "bad_debt"),
    ("6070", "marketing"),
    ("6090", "other_admin"),
    ("7001", "lease_expense"),
    ("7010", "interest"),
    ("7020", "depreciation"),
    ("7030", "amortization"),
    ("7090", "other_non_operating"),
    ("8001", "income_tax"),
    ("8010", "extraordinary_items"),
];

/// Subcategory for a normalized ledger code, from its first four digits.
pub fn subcategory_for_code(code: &str) -> Option<&'static str> {
    let prefix = code.get(..4)?;
    SUBCATEGORY_PREFIXES
        .binary_search_by(|(p, _)| (*p).cmp(prefix))
        .ok()
        .map(|i| SUBCATEGORY_PREFIXES[i].1)
}
