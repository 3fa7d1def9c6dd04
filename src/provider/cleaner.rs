use chrono::NaiveDate;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse price: strip everything except digits, dot, minus.
/// "CNY 1,234.56" → 1234.56 | "21.50" → 21.5
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// Parse dates: compact "20230101", ISO, slashed, or investing.com "Feb 20, 2024".
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    for fmt in ["%Y%m%d", "%Y-%m-%d", "%Y/%m/%d", "%b %d, %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    None
}

pub fn normalise_symbol(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Split a user ticker list on ASCII or full-width commas.
/// Blank entries are dropped; repeats keep their first position.
pub fn parse_ticker_list(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in s.split([',', '，']) {
        let t = raw.trim();
        if t.is_empty() || out.iter().any(|seen| seen == t) {
            continue;
        }
        out.push(t.to_string());
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
