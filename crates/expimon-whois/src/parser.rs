use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Fields extracted from a raw WHOIS response. Dates are normalized to
/// `YYYY-MM-DD HH:MM:SS` strings; consumers pick the earliest expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedWhois {
    pub expiration_dates: Vec<String>,
    pub creation_date: Option<String>,
    pub updated_date: Option<String>,
    pub registrar: Option<String>,
    pub registrant: Option<String>,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static EXPIRY_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?im)^\s*Registry Expiry Date:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Registrar Registration Expiration Date:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Expir(?:y|ation|es)\s*[Dd]ate:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Expires(?:\s+on)?\s*[.:]\s*(.+?)\s*$"),
        re(r"(?im)^\s*paid-till:\s*(.+?)\s*$"),
        re(r"(?im)^\s*renewal date:\s*(.+?)\s*$"),
        re(r"(?im)^\s*\[Expires on\]\s*(.+?)\s*$"),
    ]
});

static REGISTRAR_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?im)^\s*Registrar:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Sponsoring Registrar:\s*(.+?)\s*$"),
        re(r"(?im)^\s*registrar:\s*(.+?)\s*$"),
    ]
});

static REGISTRANT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?im)^\s*Registrant Organi[sz]ation:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Registrant Name:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Registrant:\s*(.+?)\s*$"),
        re(r"(?im)^\s*\[Registrant\]\s*(.+?)\s*$"),
        re(r"(?im)^\s*org:\s*(.+?)\s*$"),
        re(r"(?im)^\s*owner:\s*(.+?)\s*$"),
    ]
});

static CREATED_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?im)^\s*Creation Date:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Registered on:\s*(.+?)\s*$"),
        re(r"(?im)^\s*created:\s*(.+?)\s*$"),
        re(r"(?im)^\s*\[Created on\]\s*(.+?)\s*$"),
    ]
});

static UPDATED_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?im)^\s*Updated Date:\s*(.+?)\s*$"),
        re(r"(?im)^\s*Last updated:\s*(.+?)\s*$"),
        re(r"(?im)^\s*last-update:\s*(.+?)\s*$"),
        re(r"(?im)^\s*changed:\s*(.+?)\s*$"),
        re(r"(?im)^\s*\[Last Updated?\]\s*(.+?)\s*$"),
    ]
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%Y.%m.%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%Y%m%d",
    "%d-%m-%Y",
];

/// Normalizes the date spellings seen across registries to
/// `YYYY-MM-DD HH:MM:SS`, or `None` when nothing matches.
pub fn normalize_date(raw: &str) -> Option<String> {
    let cleaned = raw
        .split(&['(', '#'][..])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, fmt) {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }

    // Last resort: a leading ISO date in a line with trailing noise,
    // e.g. "2026-08-01T00:00:00+03:00 registry time".
    let head: String = cleaned
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();
    if head.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&head[..10], "%Y-%m-%d") {
            let dt = date.and_hms_opt(0, 0, 0)?;
            return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }

    None
}

fn collect_dates(raw: &str, patterns: &[Regex]) -> Vec<String> {
    let mut dates = Vec::new();
    for pattern in patterns {
        for cap in pattern.captures_iter(raw) {
            if let Some(normalized) = normalize_date(&cap[1]) {
                if !dates.contains(&normalized) {
                    dates.push(normalized);
                }
            }
        }
    }
    dates
}

fn first_match(raw: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(raw).map(|cap| cap[1].trim().to_string()))
        .filter(|s| !s.is_empty())
}

fn first_date(raw: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(raw).and_then(|cap| normalize_date(&cap[1])))
}

/// Field extraction that works for the large thick/thin registries
/// (.com, .net, .org, most gTLDs).
pub fn parse_base(raw: &str) -> ParsedWhois {
    ParsedWhois {
        expiration_dates: collect_dates(raw, &EXPIRY_RES),
        creation_date: first_date(raw, &CREATED_RES),
        updated_date: first_date(raw, &UPDATED_RES),
        registrar: first_match(raw, &REGISTRAR_RES),
        registrant: first_match(raw, &REGISTRANT_RES),
    }
}

type TldParser = fn(&str) -> ParsedWhois;

/// Per-registry parse variants for formats the base regexes miss.
/// Selected by TLD lookup; new registries are added here, not by
/// extending the resolver.
static TLD_PARSERS: Lazy<HashMap<&'static str, TldParser>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, TldParser> = HashMap::new();
    m.insert("uk", parse_uk);
    m.insert("ru", parse_ru);
    m.insert("su", parse_ru);
    m.insert("jp", parse_jp);
    m.insert("br", parse_br);
    m.insert("za", parse_za);
    m
});

pub fn parse_for_tld(tld: &str, raw: &str) -> Option<ParsedWhois> {
    TLD_PARSERS.get(tld).map(|parser| parser(raw))
}

fn parse_uk(raw: &str) -> ParsedWhois {
    static EXPIRY: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*Expiry date:\s*(.+?)\s*$"));
    static REGISTRAR: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*Registrar:\s*\n\s*(.+?)\s*$"));
    static REGISTERED: Lazy<Regex> =
        Lazy::new(|| re(r"(?im)^\s*Registered on:\s*(.+?)\s*$"));

    ParsedWhois {
        expiration_dates: EXPIRY
            .captures_iter(raw)
            .filter_map(|cap| normalize_date(&cap[1]))
            .collect(),
        creation_date: REGISTERED
            .captures(raw)
            .and_then(|cap| normalize_date(&cap[1])),
        updated_date: first_date(raw, &UPDATED_RES),
        registrar: REGISTRAR
            .captures(raw)
            .map(|cap| cap[1].trim().to_string()),
        registrant: first_match(raw, &REGISTRANT_RES),
    }
}

fn parse_ru(raw: &str) -> ParsedWhois {
    static PAID_TILL: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*paid-till:\s*(.+?)\s*$"));
    static ORG: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*org:\s*(.+?)\s*$"));
    static CREATED: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*created:\s*(.+?)\s*$"));

    ParsedWhois {
        expiration_dates: PAID_TILL
            .captures_iter(raw)
            .filter_map(|cap| normalize_date(&cap[1]))
            .collect(),
        creation_date: CREATED
            .captures(raw)
            .and_then(|cap| normalize_date(&cap[1])),
        updated_date: None,
        registrar: first_match(raw, &REGISTRAR_RES),
        registrant: ORG.captures(raw).map(|cap| cap[1].trim().to_string()),
    }
}

fn parse_jp(raw: &str) -> ParsedWhois {
    static EXPIRES: Lazy<Regex> =
        Lazy::new(|| re(r"(?im)^\s*\[(?:Expires on|State)\]\s*.*?(\d{4}/\d{2}/\d{2})"));
    static CREATED: Lazy<Regex> =
        Lazy::new(|| re(r"(?im)^\s*\[(?:Created on|Registered Date)\]\s*(.+?)\s*$"));
    static REGISTRANT: Lazy<Regex> =
        Lazy::new(|| re(r"(?im)^\s*\[(?:Registrant|Organization)\]\s*(.+?)\s*$"));

    ParsedWhois {
        expiration_dates: EXPIRES
            .captures_iter(raw)
            .filter_map(|cap| normalize_date(&cap[1]))
            .collect(),
        creation_date: CREATED
            .captures(raw)
            .and_then(|cap| normalize_date(&cap[1])),
        updated_date: first_date(raw, &UPDATED_RES),
        registrar: None,
        registrant: REGISTRANT
            .captures(raw)
            .map(|cap| cap[1].trim().to_string()),
    }
}

fn parse_br(raw: &str) -> ParsedWhois {
    static EXPIRES: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*expires:\s*(\d{8})\s*$"));
    static CREATED: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*created:\s*(\d{8})"));
    static OWNER: Lazy<Regex> = Lazy::new(|| re(r"(?im)^\s*owner:\s*(.+?)\s*$"));

    ParsedWhois {
        expiration_dates: EXPIRES
            .captures_iter(raw)
            .filter_map(|cap| normalize_date(&cap[1]))
            .collect(),
        creation_date: CREATED
            .captures(raw)
            .and_then(|cap| normalize_date(&cap[1])),
        updated_date: None,
        registrar: None,
        registrant: OWNER.captures(raw).map(|cap| cap[1].trim().to_string()),
    }
}

fn parse_za(raw: &str) -> ParsedWhois {
    static EXPIRY: Lazy<Regex> =
        Lazy::new(|| re(r"(?im)^\s*(?:Expiry Date|Renewal Date):\s*(.+?)\s*$"));

    ParsedWhois {
        expiration_dates: EXPIRY
            .captures_iter(raw)
            .filter_map(|cap| normalize_date(&cap[1]))
            .collect(),
        creation_date: first_date(raw, &CREATED_RES),
        updated_date: first_date(raw, &UPDATED_RES),
        registrar: first_match(raw, &REGISTRAR_RES),
        registrant: first_match(raw, &REGISTRANT_RES),
    }
}
