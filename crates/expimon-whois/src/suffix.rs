use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::path::PathBuf;

/// Snapshot of the public suffix list shipped with the binary.
const EMBEDDED_SUFFIXES: &str = include_str!("../data/public_suffix_list.dat");

/// Public-suffix lookup used to reduce arbitrary hostnames to their
/// registrable domain before a WHOIS query.
///
/// Entries load once on first use. A configured file that fails to load
/// falls back to the embedded snapshot with a warning.
pub struct SuffixList {
    source: Option<PathBuf>,
    entries: OnceCell<HashSet<String>>,
}

impl SuffixList {
    pub fn embedded() -> Self {
        Self {
            source: None,
            entries: OnceCell::new(),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            entries: OnceCell::new(),
        }
    }

    fn entries(&self) -> &HashSet<String> {
        self.entries.get_or_init(|| {
            let raw = match &self.source {
                Some(path) => match std::fs::read_to_string(path) {
                    Ok(content) => {
                        tracing::info!(path = %path.display(), "Loaded public suffix list");
                        content
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to read suffix list, using embedded snapshot"
                        );
                        EMBEDDED_SUFFIXES.to_string()
                    }
                },
                None => EMBEDDED_SUFFIXES.to_string(),
            };
            parse_suffixes(&raw)
        })
    }

    pub fn is_suffix(&self, candidate: &str) -> bool {
        self.entries().contains(candidate)
    }

    /// Reduces a hostname to suffix-plus-one-label. The longest listed
    /// suffix wins; unlisted compound TLDs fall back to the last two
    /// labels so `foo.bar.example.unlistedtld` still yields a sane query.
    pub fn registrable_domain(&self, host: &str) -> String {
        let host = host.trim_matches('.').to_lowercase();
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() <= 2 {
            return host;
        }

        let entries = self.entries();
        for start in 0..labels.len() {
            let candidate = labels[start..].join(".");
            if entries.contains(&candidate) {
                if start == 0 {
                    // The whole host is itself a public suffix.
                    return host;
                }
                return labels[start - 1..].join(".");
            }
        }

        labels[labels.len() - 2..].join(".")
    }
}

fn parse_suffixes(raw: &str) -> HashSet<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(|line| line.trim_start_matches("*.").to_lowercase())
        .collect()
}
