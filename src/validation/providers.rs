use std::collections::HashSet;

/// Public mailbox providers that are assumed to accept mail.
pub const DEFAULT_FREE_PROVIDERS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "live.com",
    "icloud.com",
    "msn.com",
    "protonmail.com",
    "gmx.com",
    "yandex.com",
    "mail.com",
    "zoho.com",
];

/// Lowercases a domain and strips surrounding whitespace and the root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Domains whose MX check is skipped and treated as passed.
///
/// Built once before a run and shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeProviderSet {
    domains: HashSet<String>,
}

impl Default for FreeProviderSet {
    fn default() -> Self {
        Self::from_domains(DEFAULT_FREE_PROVIDERS.iter().copied())
    }
}

impl FreeProviderSet {
    pub fn empty() -> Self {
        Self {
            domains: HashSet::new(),
        }
    }

    /// Builds a set from arbitrary domain spellings; blanks are skipped.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for domain in domains {
            set.insert(domain.as_ref());
        }
        set
    }

    /// Returns `false` if the domain was blank or already present.
    pub fn insert(&mut self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        !domain.is_empty() && self.domains.insert(domain)
    }

    pub fn remove(&mut self, domain: &str) -> bool {
        self.domains.remove(&normalize_domain(domain))
    }

    /// Expects a domain already passed through [`normalize_domain`].
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
