// src/registry.rs
//! Firm registry: static-plus-runtime catalog of tracked organizations.
//!
//! The registry is an explicit value handed to the detector at
//! construction time, not a process-wide global. It is read-mostly:
//! `register` is only called at load time or between runs, `lookup` and
//! `all` are safe from any pipeline stage.

use serde::{Deserialize, Serialize};

/// A tracked organization (hedge fund, prop-trading firm, bank quant
/// desk, ...). Identity is the canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firm {
    pub name: String,
    /// Alternate spellings and abbreviations, matched case-insensitively.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub careers_url: Option<String>,
    /// Free-text category tag: "hedge fund", "prop trading", "hft", "bank", ...
    #[serde(default)]
    pub category: Option<String>,
}

impl Firm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            careers_url: None,
            category: None,
        }
    }

    /// Canonical name plus all aliases, the strings the detector matches on.
    pub fn match_terms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Ordered catalog of firms. Iteration order is insertion order, which
/// makes detector tie-breaking deterministic and reproducible.
#[derive(Debug, Clone, Default)]
pub struct FirmRegistry {
    firms: Vec<Firm>,
}

impl FirmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in universe of quantitative finance firms.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        for (name, aliases, careers, category) in BUILTIN_FIRMS {
            reg.register(
                name,
                aliases.iter().map(|s| s.to_string()).collect(),
                careers.map(str::to_string),
                Some(category.to_string()),
            );
        }
        reg
    }

    /// Find a firm by canonical name or any alias, case-insensitively.
    pub fn lookup(&self, name_or_alias: &str) -> Option<&Firm> {
        let needle = name_or_alias.trim();
        self.firms.iter().find(|f| {
            f.match_terms()
                .any(|term| term.eq_ignore_ascii_case(needle))
        })
    }

    /// Idempotent registration: a known canonical name merges new aliases
    /// and fills missing attributes instead of duplicating the firm.
    pub fn register(
        &mut self,
        name: &str,
        aliases: Vec<String>,
        careers_url: Option<String>,
        category: Option<String>,
    ) -> &Firm {
        let idx = match self
            .firms
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(idx) => {
                let firm = &mut self.firms[idx];
                for alias in aliases {
                    if !firm
                        .match_terms()
                        .any(|term| term.eq_ignore_ascii_case(&alias))
                    {
                        firm.aliases.push(alias);
                    }
                }
                if firm.careers_url.is_none() {
                    firm.careers_url = careers_url;
                }
                if firm.category.is_none() {
                    firm.category = category;
                }
                idx
            }
            None => {
                self.firms.push(Firm {
                    name: name.to_string(),
                    aliases,
                    careers_url,
                    category,
                });
                self.firms.len() - 1
            }
        };
        &self.firms[idx]
    }

    /// All firms in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Firm> {
        self.firms.iter()
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }
}

// (name, aliases, careers page, category)
type FirmSeed = (&'static str, &'static [&'static str], Option<&'static str>, &'static str);

const BUILTIN_FIRMS: &[FirmSeed] = &[
    (
        "Citadel",
        &[],
        Some("https://www.citadel.com/careers/"),
        "hedge fund",
    ),
    ("Citadel Securities", &[], None, "market maker"),
    (
        "Two Sigma",
        &[],
        Some("https://careers.twosigma.com/"),
        "hedge fund",
    ),
    (
        "Renaissance Technologies",
        &["RenTec"],
        None,
        "hedge fund",
    ),
    (
        "D. E. Shaw",
        &["DE Shaw", "D.E. Shaw"],
        Some("https://www.deshaw.com/careers"),
        "hedge fund",
    ),
    (
        "Jane Street",
        &[],
        Some("https://www.janestreet.com/join-jane-street/"),
        "prop trading",
    ),
    (
        "Jump Trading",
        &[],
        Some("https://www.jumptrading.com/careers/"),
        "hft",
    ),
    (
        "Optiver",
        &[],
        Some("https://optiver.com/working-at-optiver/career-opportunities/"),
        "market maker",
    ),
    ("IMC Trading", &["IMC"], Some("https://careers.imc.com/"), "market maker"),
    (
        "Akuna Capital",
        &["Akuna"],
        Some("https://akunacapital.com/careers"),
        "prop trading",
    ),
    ("DRW", &[], Some("https://drw.com/careers/"), "prop trading"),
    (
        "Susquehanna International Group",
        &["SIG", "Susquehanna"],
        Some("https://sig.com/careers/"),
        "prop trading",
    ),
    (
        "Hudson River Trading",
        &["HRT"],
        Some("https://www.hudsonrivertrading.com/careers/"),
        "hft",
    ),
    (
        "Tower Research",
        &["Tower Research Capital"],
        Some("https://www.tower-research.com/careers"),
        "hft",
    ),
    ("Virtu Financial", &["Virtu"], Some("https://www.virtu.com/careers/"), "market maker"),
    ("Five Rings", &[], Some("https://fiverings.com/careers/"), "prop trading"),
    (
        "AQR Capital",
        &["AQR"],
        Some("https://careers.aqr.com/"),
        "asset manager",
    ),
    (
        "Bridgewater Associates",
        &["Bridgewater"],
        None,
        "hedge fund",
    ),
    (
        "Millennium Management",
        &["Millennium"],
        Some("https://www.mlp.com/careers/"),
        "hedge fund",
    ),
    ("Point72", &[], Some("https://careers.point72.com/"), "hedge fund"),
    ("Goldman Sachs", &[], None, "bank"),
    ("Morgan Stanley", &[], None, "bank"),
    ("JP Morgan", &["JPMorgan", "J.P. Morgan"], None, "bank"),
    ("BlackRock", &[], None, "asset manager"),
    ("Wintermute", &[], None, "crypto"),
    ("Flow Traders", &[], None, "market maker"),
    ("Wolverine Trading", &["Wolverine"], None, "prop trading"),
    (
        "Old Mission",
        &[],
        Some("https://www.oldmissioncapital.com/careers/"),
        "prop trading",
    ),
    ("Radix Trading", &["Radix"], None, "prop trading"),
    ("XR Trading", &[], None, "prop trading"),
    (
        "Quantitative Investment Management",
        &["QIM"],
        None,
        "hedge fund",
    ),
    ("Bank of America", &[], None, "bank"),
    ("Barclays", &[], None, "bank"),
    ("Credit Suisse", &[], None, "bank"),
    ("UBS", &[], None, "bank"),
    ("Deutsche Bank", &[], None, "bank"),
    ("Citigroup", &["Citi"], None, "bank"),
    ("Vanguard", &[], None, "asset manager"),
    ("State Street", &[], None, "asset manager"),
    ("Winton Group", &["Winton"], None, "hedge fund"),
    ("Man Group", &[], None, "hedge fund"),
    ("Schonfeld", &[], None, "hedge fund"),
    ("Chicago Trading Company", &["CTC"], None, "prop trading"),
    ("Geneva Trading", &[], None, "prop trading"),
    ("Belvedere Trading", &["Belvedere"], None, "prop trading"),
    ("Allston Trading", &[], None, "prop trading"),
    ("TransMarket Group", &["TMG"], None, "prop trading"),
    ("Peak6", &[], None, "prop trading"),
    ("Headlands Tech", &["Headlands"], None, "hft"),
    ("Valkyrie Trading", &[], None, "prop trading"),
    ("GTS", &["Global Trading Systems"], None, "market maker"),
    ("Alameda Research", &[], None, "crypto"),
    ("Jump Crypto", &[], None, "crypto"),
    ("Cumberland", &[], None, "crypto"),
    ("Robinhood", &[], None, "fintech"),
    ("Bloomberg", &[], None, "fintech"),
    ("FactSet", &[], None, "fintech"),
    ("Refinitiv", &[], None, "fintech"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_populated_and_ordered() {
        let reg = FirmRegistry::builtin();
        assert!(reg.len() > 50);
        // Citadel is seeded first; tie-breaks depend on this being stable.
        assert_eq!(reg.all().next().unwrap().name, "Citadel");
    }

    #[test]
    fn lookup_matches_aliases_case_insensitively() {
        let reg = FirmRegistry::builtin();
        assert_eq!(reg.lookup("sig").unwrap().name, "Susquehanna International Group");
        assert_eq!(reg.lookup("hrt").unwrap().name, "Hudson River Trading");
        assert_eq!(reg.lookup("ctc").unwrap().name, "Chicago Trading Company");
        assert!(reg.lookup("Acme Capital").is_none());
    }

    #[test]
    fn register_merges_instead_of_duplicating() {
        let mut reg = FirmRegistry::new();
        reg.register("Citadel", vec![], None, Some("hedge fund".into()));
        reg.register(
            "citadel",
            vec!["Citadel LLC".into()],
            Some("https://www.citadel.com/careers/".into()),
            None,
        );
        assert_eq!(reg.len(), 1);
        let firm = reg.lookup("Citadel LLC").unwrap();
        assert_eq!(firm.name, "Citadel");
        assert_eq!(firm.category.as_deref(), Some("hedge fund"));
        assert!(firm.careers_url.is_some());
    }

    #[test]
    fn register_does_not_duplicate_existing_alias() {
        let mut reg = FirmRegistry::new();
        reg.register("D. E. Shaw", vec!["DE Shaw".into()], None, None);
        reg.register("D. E. Shaw", vec!["de shaw".into(), "DESCO".into()], None, None);
        let firm = reg.lookup("D. E. Shaw").unwrap();
        assert_eq!(firm.aliases, vec!["DE Shaw".to_string(), "DESCO".to_string()]);
    }
}
