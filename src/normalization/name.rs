use indexmap::IndexSet;

/// Generational suffixes dropped as whole words during normalization.
const SUFFIXES: [&str; 6] = ["jr", "sr", "ii", "iii", "iv", "v"];

/// Bidirectional nickname pairs. Order matters: the first pair that matches
/// the leading token decides the swap.
const NICKNAMES: [(&str, &str); 20] = [
    ("patrick", "pat"),
    ("william", "will"),
    ("michael", "mike"),
    ("robert", "rob"),
    ("christopher", "chris"),
    ("joshua", "josh"),
    ("matthew", "matt"),
    ("nicholas", "nick"),
    ("anthony", "tony"),
    ("benjamin", "ben"),
    ("daniel", "dan"),
    ("jonathan", "jon"),
    ("joseph", "joe"),
    ("kenneth", "ken"),
    ("zachary", "zach"),
    ("alexander", "alex"),
    ("cameron", "cam"),
    ("thomas", "tom"),
    ("samuel", "sam"),
    ("gabriel", "gabe"),
];

/// Canonical lowercase form of a player name.
///
/// Normalization steps:
/// - lowercase
/// - drop periods, hyphens, apostrophes and backticks outright ("D.J." -> "dj")
/// - turn any other punctuation into a separator
/// - collapse whitespace
/// - remove generational suffixes (jr, sr, ii, iii, iv, v) as whole words
pub fn normalize(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            '.' | '-' | '\'' | '`' | '\u{2019}' => {}
            c if c.is_alphanumeric() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }
    cleaned
        .split_whitespace()
        .filter(|token| !SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derived name forms used for exact lookups and fuzzy scoring.
///
/// Never persisted; recompute from the display name whenever needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameVariations {
    pub normalized: String,
    pub last_name_first: String,
    pub first_initial_last: String,
    alternates: IndexSet<String>,
}

impl NameVariations {
    pub fn new(name: &str) -> Self {
        let normalized = normalize(name);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        if tokens.len() < 2 {
            let mut alternates = IndexSet::new();
            alternates.insert(normalized.clone());
            return Self {
                last_name_first: normalized.clone(),
                first_initial_last: normalized.clone(),
                normalized,
                alternates,
            };
        }

        let first = tokens[0];
        let last = tokens[tokens.len() - 1];
        let middles = &tokens[1..tokens.len() - 1];

        let mut reversed = vec![last, first];
        reversed.extend_from_slice(middles);
        let last_name_first = reversed.join(" ");
        let first_initial_last = format!("{} {}", initial(first), last);

        let mut alternates = IndexSet::new();
        alternates.insert(normalized.clone());

        let rest = tokens[1..].join(" ");
        if let Some(swap) = nickname_swap(first) {
            alternates.insert(format!("{swap} {rest}"));
        }
        if let Some(dedotted) = dedotted_first_token(name) {
            alternates.insert(format!("{dedotted} {rest}"));
        }

        Self {
            normalized,
            last_name_first,
            first_initial_last,
            alternates,
        }
    }

    /// The variation set used for scoring: the normalized form followed by the
    /// nickname swap and de-dotted spelling when present.
    ///
    /// The reordered and initial forms are deliberately left out; scoring
    /// "j smith" against "j smith" would tie every J. Smith at 1.0.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.alternates.iter().map(String::as_str)
    }

    /// Keys probed against an exact-name map: the variation set plus the
    /// last-name-first ordering.
    pub fn lookup_keys(&self) -> impl Iterator<Item = &str> {
        let reordered = (self.last_name_first != self.normalized)
            .then_some(self.last_name_first.as_str());
        self.iter().chain(reordered)
    }

    pub fn len(&self) -> usize {
        self.alternates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Last whitespace token of the normalized form.
    pub fn last_name(&self) -> &str {
        self.normalized.rsplit(' ').next().unwrap_or("")
    }

    /// `Some("<initial> <last>")` for multi-token names.
    pub fn initial_last_key(&self) -> Option<&str> {
        if self.normalized.contains(' ') {
            Some(&self.first_initial_last)
        } else {
            None
        }
    }
}

fn initial(token: &str) -> String {
    token.chars().next().map(String::from).unwrap_or_default()
}

fn nickname_swap(first: &str) -> Option<&'static str> {
    NICKNAMES.iter().find_map(|&(full, short)| {
        if first == full {
            Some(short)
        } else if first == short {
            Some(full)
        } else {
            None
        }
    })
}

/// The raw first token with its periods removed, when it had any.
fn dedotted_first_token(raw: &str) -> Option<String> {
    let first = raw.split_whitespace().next()?;
    if !first.contains('.') {
        return None;
    }
    let dedotted = normalize(&first.replace('.', ""));
    if dedotted.is_empty() {
        None
    } else {
        Some(dedotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_punctuation_and_suffixes() {
        assert_eq!(normalize("  Odell  Beckham Jr. "), "odell beckham");
        assert_eq!(normalize("Ja'Marr Chase"), "jamarr chase");
        assert_eq!(normalize("Amon-Ra St. Brown"), "amonra st brown");
        assert_eq!(normalize("Kenneth Walker III"), "kenneth walker");
        assert_eq!(normalize("D.J. Moore"), "dj moore");
    }

    #[test]
    fn suffix_removal_is_whole_word_only() {
        assert_eq!(normalize("Vince Iverson"), "vince iverson");
        assert_eq!(normalize("Justin Jefferson"), "justin jefferson");
    }

    #[test]
    fn empty_input_yields_single_empty_variation() {
        assert_eq!(normalize(""), "");
        let v = NameVariations::new("");
        assert!(v.is_empty());
        assert_eq!(v.len(), 1);
        assert_eq!(v.last_name_first, "");
    }

    #[test]
    fn single_token_names_share_all_forms() {
        let v = NameVariations::new("Hollywood");
        assert_eq!(v.normalized, "hollywood");
        assert_eq!(v.last_name_first, "hollywood");
        assert_eq!(v.first_initial_last, "hollywood");
        assert_eq!(v.iter().collect::<Vec<_>>(), vec!["hollywood"]);
        assert_eq!(v.initial_last_key(), None);
    }

    #[test]
    fn multi_token_forms() {
        let v = NameVariations::new("Travis Etienne Jr.");
        assert_eq!(v.normalized, "travis etienne");
        assert_eq!(v.last_name_first, "etienne travis");
        assert_eq!(v.first_initial_last, "t etienne");
        assert_eq!(v.last_name(), "etienne");

        let v = NameVariations::new("Marvin Ray Harrison");
        assert_eq!(v.last_name_first, "harrison marvin ray");
        assert_eq!(v.first_initial_last, "m harrison");
    }

    #[test]
    fn nickname_swaps_both_directions() {
        let full = NameVariations::new("Patrick Mahomes");
        assert!(full.iter().any(|s| s == "pat mahomes"));
        let short = NameVariations::new("Pat Mahomes");
        assert!(short.iter().any(|s| s == "patrick mahomes"));
        assert!(!short.iter().any(|s| s == "p mahomes"));
    }

    #[test]
    fn lookup_keys_add_reordered_form() {
        let v = NameVariations::new("Josh Allen");
        let keys: Vec<_> = v.lookup_keys().collect();
        assert_eq!(keys, vec!["josh allen", "joshua allen", "allen josh"]);

        let single = NameVariations::new("Hollywood");
        assert_eq!(single.lookup_keys().count(), 1);
    }

    #[test]
    fn dotted_first_token_adds_dedotted_variation() {
        let v = NameVariations::new("D.J. Moore");
        assert!(v.iter().any(|s| s == "dj moore"));
        assert_eq!(v.iter().next(), Some("dj moore"));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in ".{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn variations_start_with_normalized(s in "[A-Za-z .'-]{0,30}") {
            let v = NameVariations::new(&s);
            prop_assert_eq!(v.iter().next(), Some(v.normalized.as_str()));
        }
    }
}
