//! Advisory conflict detection over an instance's enabled mods.
//!
//! Pure functions of the enabled-mod list: no filesystem or state access, so they can run at
//! any time, including before an instance was ever activated. Warnings never block activation.

use crate::models::ModId;
use crate::models::config::default_ai_keywords;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// One advisory warning, tagged with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictWarning {
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for ConflictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A single independent check.
pub trait ConflictRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the enabled mods (in instance order) and return warnings in a stable order.
    fn evaluate(&self, enabled: &[ModId]) -> Vec<ConflictWarning>;
}

/// Flags more than one mod that looks like it changes AI behaviour.
pub struct AiBehaviorRule {
    keywords: Vec<String>,
    word_pattern: Regex,
}

impl AiBehaviorRule {
    pub const NAME: &'static str = "ai-behavior";

    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            // Upper-case runs, capitalised words, lower-case runs and digit runs
            word_pattern: Regex::new(r"[A-Z]+(?:[a-z]+)?|[a-z]+|[0-9]+")
                .expect("Invalid word regex"),
        }
    }

    /// Split `SWATOfficerAI_v2` into `swat`, `officer`, `ai`, `v`, `2`.
    fn words(&self, name: &str) -> Vec<String> {
        let mut words = Vec::new();
        for m in self.word_pattern.find_iter(name) {
            let token = m.as_str();
            // "SWATOfficer" matches as "SWATO" + "fficer"; split an upper-case run that
            // swallowed the first letter of the next capitalised word.
            let upper_len = token.chars().take_while(|c| c.is_ascii_uppercase()).count();
            if upper_len > 1 && upper_len < token.len() {
                let (head, tail) = token.split_at(upper_len - 1);
                words.push(head.to_lowercase());
                words.push(tail.to_lowercase());
            } else {
                words.push(token.to_lowercase());
            }
        }
        words
    }

    fn matches(&self, id: &ModId) -> bool {
        self.words(id.stem())
            .iter()
            .any(|word| self.keywords.iter().any(|k| k == word))
    }
}

impl Default for AiBehaviorRule {
    fn default() -> Self {
        Self::new(default_ai_keywords())
    }
}

impl ConflictRule for AiBehaviorRule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, enabled: &[ModId]) -> Vec<ConflictWarning> {
        let ai_mods: Vec<&str> = enabled
            .iter()
            .filter(|id| self.matches(id))
            .map(|id| id.stem())
            .collect();

        if ai_mods.len() > 1 {
            vec![ConflictWarning {
                rule: Self::NAME,
                message: format!(
                    "Multiple AI-related mods detected: {}. These may conflict.",
                    ai_mods.join(", ")
                ),
            }]
        } else {
            Vec::new()
        }
    }
}

/// Flags mods whose names only differ by a trailing version suffix (`Foo_v1` / `Foo-v2.1`).
pub struct DuplicateVersionRule {
    version_suffix: Regex,
}

impl DuplicateVersionRule {
    pub const NAME: &'static str = "duplicate-version";

    pub fn new() -> Self {
        Self {
            version_suffix: Regex::new(r"[_-]v\d[\w.]*$").expect("Invalid version suffix regex"),
        }
    }

    /// Lower-cased stem with any trailing version suffix removed.
    pub fn base_name(&self, id: &ModId) -> String {
        let stem = id.stem().to_lowercase();
        self.version_suffix.replace(&stem, "").into_owned()
    }
}

impl Default for DuplicateVersionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictRule for DuplicateVersionRule {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, enabled: &[ModId]) -> Vec<ConflictWarning> {
        let mut seen: HashMap<String, &ModId> = HashMap::new();
        let mut warnings = Vec::new();

        for id in enabled {
            let base = self.base_name(id);
            match seen.get(&base) {
                Some(first) => warnings.push(ConflictWarning {
                    rule: Self::NAME,
                    message: format!(
                        "Similar mods detected: '{}' and '{}'. These may be duplicate versions.",
                        first.stem(),
                        id.stem()
                    ),
                }),
                None => {
                    seen.insert(base, id);
                }
            }
        }
        warnings
    }
}

/// Ordered collection of rules; warnings come back in rule order.
pub struct ConflictDetector {
    rules: Vec<Box<dyn ConflictRule>>,
}

impl ConflictDetector {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rules, using `ai_keywords` for the AI behaviour heuristic.
    pub fn with_default_rules<I, S>(ai_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::empty()
            .with_rule(AiBehaviorRule::new(ai_keywords))
            .with_rule(DuplicateVersionRule::new())
    }

    pub fn with_rule<R: ConflictRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(&self, enabled: &[ModId]) -> Vec<ConflictWarning> {
        self.rules
            .iter()
            .flat_map(|rule| rule.evaluate(enabled))
            .collect()
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::with_default_rules(default_ai_keywords())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ModId> {
        names.iter().map(|n| ModId::from(*n)).collect()
    }

    #[test]
    fn test_word_splitting() {
        let rule = AiBehaviorRule::default();
        assert_eq!(rule.words("SWATOfficerAI_v2"), vec!["swat", "officer", "ai", "v", "2"]);
        assert_eq!(rule.words("RealisticHUD"), vec!["realistic", "hud"]);
        assert_eq!(rule.words("better-suspects"), vec!["better", "suspects"]);
    }

    #[test]
    fn test_single_ai_mod_is_fine() {
        let rule = AiBehaviorRule::default();
        assert!(rule.evaluate(&ids(&["SmarterAI.pak", "WeaponPack.pak"])).is_empty());
    }

    #[test]
    fn test_multiple_ai_mods_warn_once() {
        let rule = AiBehaviorRule::default();
        let warnings = rule.evaluate(&ids(&[
            "SmarterAI.pak",
            "WeaponPack.pak",
            "Better_Suspects.pak",
        ]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].message,
            "Multiple AI-related mods detected: SmarterAI, Better_Suspects. These may conflict."
        );
    }

    #[test]
    fn test_keyword_must_be_a_whole_word() {
        let rule = AiBehaviorRule::default();
        // "Raid" and "Trail" contain "ai" but not as a word
        assert!(rule.evaluate(&ids(&["RaidPack.pak", "TrailMarkers.pak"])).is_empty());
    }

    #[test]
    fn test_custom_keywords() {
        let rule = AiBehaviorRule::new(["npc"]);
        assert_eq!(rule.evaluate(&ids(&["NPC_Tweaks.pak", "npc-voices.pak"])).len(), 1);
    }

    #[test]
    fn test_base_name_strips_version_suffix() {
        let rule = DuplicateVersionRule::new();
        assert_eq!(rule.base_name(&ModId::from("WeaponPack_v1.2.pak")), "weaponpack");
        assert_eq!(rule.base_name(&ModId::from("HUDFix-v3.pak")), "hudfix");
        assert_eq!(rule.base_name(&ModId::from("Vehicles_vanilla.pak")), "vehicles_vanilla");
    }

    #[test]
    fn test_duplicate_versions() {
        let rule = DuplicateVersionRule::new();
        let warnings = rule.evaluate(&ids(&[
            "WeaponPack_v1.pak",
            "HUDFix.pak",
            "WeaponPack_v2.pak",
            "weaponpack.pak",
        ]));
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].message.contains("'WeaponPack_v1' and 'WeaponPack_v2'"));
        assert!(warnings[1].message.contains("'WeaponPack_v1' and 'weaponpack'"));
    }

    #[test]
    fn test_detector_keeps_rule_order() {
        let detector = ConflictDetector::default();
        assert_eq!(detector.rule_names(), vec!["ai-behavior", "duplicate-version"]);

        let warnings = detector.evaluate(&ids(&[
            "Foo_v1.pak",
            "SmarterAI.pak",
            "Foo_v2.pak",
            "SWATCommands.pak",
        ]));
        let rules: Vec<&str> = warnings.iter().map(|w| w.rule).collect();
        assert_eq!(rules, vec!["ai-behavior", "duplicate-version"]);
    }

    #[test]
    fn test_custom_rule_plugs_in() {
        struct TooMany;
        impl ConflictRule for TooMany {
            fn name(&self) -> &'static str {
                "too-many"
            }
            fn evaluate(&self, enabled: &[ModId]) -> Vec<ConflictWarning> {
                if enabled.len() > 2 {
                    vec![ConflictWarning {
                        rule: "too-many",
                        message: format!("{} mods enabled", enabled.len()),
                    }]
                } else {
                    Vec::new()
                }
            }
        }

        let detector = ConflictDetector::empty().with_rule(TooMany);
        let warnings = detector.evaluate(&ids(&["a.pak", "b.pak", "c.pak"]));
        assert_eq!(warnings[0].to_string(), "3 mods enabled");
    }

    #[test]
    fn test_no_mods_no_warnings() {
        assert!(ConflictDetector::default().evaluate(&[]).is_empty());
    }
}
