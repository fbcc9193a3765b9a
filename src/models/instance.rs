use super::ModId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an instance.
///
/// Derived from the display name at creation time and kept across renames, so persisted
/// records and the active-instance pointer never need rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an identifier read back from storage or typed by the user.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Slugify a display name: lower-case ASCII alphanumerics, other runs collapsed to `-`.
    ///
    /// Returns `None` when nothing usable remains (empty or punctuation-only names).
    pub fn from_name(name: &str) -> Option<Self> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One mod selection inside an instance. Its position is its index in [`Instance::mods`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRef {
    #[serde(rename = "id")]
    pub mod_id: ModId,
    pub enabled: bool,
}

/// A named profile: an ordered selection of library mods with per-mod enabled flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    /// RFC 3339 creation timestamp
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub mods: Vec<ModRef>,
}

impl Instance {
    pub fn new(id: InstanceId, name: impl Into<String>, created: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created: created.into(),
            mods: Vec::new(),
        }
    }

    /// Enabled mod identifiers, in list order.
    pub fn enabled_mods(&self) -> impl Iterator<Item = &ModId> + '_ {
        self.mods
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| &entry.mod_id)
    }

    pub fn enabled_count(&self) -> usize {
        self.mods.iter().filter(|entry| entry.enabled).count()
    }

    pub fn position_of(&self, mod_id: &ModId) -> Option<usize> {
        self.mods.iter().position(|entry| &entry.mod_id == mod_id)
    }

    pub fn contains(&self, mod_id: &ModId) -> bool {
        self.position_of(mod_id).is_some()
    }

    /// Append an enabled mod. Returns `false` if the instance already references it.
    pub fn add_mod(&mut self, mod_id: ModId) -> bool {
        if self.contains(&mod_id) {
            return false;
        }
        self.mods.push(ModRef {
            mod_id,
            enabled: true,
        });
        true
    }

    pub fn remove_mod(&mut self, mod_id: &ModId) -> bool {
        let before = self.mods.len();
        self.mods.retain(|entry| &entry.mod_id != mod_id);
        self.mods.len() != before
    }

    /// Returns `false` if the mod is not part of this instance.
    pub fn set_enabled(&mut self, mod_id: &ModId, enabled: bool) -> bool {
        match self.mods.iter_mut().find(|entry| &entry.mod_id == mod_id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn move_up(&mut self, index: usize) {
        if index == 0 || index >= self.mods.len() {
            return;
        }
        self.mods.swap(index, index - 1);
    }

    pub fn move_down(&mut self, index: usize) {
        if index + 1 >= self.mods.len() {
            return;
        }
        self.mods.swap(index, index + 1);
    }

    /// Move a mod to `position`, clamped to the end of the list.
    pub fn move_to(&mut self, mod_id: &ModId, position: usize) -> bool {
        let Some(from) = self.position_of(mod_id) else {
            return false;
        };
        let entry = self.mods.remove(from);
        let to = position.min(self.mods.len());
        self.mods.insert(to, entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Instance {
        let mut instance = Instance::new(InstanceId::new("realism"), "Realism", "");
        instance.add_mod(ModId::from("WeaponPack.pak"));
        instance.add_mod(ModId::from("RealisticHUD.pak"));
        instance.add_mod(ModId::from("AITweaks.pak"));
        instance
    }

    #[test]
    fn test_instance_id_from_name() {
        assert_eq!(InstanceId::from_name("Realism").unwrap().as_str(), "realism");
        assert_eq!(InstanceId::from_name("  PvP / Night  ").unwrap().as_str(), "pvp-night");
        assert!(InstanceId::from_name("").is_none());
        assert!(InstanceId::from_name("--- !").is_none());
    }

    #[test]
    fn test_add_mod_rejects_duplicates() {
        let mut instance = sample();
        assert!(!instance.add_mod(ModId::from("WeaponPack.pak")));
        assert_eq!(instance.mods.len(), 3);
    }

    #[test]
    fn test_enabled_mods_follow_list_order() {
        let mut instance = sample();
        instance.set_enabled(&ModId::from("AITweaks.pak"), false);

        let enabled: Vec<&str> = instance.enabled_mods().map(ModId::as_str).collect();
        assert_eq!(enabled, vec!["WeaponPack.pak", "RealisticHUD.pak"]);
        assert_eq!(instance.enabled_count(), 2);
    }

    #[test]
    fn test_set_enabled_unknown_mod() {
        let mut instance = sample();
        assert!(!instance.set_enabled(&ModId::from("Missing.pak"), true));
    }

    #[test]
    fn test_reordering() {
        let mut instance = sample();
        instance.move_down(0);
        assert_eq!(instance.position_of(&ModId::from("WeaponPack.pak")), Some(1));
        instance.move_up(1);
        assert_eq!(instance.position_of(&ModId::from("WeaponPack.pak")), Some(0));

        assert!(instance.move_to(&ModId::from("WeaponPack.pak"), 99));
        assert_eq!(instance.position_of(&ModId::from("WeaponPack.pak")), Some(2));
        assert!(!instance.move_to(&ModId::from("Nope.pak"), 0));
    }

    #[test]
    fn test_remove_mod() {
        let mut instance = sample();
        assert!(instance.remove_mod(&ModId::from("RealisticHUD.pak")));
        assert!(!instance.remove_mod(&ModId::from("RealisticHUD.pak")));
        assert_eq!(instance.mods.len(), 2);
    }

    #[test]
    fn test_instance_json_layout() {
        let instance = sample();
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["id"], "realism");
        assert_eq!(json["mods"][0]["id"], "WeaponPack.pak");
        assert_eq!(json["mods"][0]["enabled"], true);
    }
}
