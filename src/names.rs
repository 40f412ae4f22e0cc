use crate::block::NameKind;
use serde::Deserialize;

/// Pseudo-variables every sprite can read, with the reporter that produces them.
const BUILT_INS: &[(&str, &str, Option<(&str, &str)>)] = &[
    ("size", "looks_size", None),
    ("x position", "motion_xposition", None),
    ("y position", "motion_yposition", None),
    ("direction", "motion_direction", None),
    ("costume #", "looks_costumenumbername", Some(("NUMBER_NAME", "number"))),
    ("costume name", "looks_costumenumbername", Some(("NUMBER_NAME", "name"))),
    ("volume", "sound_volume", None),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownName {
    pub name: String,
    pub id: String,
    pub kind: NameKind,
}

/// One `{name, id}` entry as supplied by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NameEntry {
    pub name: String,
    #[serde(default)]
    pub id: String,
}

impl NameEntry {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// JSON shape accepted by the CLI and the wasm bindings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NameTable {
    pub globals: Vec<NameEntry>,
    pub locals: Vec<NameEntry>,
    pub sprites: Vec<NameEntry>,
}

impl NameTable {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Names visible to the resolver. Lookup is exact; the first entry wins in
/// the order globals, locals, built-ins, sprites.
#[derive(Debug, Clone)]
pub struct KnownNames {
    entries: Vec<KnownName>,
}

impl KnownNames {
    pub fn new(globals: &[NameEntry], locals: &[NameEntry], sprites: &[NameEntry]) -> Self {
        let capacity = globals.len() + locals.len() + sprites.len() + BUILT_INS.len();
        let mut entries = Vec::with_capacity(capacity);
        entries.extend(globals.iter().map(|e| entry(e, NameKind::GlobalVariable)));
        entries.extend(locals.iter().map(|e| entry(e, NameKind::LocalVariable)));
        entries.extend(BUILT_INS.iter().map(|(name, _, _)| KnownName {
            name: name.to_string(),
            id: name.to_string(),
            kind: NameKind::BuiltIn,
        }));
        entries.extend(sprites.iter().map(|e| entry(e, NameKind::Sprite)));
        Self { entries }
    }

    /// Only the built-in pseudo-variables.
    pub fn builtins_only() -> Self {
        Self::new(&[], &[], &[])
    }

    pub fn lookup(&self, name: &str) -> Option<&KnownName> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&KnownName> {
        self.entries
            .iter()
            .find(|e| e.kind.is_variable() && e.name == name)
    }
}

impl Default for KnownNames {
    fn default() -> Self {
        Self::builtins_only()
    }
}

impl From<&NameTable> for KnownNames {
    fn from(table: &NameTable) -> Self {
        Self::new(&table.globals, &table.locals, &table.sprites)
    }
}

fn entry(e: &NameEntry, kind: NameKind) -> KnownName {
    KnownName {
        name: e.name.clone(),
        id: e.id.clone(),
        kind,
    }
}

/// Reporter opcode (and fixed field) standing in for a built-in pseudo-variable.
pub fn builtin_reporter(
    name: &str,
) -> Option<(&'static str, Option<(&'static str, &'static str)>)> {
    BUILT_INS
        .iter()
        .find(|(builtin, _, _)| *builtin == name)
        .map(|(_, opcode, field)| (*opcode, *field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_shadow_sprites_and_builtins() {
        let names = KnownNames::new(
            &[NameEntry::new("size", "g-size")],
            &[NameEntry::new("Cat", "l-cat")],
            &[NameEntry::new("Cat", "s-cat")],
        );
        assert_eq!(names.lookup("size").map(|n| n.kind), Some(NameKind::GlobalVariable));
        assert_eq!(names.lookup("Cat").map(|n| n.id.as_str()), Some("l-cat"));
        assert_eq!(names.lookup("x position").map(|n| n.kind), Some(NameKind::BuiltIn));
        assert!(names.lookup("cat").is_none());
    }

    #[test]
    fn name_table_parses_with_missing_sections() {
        let table = NameTable::from_json(r#"{"globals": [{"name": "Score", "id": "v1"}]}"#)
            .expect("valid table");
        assert_eq!(table.globals.len(), 1);
        assert!(table.sprites.is_empty());
        let names = KnownNames::from(&table);
        assert_eq!(names.lookup_variable("Score").map(|n| n.id.as_str()), Some("v1"));
    }

    #[test]
    fn builtin_reporters_cover_costume_variants() {
        assert_eq!(
            builtin_reporter("costume name"),
            Some(("looks_costumenumbername", Some(("NUMBER_NAME", "name"))))
        );
        assert!(builtin_reporter("score").is_none());
    }
}
