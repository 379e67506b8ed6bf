use crate::error::{Result, SkillmapError};
use crate::model::{Classification, FileRef};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Maps a file extension to its category and language.
pub trait Classifier: Send + Sync {
    fn classify(&self, extension: &str) -> Option<Classification>;
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("c", "systems", "C"),
    ("h", "systems", "C"),
    ("cc", "systems", "C++"),
    ("cpp", "systems", "C++"),
    ("cxx", "systems", "C++"),
    ("hh", "systems", "C++"),
    ("hpp", "systems", "C++"),
    ("ino", "systems", "Arduino"),
    ("rs", "systems", "Rust"),
    ("go", "systems", "Go"),
    ("zig", "systems", "Zig"),
    ("s", "systems", "Assembly"),
    ("asm", "systems", "Assembly"),
    ("ld", "systems", "Linker Script"),
    ("java", "application", "Java"),
    ("kt", "application", "Kotlin"),
    ("scala", "application", "Scala"),
    ("cs", "application", "C#"),
    ("swift", "application", "Swift"),
    ("m", "application", "Objective-C"),
    ("mm", "application", "Objective-C++"),
    ("py", "scripting", "Python"),
    ("rb", "scripting", "Ruby"),
    ("pl", "scripting", "Perl"),
    ("lua", "scripting", "Lua"),
    ("sh", "scripting", "Shell"),
    ("bash", "scripting", "Shell"),
    ("zsh", "scripting", "Shell"),
    ("el", "scripting", "Emacs Lisp"),
    ("vim", "scripting", "Vim Script"),
    ("hs", "functional", "Haskell"),
    ("ml", "functional", "OCaml"),
    ("ex", "functional", "Elixir"),
    ("exs", "functional", "Elixir"),
    ("erl", "functional", "Erlang"),
    ("clj", "functional", "Clojure"),
    ("lisp", "functional", "Common Lisp"),
    ("scm", "functional", "Scheme"),
    ("js", "web", "JavaScript"),
    ("jsx", "web", "JavaScript"),
    ("mjs", "web", "JavaScript"),
    ("ts", "web", "TypeScript"),
    ("tsx", "web", "TypeScript"),
    ("html", "web", "HTML"),
    ("htm", "web", "HTML"),
    ("css", "web", "CSS"),
    ("scss", "web", "Sass"),
    ("sass", "web", "Sass"),
    ("less", "web", "Less"),
    ("php", "web", "PHP"),
    ("vue", "web", "Vue"),
    ("erb", "web", "ERB"),
    ("json", "web", "JSON"),
    ("svg", "web", "SVG"),
    ("sql", "data", "SQL"),
    ("xml", "data", "XML"),
    ("yml", "data", "YAML"),
    ("yaml", "data", "YAML"),
    ("toml", "data", "TOML"),
    ("csv", "data", "CSV"),
    ("r", "data", "R"),
    ("mat", "data", "MATLAB"),
    ("md", "documentation", "Markdown"),
    ("markdown", "documentation", "Markdown"),
    ("rst", "documentation", "reStructuredText"),
    ("org", "documentation", "Org"),
    ("tex", "documentation", "TeX"),
    ("txt", "documentation", "Text"),
    ("makefile", "build", "Make"),
    ("mk", "build", "Make"),
    ("cmake", "build", "CMake"),
    ("gradle", "build", "Gradle"),
    ("dockerfile", "build", "Docker"),
];

/// Extension lookup table. Keys are stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTable {
    entries: HashMap<String, Classification>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (ext, category, language) in BUILTIN {
            table.insert(ext, Classification::new(*category, *language));
        }
        table
    }

    pub fn insert(&mut self, extension: &str, classification: Classification) {
        self.entries.insert(extension.to_lowercase(), classification);
    }

    /// Overlays entries from a JSON object of the form
    /// `{ "ext": { "category": "...", "language": "..." } }`.
    pub fn extend_from_json(&mut self, json: &str) -> Result<()> {
        #[derive(Deserialize)]
        struct Entry {
            category: String,
            language: String,
        }

        let parsed: BTreeMap<String, Entry> = serde_json::from_str(json)?;
        for (ext, entry) in parsed {
            if ext.is_empty() {
                return Err(SkillmapError::config("empty extension key in classifier table"));
            }
            self.insert(&ext, Classification::new(entry.category, entry.language));
        }
        Ok(())
    }

    /// Built-in table overlaid with the table stored at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut table = Self::builtin();
        table.extend_from_json(&raw)?;
        Ok(table)
    }
}

impl Classifier for ExtensionTable {
    fn classify(&self, extension: &str) -> Option<Classification> {
        self.entries.get(&extension.to_lowercase()).cloned()
    }
}

/// Counts extensions that had no classification, most frequent first.
pub fn unknown_extensions<'a, I>(files: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a FileRef>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for file in files {
        if file.classification().is_none() {
            *counts.entry(file.extension().to_string()).or_insert(0) += 1;
        }
    }
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
