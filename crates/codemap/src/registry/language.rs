//! Language classification by manifest marker.

use std::path::Path;

/// Project language, determined by the first-matching manifest in a fixed
/// priority list. `Unknown` when no marker matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    TypeScript,
    Rust,
    Java,
    Unknown,
}

/// Marker filename → language, checked in this exact order.
const MARKERS: &[(&str, Language)] = &[
    ("go.mod", Language::Go),
    ("pyproject.toml", Language::Python),
    ("setup.py", Language::Python),
    ("package.json", Language::TypeScript),
    ("Cargo.toml", Language::Rust),
    ("build.gradle", Language::Java),
    ("pom.xml", Language::Java),
];

/// Classify a project rooted at `path` by testing the marker priority list.
pub fn classify(path: &Path) -> Language {
    for (marker, language) in MARKERS {
        if path.join(marker).is_file() {
            return *language;
        }
    }
    Language::Unknown
}
