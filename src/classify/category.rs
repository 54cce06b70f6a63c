use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Coarse waste-handling classification, distinct from the detector's raw
/// object vocabulary. The set is closed; which labels feed each category is
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteCategory {
    Organic,
    Recyclable,
    Trash,
}

impl WasteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WasteCategory::Organic => "organic",
            WasteCategory::Recyclable => "recyclable",
            WasteCategory::Trash => "trash",
        }
    }

    /// All categories, in announcement-priority order.
    pub fn all() -> [WasteCategory; 3] {
        [
            WasteCategory::Organic,
            WasteCategory::Recyclable,
            WasteCategory::Trash,
        ]
    }
}

impl std::fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static lookup from detector label to waste category.
///
/// Total over all strings: unlisted labels resolve to the default category.
/// Matching is case-insensitive; the table is built once at startup.
#[derive(Clone, Debug)]
pub struct CategoryMap {
    table: HashMap<String, WasteCategory>,
    default: WasteCategory,
}

impl CategoryMap {
    pub fn new(entries: HashMap<String, WasteCategory>, default: WasteCategory) -> Self {
        let table = entries
            .into_iter()
            .map(|(label, category)| (label.to_lowercase(), category))
            .collect();
        Self { table, default }
    }

    /// Mapping for the common detector vocabularies: the two-class waste
    /// model's own labels plus general-object labels seen when running a
    /// generic detector in front of the pipeline.
    pub fn with_defaults() -> Self {
        use WasteCategory::*;

        let entries = [
            // Two-class waste model vocabulary.
            ("organic", Organic),
            ("recyclable", Recyclable),
            // Food items.
            ("banana", Organic),
            ("apple", Organic),
            ("orange", Organic),
            ("carrot", Organic),
            ("broccoli", Organic),
            ("pizza", Organic),
            ("donut", Organic),
            ("cake", Organic),
            ("sandwich", Organic),
            ("hot dog", Organic),
            // Containers and packaging.
            ("bottle", Recyclable),
            ("cup", Recyclable),
            ("can", Recyclable),
            ("bowl", Recyclable),
            ("fork", Recyclable),
            ("knife", Recyclable),
            ("spoon", Recyclable),
            ("book", Recyclable),
            ("cardboard", Recyclable),
        ];

        let table = entries
            .into_iter()
            .map(|(label, category)| (label.to_string(), category))
            .collect();
        Self::new(table, Trash)
    }

    /// Map a raw detector label to a waste category. Never fails.
    pub fn map(&self, raw_label: &str) -> WasteCategory {
        self.table
            .get(&raw_label.to_lowercase())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn default_category(&self) -> WasteCategory {
        self.default
    }

    /// Known labels, sorted for stable presentation.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.table.keys().cloned().collect();
        labels.sort();
        labels
    }
}
