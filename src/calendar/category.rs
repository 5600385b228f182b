use serde::{Deserialize, Serialize};

/// Color used for labels that are not part of the category table.
pub const DEFAULT_COLOR: &str = "#667eea";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    DateNight,
    Anniversary,
    Birthday,
    Travel,
    Work,
    Family,
    Health,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::DateNight,
        Category::Anniversary,
        Category::Birthday,
        Category::Travel,
        Category::Work,
        Category::Family,
        Category::Health,
        Category::Other,
    ];

    /// Category assigned to records that carry no usable category.
    pub const FALLBACK: Category = Category::Other;

    /// Stable key used in stored records.
    pub fn key(self) -> &'static str {
        match self {
            Category::DateNight => "date-night",
            Category::Anniversary => "anniversary",
            Category::Birthday => "birthday",
            Category::Travel => "travel",
            Category::Work => "work",
            Category::Family => "family",
            Category::Health => "health",
            Category::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::DateNight => "Date Night",
            Category::Anniversary => "Anniversary",
            Category::Birthday => "Birthday",
            Category::Travel => "Travel",
            Category::Work => "Work",
            Category::Family => "Family",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Category::DateNight => "#e91e63",
            Category::Anniversary => "#9c27b0",
            Category::Birthday => "#ff9800",
            Category::Travel => "#03a9f4",
            Category::Work => "#607d8b",
            Category::Family => "#4caf50",
            Category::Health => "#f44336",
            Category::Other => DEFAULT_COLOR,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Category::DateNight => "💕",
            Category::Anniversary => "💍",
            Category::Birthday => "🎂",
            Category::Travel => "✈️",
            Category::Work => "💼",
            Category::Family => "🏡",
            Category::Health => "🩺",
            Category::Other => "📌",
        }
    }

    /// Accepts either the stored key or the display label, ignoring case.
    pub fn from_label(value: &str) -> Option<Self> {
        let needle = value.trim();
        Self::ALL.into_iter().find(|category| {
            category.key().eq_ignore_ascii_case(needle) || category.label().eq_ignore_ascii_case(needle)
        })
    }

    /// Like [`Category::from_label`], but unknown or missing labels resolve to the fallback.
    pub fn from_label_or_fallback(value: Option<&str>) -> Self {
        value.and_then(Self::from_label).unwrap_or(Self::FALLBACK)
    }
}

/// Color for an arbitrary category label. Unknown labels get [`DEFAULT_COLOR`].
pub fn category_color(label: &str) -> &'static str {
    Category::from_label(label)
        .map(Category::color)
        .unwrap_or(DEFAULT_COLOR)
}
