//! Rice leaf disease labels and the agronomic catalog attached to them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification label produced by the model.
///
/// Variants are declared in model output order: the score at output index
/// `i` belongs to `DiseaseKey::ALL[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseKey {
    BacterialBlight,
    BrownSpot,
    Healthy,
    LeafBlast,
    Tungro,
}

impl DiseaseKey {
    /// Every label, in model output order.
    pub const ALL: [DiseaseKey; 5] = [
        DiseaseKey::BacterialBlight,
        DiseaseKey::BrownSpot,
        DiseaseKey::Healthy,
        DiseaseKey::LeafBlast,
        DiseaseKey::Tungro,
    ];

    /// Number of labels the model must emit scores for.
    pub const COUNT: usize = Self::ALL.len();

    /// Canonical string identifier (e.g. `leaf_blast`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseKey::BacterialBlight => "bacterial_blight",
            DiseaseKey::BrownSpot => "brown_spot",
            DiseaseKey::Healthy => "healthy",
            DiseaseKey::LeafBlast => "leaf_blast",
            DiseaseKey::Tungro => "tungro",
        }
    }

    /// Position of this label in the model output vector.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Label for a model output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display name, description and recommendations for this label.
    pub fn info(&self) -> DiseaseInfo {
        match self {
            DiseaseKey::BacterialBlight => DiseaseInfo {
                key: *self,
                name: "Bacterial Blight",
                description: "Bacterial disease causing water-soaked lesions on leaf margins",
                recommendations: &[
                    "Use resistant rice varieties",
                    "Apply bactericides (copper-based products)",
                    "Avoid excessive nitrogen fertilization",
                    "Ensure proper field drainage",
                    "Remove and destroy infected plants",
                ],
            },
            DiseaseKey::BrownSpot => DiseaseInfo {
                key: *self,
                name: "Brown Spot",
                description: "Fungal disease causing brown, oval spots with gray centers",
                recommendations: &[
                    "Apply fungicides (propiconazole, tebuconazole)",
                    "Use balanced fertilization",
                    "Ensure adequate water management",
                    "Remove infected plant debris",
                    "Crop rotation with non-host plants",
                ],
            },
            DiseaseKey::Healthy => DiseaseInfo {
                key: *self,
                name: "Healthy Leaf",
                description: "No disease detected - leaf appears healthy",
                recommendations: &[
                    "Continue regular monitoring",
                    "Maintain proper water management",
                    "Apply balanced fertilization",
                    "Practice good crop management",
                    "Schedule regular field inspections",
                ],
            },
            DiseaseKey::LeafBlast => DiseaseInfo {
                key: *self,
                name: "Leaf Blast",
                description: "Fungal disease causing diamond-shaped lesions with gray centers",
                recommendations: &[
                    "Apply systemic fungicides (tricyclazole, azoxystrobin)",
                    "Use resistant varieties",
                    "Avoid excessive nitrogen",
                    "Maintain proper plant spacing",
                    "Ensure good air circulation",
                ],
            },
            DiseaseKey::Tungro => DiseaseInfo {
                key: *self,
                name: "Tungro",
                description: "Viral disease causing yellow-orange discoloration and stunting",
                recommendations: &[
                    "Control green leafhopper vectors",
                    "Use tungro-resistant varieties",
                    "Practice synchronous planting",
                    "Remove weed hosts",
                    "Apply insecticides for vector control",
                ],
            },
        }
    }
}

impl fmt::Display for DiseaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiseaseKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown disease key: {}", s))
    }
}

/// Human-facing information about a disease label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseInfo {
    pub key: DiseaseKey,
    pub name: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}
