//! Pipeline variants and the volume variant router.
//!
//! Every external computation is identified by a [`PipelineVariant`]. Volume
//! estimation picks one of four variants from a closed
//! ([`VolumeCategory`], [`ApproximationMethod`]) pair; the remaining variants
//! are fixed per endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Selector enums
// ---------------------------------------------------------------------------

/// Geometric model of the volcanic edifice (`volumeType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCategory {
    Circular,
    Elliptical,
}

/// Approximation used to integrate the volume (`approximationType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproximationMethod {
    Approximation1,
    Approximation2,
}

impl FromStr for VolumeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "circular" => Ok(Self::Circular),
            "elliptical" => Ok(Self::Elliptical),
            other => Err(other.to_string()),
        }
    }
}

impl FromStr for ApproximationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "approximation1" => Ok(Self::Approximation1),
            "approximation2" => Ok(Self::Approximation2),
            other => Err(other.to_string()),
        }
    }
}

/// A validated volume selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantSelector {
    pub category: VolumeCategory,
    pub method: ApproximationMethod,
}

impl VariantSelector {
    /// Parse the raw multipart strings, failing with
    /// [`CoreError::UnknownVariant`] when either half is not recognised.
    pub fn parse(category: &str, method: &str) -> Result<Self, CoreError> {
        let unknown = || CoreError::UnknownVariant {
            category: category.to_string(),
            method: method.to_string(),
        };
        let category_parsed = category.parse::<VolumeCategory>().map_err(|_| unknown())?;
        let method_parsed = method.parse::<ApproximationMethod>().map_err(|_| unknown())?;
        Ok(Self {
            category: category_parsed,
            method: method_parsed,
        })
    }

    /// Resolve to the single pipeline variant for this pair.
    pub fn resolve(self) -> PipelineVariant {
        match (self.category, self.method) {
            (VolumeCategory::Circular, ApproximationMethod::Approximation1) => {
                PipelineVariant::CircularSemisphere
            }
            (VolumeCategory::Circular, ApproximationMethod::Approximation2) => {
                PipelineVariant::CircularCylinder
            }
            (VolumeCategory::Elliptical, ApproximationMethod::Approximation1) => {
                PipelineVariant::EllipticalSemiellipsoid
            }
            (VolumeCategory::Elliptical, ApproximationMethod::Approximation2) => {
                PipelineVariant::EllipticalCylinder
            }
        }
    }
}

/// Parse and resolve a raw (category, method) pair in one step.
pub fn resolve(category: &str, method: &str) -> Result<PipelineVariant, CoreError> {
    VariantSelector::parse(category, method).map(VariantSelector::resolve)
}

// ---------------------------------------------------------------------------
// Pipeline variants
// ---------------------------------------------------------------------------

/// Every external computation the service knows how to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineVariant {
    FullAnalysis,
    CircularSemisphere,
    CircularCylinder,
    EllipticalSemiellipsoid,
    EllipticalCylinder,
    ShadedRelief,
    Slopes,
    Curvatures,
}

impl PipelineVariant {
    pub const ALL: [PipelineVariant; 8] = [
        Self::FullAnalysis,
        Self::CircularSemisphere,
        Self::CircularCylinder,
        Self::EllipticalSemiellipsoid,
        Self::EllipticalCylinder,
        Self::ShadedRelief,
        Self::Slopes,
        Self::Curvatures,
    ];

    /// Stable identifier used in logs and the error log.
    pub fn id(self) -> &'static str {
        match self {
            Self::FullAnalysis => "full-analysis",
            Self::CircularSemisphere => "circular-semisphere",
            Self::CircularCylinder => "circular-cylinder",
            Self::EllipticalSemiellipsoid => "elliptical-semiellipsoid",
            Self::EllipticalCylinder => "elliptical-cylinder",
            Self::ShadedRelief => "shaded-relief",
            Self::Slopes => "slopes",
            Self::Curvatures => "curvatures",
        }
    }

    /// Script file name, relative to the configured scripts directory.
    pub fn script_file(self) -> &'static str {
        match self {
            Self::FullAnalysis => "complete_dem_analysis.py",
            Self::CircularSemisphere => "CircularVolcano_Approx1.py",
            Self::CircularCylinder => "CircularVolcano_Approx2.py",
            Self::EllipticalSemiellipsoid => "EllipticalVolcano_Approx1.py",
            Self::EllipticalCylinder => "EllipticalVolcano_Approx2.py",
            Self::ShadedRelief => "shaded_relief.py",
            Self::Slopes => "calculate_slopes.py",
            Self::Curvatures => "calculate_curvatures.py",
        }
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolution_table() {
        assert_eq!(
            resolve("circular", "approximation1").unwrap(),
            PipelineVariant::CircularSemisphere
        );
        assert_eq!(
            resolve("circular", "approximation2").unwrap(),
            PipelineVariant::CircularCylinder
        );
        assert_eq!(
            resolve("elliptical", "approximation1").unwrap(),
            PipelineVariant::EllipticalSemiellipsoid
        );
        assert_eq!(
            resolve("elliptical", "approximation2").unwrap(),
            PipelineVariant::EllipticalCylinder
        );
    }

    #[test]
    fn all_pairs_resolve_to_distinct_variants() {
        let mut seen = HashSet::new();
        for category in ["circular", "elliptical"] {
            for method in ["approximation1", "approximation2"] {
                assert!(seen.insert(resolve(category, method).unwrap()));
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn unknown_pairs_are_rejected() {
        for (category, method) in [
            ("conical", "approximation1"),
            ("circular", "approximation3"),
            ("", ""),
            ("Circular", "approximation1"),
            ("elliptical", "approx1"),
        ] {
            let err = resolve(category, method).unwrap_err();
            assert_matches!(err, CoreError::UnknownVariant { .. }, "{category}/{method}");
        }
    }

    #[test]
    fn unknown_variant_error_names_both_fields() {
        let err = resolve("conical", "approximation1").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("conical"));
        assert!(msg.contains("approximation1"));
    }

    #[test]
    fn variant_ids_and_scripts_are_unique() {
        let ids: HashSet<_> = PipelineVariant::ALL.iter().map(|v| v.id()).collect();
        let scripts: HashSet<_> = PipelineVariant::ALL.iter().map(|v| v.script_file()).collect();
        assert_eq!(ids.len(), PipelineVariant::ALL.len());
        assert_eq!(scripts.len(), PipelineVariant::ALL.len());
    }

    #[test]
    fn variant_serializes_as_id() {
        for variant in PipelineVariant::ALL {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, format!("\"{}\"", variant.id()));
        }
    }
}
