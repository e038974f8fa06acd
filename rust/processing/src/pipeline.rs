// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end run: points in, validated network out.
//!
//! detect → classify → merge → (intersections ‖ underground) → fittings →
//! network. Everything up to fitting resolution runs on the worker pool;
//! materialization goes through the sink sequentially.

use crate::config::PipelineConfig;
use crate::error::Result;
use pipescan_core::{ElementId, PointCloudRegion, SystemType, UtilityElement, UtilityType};
use pipescan_detect::{
    classify, merge_segments, Classification, DetectionCapability, HeuristicCapability,
    PrimitiveDetector, Rejection, StructuralElement,
};
use pipescan_geometry::{GroundSurface, Point3D};
use pipescan_network::{
    analyze_intersections, create_network, resolve_fitting, AuthoringSink, CatalogCache,
    FittingCatalog, FittingSelection, Intersection, NetworkResult,
};
use pipescan_underground::{analyze_underground, UndergroundReport};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// What detection and classification produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Primitives that passed detection
    pub primitives: usize,
    /// Utility count per type, before merging
    pub utilities: BTreeMap<UtilityType, usize>,
    pub structural: Vec<StructuralElement>,
    pub rejected: Vec<Rejection>,
}

impl ClassificationSummary {
    fn from_classification(primitives: usize, classification: &Classification) -> Self {
        Self {
            primitives,
            utilities: classification
                .by_type
                .iter()
                .map(|(t, elements)| (*t, elements.len()))
                .collect(),
            structural: classification.structural.clone(),
            rejected: classification.rejected.clone(),
        }
    }
}

/// Catalog choice for one junction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFitting {
    pub participants: Vec<ElementId>,
    pub point: Point3D,
    pub selection: FittingSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub region: String,
    pub summary: ClassificationSummary,
    /// Merged runs, sorted by id
    pub elements: Vec<UtilityElement>,
    pub intersections: Vec<Intersection>,
    /// One per intersection, same order
    pub fittings: Vec<ResolvedFitting>,
    pub underground: UndergroundReport,
    pub network: NetworkResult,
}

impl PipelineReport {
    pub fn unresolved_fittings(&self) -> usize {
        self.fittings
            .iter()
            .filter(|f| !f.selection.is_resolved())
            .count()
    }

    /// Anything a reviewer has to look at
    pub fn has_issues(&self) -> bool {
        self.underground.issue_count() > 0
            || self.unresolved_fittings() > 0
            || self.network.has_errors()
    }
}

/// Stages that only read their inputs
struct Analysis {
    summary: ClassificationSummary,
    elements: Vec<UtilityElement>,
    intersections: Vec<Intersection>,
    fittings: Vec<ResolvedFitting>,
    underground: UndergroundReport,
}

pub struct Pipeline<C> {
    detector: PrimitiveDetector<C>,
    config: PipelineConfig,
    catalog: Arc<CatalogCache>,
    pool: Option<rayon::ThreadPool>,
}

impl Pipeline<HeuristicCapability> {
    /// Pipeline with the built-in PCA capability
    pub fn heuristic(config: PipelineConfig) -> Result<Self> {
        let capability = HeuristicCapability::new(config.heuristic.clone());
        Self::new(capability, config)
    }
}

impl<C: DetectionCapability> Pipeline<C> {
    /// Validates `config` and starts a dedicated worker pool when
    /// `worker_threads` is set. Uses the standard fitting catalog.
    pub fn new(capability: C, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.worker_threads {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };
        let detector = PrimitiveDetector::new(capability, config.detection.clone())
            .with_classifier(config.classifier.clone());
        Ok(Self {
            detector,
            config,
            catalog: Arc::new(CatalogCache::new(FittingCatalog::standard())),
            pool,
        })
    }

    /// Share a catalog cache with other pipelines
    pub fn with_catalog(mut self, catalog: Arc<CatalogCache>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<CatalogCache> {
        &self.catalog
    }

    /// Run every stage over `region`.
    ///
    /// `existing` are runs already in the ground; they only take part in
    /// clash detection. Per-item network failures land in
    /// `report.network.errors`; everything else that fails aborts the run.
    pub fn run<G, S>(
        &self,
        region: &PointCloudRegion,
        ground: &G,
        existing: &[UtilityElement],
        sink: &mut S,
    ) -> Result<PipelineReport>
    where
        G: GroundSurface + ?Sized,
        S: AuthoringSink + ?Sized,
    {
        let started = Instant::now();
        tracing::info!(region = %region.id, points = region.len(), "pipeline started");

        let analysis = match &self.pool {
            Some(pool) => pool.install(|| self.analyze(region, ground, existing)),
            None => self.analyze(region, ground, existing),
        }?;

        let network = create_network(
            &analysis.elements,
            &self.config.network,
            &self.catalog.snapshot(),
            sink,
        )?;

        let report = PipelineReport {
            region: region.id.clone(),
            summary: analysis.summary,
            elements: analysis.elements,
            intersections: analysis.intersections,
            fittings: analysis.fittings,
            underground: analysis.underground,
            network,
        };
        tracing::info!(
            elements = report.elements.len(),
            intersections = report.intersections.len(),
            unresolved_fittings = report.unresolved_fittings(),
            clashes = report.underground.clashes.len(),
            depth_violations = report.underground.depth.violations.len(),
            runs = report.network.created_elements.len(),
            item_errors = report.network.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline complete"
        );
        Ok(report)
    }

    fn analyze<G: GroundSurface + ?Sized>(
        &self,
        region: &PointCloudRegion,
        ground: &G,
        existing: &[UtilityElement],
    ) -> Result<Analysis> {
        let primitives = self.detector.detect(region)?;
        let classification = classify(&primitives, &self.config.classifier);
        let summary = ClassificationSummary::from_classification(primitives.len(), &classification);
        tracing::debug!(
            primitives = primitives.len(),
            utilities = classification.utility_count(),
            structural = classification.structural.len(),
            rejected = classification.rejected.len(),
            "classification done"
        );

        let elements = merge_segments(&classification.into_utilities(), &self.config.merge)?;
        tracing::debug!(runs = elements.len(), "segments merged");

        let (intersections, underground) = rayon::join(
            || analyze_intersections(&elements, &self.config.intersection),
            || analyze_underground(existing, &elements, ground, &self.config.underground),
        );
        let intersections = intersections?;
        let underground = underground?;

        let fittings = self.resolve_fittings(&elements, &intersections)?;

        Ok(Analysis {
            summary,
            elements,
            intersections,
            fittings,
            underground,
        })
    }

    fn resolve_fittings(
        &self,
        elements: &[UtilityElement],
        intersections: &[Intersection],
    ) -> Result<Vec<ResolvedFitting>> {
        let catalog = self.catalog.snapshot();
        let systems: FxHashMap<ElementId, SystemType> =
            elements.iter().map(|e| (e.id, e.system_type)).collect();

        let mut fittings = Vec::with_capacity(intersections.len());
        for junction in intersections {
            // Lowest-id participant with a known system decides the hint
            let hint = junction
                .participants
                .iter()
                .filter_map(|id| systems.get(id).copied())
                .find(|s| *s != SystemType::Unknown);
            let selection =
                resolve_fitting(&catalog, junction.topology, &junction.diameters, hint)?;
            fittings.push(ResolvedFitting {
                participants: junction.participants.clone(),
                point: junction.point,
                selection,
            });
        }
        Ok(fittings)
    }
}
