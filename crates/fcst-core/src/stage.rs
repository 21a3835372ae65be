//! Stage ordering: the six resource kinds a run walks through
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six ordered resource kinds in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    DatasetGroup,
    Dataset,
    Import,
    Predictor,
    Forecast,
    Export,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [StageKind; 6] = [
        StageKind::DatasetGroup,
        StageKind::Dataset,
        StageKind::Import,
        StageKind::Predictor,
        StageKind::Forecast,
        StageKind::Export,
    ];

    /// Stages advanced by polling. The first two are created together at
    /// ingestion and never implicitly.
    pub const POLLABLE: [StageKind; 4] = [
        StageKind::Import,
        StageKind::Predictor,
        StageKind::Forecast,
        StageKind::Export,
    ];

    /// Position in the pipeline, starting at 0.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The immediately preceding stage.
    pub fn prerequisite(self) -> Option<StageKind> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    /// The stage whose identifier feeds this stage's create call. Equal to
    /// the prerequisite except for the predictor, which trains on the
    /// whole dataset group.
    pub fn creation_source(self) -> Option<StageKind> {
        match self {
            StageKind::Predictor => Some(StageKind::DatasetGroup),
            other => other.prerequisite(),
        }
    }

    pub fn is_pollable(self) -> bool {
        self.index() >= StageKind::Import.index()
    }

    /// Human readable label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            StageKind::DatasetGroup => "dataset group",
            StageKind::Dataset => "dataset",
            StageKind::Import => "import job",
            StageKind::Predictor => "predictor",
            StageKind::Forecast => "forecast",
            StageKind::Export => "export job",
        }
    }

    /// Remote registry resource type name.
    pub fn resource_type(self) -> &'static str {
        match self {
            StageKind::DatasetGroup => "DatasetGroup",
            StageKind::Dataset => "Dataset",
            StageKind::Import => "DatasetImportJob",
            StageKind::Predictor => "Predictor",
            StageKind::Forecast => "Forecast",
            StageKind::Export => "ForecastExportJob",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
