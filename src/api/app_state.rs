use std::sync::Arc;

use crate::config::config::GSuiteConfig;
use crate::error::Result;
use crate::format::OutputFormatters;
use crate::metamodel::store::MetamodelStore;
use crate::services::{
    CatalogService, SearchService, ValuesService, create_catalog_service, create_search_service,
    create_values_service,
};
use crate::storage::repository::RecordStore;

/// Application state containing all shared services
#[derive(Clone)]
pub struct AppState {
    /// Repository, hub, metamodel and attribute browsing
    pub catalog_service: Arc<dyn CatalogService>,
    /// Distinct values of leaf attributes
    pub values_service: Arc<dyn ValuesService>,
    /// Content search over joined records
    pub search_service: Arc<dyn SearchService>,
    /// JSON / GSuite output
    pub formatters: Arc<OutputFormatters>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("catalog_service", &"Arc<dyn CatalogService>")
            .field("values_service", &"Arc<dyn ValuesService>")
            .field("search_service", &"Arc<dyn SearchService>")
            .field("formatters", &"Arc<OutputFormatters>")
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        catalog_service: Arc<dyn CatalogService>,
        values_service: Arc<dyn ValuesService>,
        search_service: Arc<dyn SearchService>,
        formatters: OutputFormatters,
    ) -> Self {
        Self {
            catalog_service,
            values_service,
            search_service,
            formatters: Arc::new(formatters),
        }
    }

    /// Wire every service over the given stores
    pub fn from_stores(
        metamodels: Arc<dyn MetamodelStore>,
        records: Arc<dyn RecordStore>,
        gsuite: &GSuiteConfig,
    ) -> Result<Self> {
        Ok(Self::new(
            create_catalog_service(metamodels.clone()),
            create_values_service(metamodels.clone(), records.clone()),
            create_search_service(metamodels, records),
            OutputFormatters::new(gsuite)?,
        ))
    }
}
