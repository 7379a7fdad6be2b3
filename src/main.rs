use std::path::Path;
use std::sync::Arc;

use tracing::info;

use retailiq::api::{self, app_state::AppState};
use retailiq::config::loader::ConfigLoader;
use retailiq::controller::{KeywordPlanner, QueryController};
use retailiq::knowledge::{
    DocumentKnowledgeIndex, FallbackKnowledgeIndex, create_embedding_model, load_knowledge_dir,
};
use retailiq::loader::DatasetLoader;
use retailiq::models::semantic::SemanticModel;
use retailiq::observability::{ObservabilityState, create_observability_router};
use retailiq::providers::ModelId;
use retailiq::schema::SchemaGraph;
use retailiq::services::session::create_session_service;
use retailiq::storage::StorageFactory;
use retailiq::tools::HttpWarehouse;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    retailiq::observability::init_tracing("retailiq");

    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;
    info!("configuration loaded");

    // Unknown provider tags fail here, before anything is served.
    ModelId::parse(&config.model.default_model)?;

    let warehouse = Arc::new(HttpWarehouse::new(&config.warehouse)?);

    // Bulk-load mode: push the CSV extracts into the warehouse and exit.
    if std::env::args().nth(1).as_deref() == Some("load") {
        info!("loading retail extracts from {}", config.warehouse.data_dir.display());
        let loader = DatasetLoader::retail(&config.warehouse.data_dir);
        let report = loader.load(warehouse.as_ref()).await?;
        info!(
            "done: {} table(s), {} row(s), {} skipped",
            report.loaded.len(),
            report.rows,
            report.skipped.len()
        );
        return Ok(());
    }

    let semantic_model = SemanticModel::from_path(Path::new(&config.semantic_model_path))?;
    let schema = Arc::new(SchemaGraph::new(semantic_model)?);
    info!("semantic schema graph built: {} tables", schema.model().tables.len());

    let table_names: Vec<String> = schema
        .model()
        .tables
        .iter()
        .map(|t| t.table_name.clone())
        .collect();
    let documents = load_knowledge_dir(&config.knowledge.knowledge_dir, &table_names)?;
    let embedding_model = create_embedding_model(&config.knowledge)?;
    let knowledge = Arc::new(FallbackKnowledgeIndex::new(Box::new(
        DocumentKnowledgeIndex::build(documents, embedding_model).await,
    )));
    info!("knowledge index ready");

    let storage = StorageFactory::create(&config.database).await?;
    let session_service = create_session_service(storage.sessions, storage.turns);
    info!("session store ready ({})", config.database.backend);

    let controller = Arc::new(QueryController::new(
        schema,
        Arc::new(KeywordPlanner::new()),
        session_service.clone(),
        warehouse,
        knowledge,
        config.query.clone(),
        config.knowledge.top_k,
    ));
    info!("query controller ready");

    let app_state = AppState::new(session_service, controller, config.model.clone());

    let observability_state = Arc::new(ObservabilityState::new(
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    let api_router = api::create_router(app_state);
    let router = create_observability_router(observability_state).merge(api_router);
    info!("API router created");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
