use {
    anyhow::{Context, Result},
    observer_config::ObserverConfig,
    observer_store::Store,
    serde_json::json,
};

async fn connect(config: &ObserverConfig) -> Result<Store> {
    Store::create_engine(
        &config.database.connection_uri(),
        config.database.max_connections,
    )
    .await
    .with_context(|| format!("failed to connect to the {} database", config.database.backend))
}

/// Create the schema if missing.
pub async fn init_db(config: &ObserverConfig) -> Result<()> {
    let store = connect(config).await?;
    store.initialize_schema().await?;
    store.close().await;
    println!("Schema ready ({}).", store.dialect());
    Ok(())
}

/// Print a message with its components and file rows as JSON.
pub async fn show(config: &ObserverConfig, message_id: &str) -> Result<()> {
    let store = connect(config).await?;
    let Some(message) = store.find_message(message_id).await? else {
        store.close().await;
        anyhow::bail!("no archived message with id {message_id}");
    };

    let mut components = Vec::new();
    for component in store.components(message.id).await? {
        let file = store.file_for_component(component.id).await?.map(|f| {
            json!({
                "file_name": f.file_name,
                "storage_path": f.storage_path,
                "upload_timestamp": f.upload_timestamp,
            })
        });
        components.push(json!({
            "id": component.id,
            "order_index": component.order_index,
            "type": component.component_type,
            "data": component.component_data,
            "file": file,
        }));
    }
    store.close().await;

    let document = json!({
        "id": message.id,
        "message_id": message.message_id,
        "session_id": message.session_id,
        "sender_id": message.sender_id,
        "timestamp": message.timestamp,
        "raw_payload": message.raw_payload,
        "components": components,
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Delete a message; components and files go with it.
pub async fn delete(config: &ObserverConfig, message_id: &str) -> Result<()> {
    let store = connect(config).await?;
    let deleted = store.delete_message(message_id).await?;
    store.close().await;
    if deleted {
        println!("Deleted message {message_id}.");
    } else {
        println!("No archived message with id {message_id}.");
    }
    Ok(())
}
