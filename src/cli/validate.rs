use toon_core::schema::{AgentSchema, NormalizedSchema};
use toon_core::{DefaultSchemaLoader, SchemaLoader};

fn print_summary(normalized: &NormalizedSchema) {
    let schema: &AgentSchema = &normalized.schema;

    println!("✅ {} v{}", schema.name, schema.version);
    println!("   source:   {} ({:?})", normalized.source.path, normalized.source.kind);
    if let Some(base_url) = &schema.base_url {
        println!("   base URL: {}", base_url);
    }
    println!("   actions:  {}", schema.actions.len());
    for action in &schema.actions {
        println!("     {:<7} {:<32} {}", action.method, action.endpoint, action.id);
    }
    println!("   flows:    {}", schema.flow_count());
}

/// Load and validate a schema, printing a summary.
pub async fn run(source: &str) -> anyhow::Result<()> {
    println!("🔍 Validating {}\n", source);

    match DefaultSchemaLoader::new().load(source).await {
        Ok(normalized) => {
            print_summary(&normalized);
            Ok(())
        }
        Err(e) => {
            println!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
