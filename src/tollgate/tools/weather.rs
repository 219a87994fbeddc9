//! Canned weather lookup used by the hand-off workflow

use crate::adk::tool::{FnTool, Tool};
use futures::FutureExt;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;

static CITY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schemars::schema_for!(City))
        .unwrap_or_else(|_| json!({"type": "object", "properties": {}}));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
});

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct City {
    /// City to report on
    pub city: String,
}

pub fn get_weather() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "get_weather",
        "Get the current weather for a city.",
        CITY_SCHEMA.clone(),
        |input: Value| {
            async move {
                let City { city } = serde_json::from_value(input)?;
                log::info!("Looking up weather for {}", city);
                Ok::<Value, Box<dyn Error + Send + Sync>>(json!(format!(
                    "Weather in {}: Temperature 72°F, Sunny",
                    city
                )))
            }
            .boxed()
        },
    ))
}
