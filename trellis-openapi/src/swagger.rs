//! Swagger UI integration

use crate::spec::OpenApiSpec;
use trellis_core::{Error, HttpResponse};

/// Swagger UI configuration
#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    /// Path where the UI is served (e.g., "/docs")
    pub path: String,
    /// Title for the documentation page
    pub title: String,
    /// OpenAPI specification
    pub spec: OpenApiSpec,
}

impl SwaggerConfig {
    /// Create a new Swagger configuration
    pub fn new(path: impl Into<String>, spec: OpenApiSpec) -> Self {
        Self {
            path: path.into(),
            title: "API Documentation".to_string(),
            spec,
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Get the OpenAPI spec as JSON
    pub fn spec_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(&self.spec)
            .map_err(|e| Error::Serialization(format!("Failed to serialize spec: {}", e)))
    }

    /// Get the OpenAPI spec as YAML
    pub fn spec_yaml(&self) -> Result<String, Error> {
        serde_yaml::to_string(&self.spec)
            .map_err(|e| Error::Serialization(format!("Failed to serialize spec: {}", e)))
    }
}

/// Generate the Swagger UI HTML response
pub fn swagger_ui_response(config: &SwaggerConfig) -> Result<HttpResponse, Error> {
    let spec_json = config.spec_json()?;
    let spec_json_escaped = spec_json.replace('\\', "\\\\").replace('`', "\\`");

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.10.0/swagger-ui.css">
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.10.0/swagger-ui-bundle.js"></script>
    <script>
        const spec = JSON.parse(`{spec}`);
        SwaggerUIBundle({{
            spec: spec,
            dom_id: '#swagger-ui',
            presets: [SwaggerUIBundle.presets.apis],
        }});
    </script>
</body>
</html>"#,
        title = config.title,
        spec = spec_json_escaped,
    );

    Ok(HttpResponse::html(html))
}

/// Serve the raw specification as JSON
pub fn spec_json_response(config: &SwaggerConfig) -> Result<HttpResponse, Error> {
    let json = config.spec_json()?;
    Ok(HttpResponse::ok()
        .with_header("Content-Type".to_string(), "application/json".to_string())
        .with_body(json.into_bytes()))
}

/// Serve the raw specification as YAML
pub fn spec_yaml_response(config: &SwaggerConfig) -> Result<HttpResponse, Error> {
    let yaml = config.spec_yaml()?;
    Ok(HttpResponse::ok()
        .with_header("Content-Type".to_string(), "application/yaml".to_string())
        .with_body(yaml.into_bytes()))
}
